//! # proxyweave Prelude
//!
//! Convenient re-exports of the most commonly used types. Import this module
//! to get quick access to the essentials for building and dispatching proxies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all proxyweave operations
pub use crate::Error;

/// A target- or advice-raised fault carried through the chain unmodified
pub use crate::Fault;

/// The result type used throughout proxyweave
pub use crate::Result;

// ================================================================================================
// Operation Model
// ================================================================================================

pub use crate::operation::{
    ret, unit, unwrap_return, AttributeValue, ConcreteSurface, OperationDescriptor, OperationKey,
    OperationSig, OperationSurface, ParamMode, ParamSpec, ReturnValue, SurfaceBuilder,
    TargetHandle, TypeKey,
};

// ================================================================================================
// Advice, Pointcuts, Advisors
// ================================================================================================

pub use crate::advice::{
    Advice, AdviceKind, AfterReturningAdvice, BeforeAdvice, FnInterceptor, Interceptor,
    ThrowsAdvice,
};

pub use crate::pointcut::{
    DeclaringTypePointcut, DynamicFnPointcut, FalsePointcut, FnPointcut, NameMatchPointcut,
    Pointcut, PointcutRef, TruePointcut,
};

pub use crate::advisor::{Advisor, AdvisorRegistry};

// ================================================================================================
// Invocation and Dispatch
// ================================================================================================

pub use crate::invocation::{ArgList, InvocationContext};

pub use crate::target::{EmptyTargetSource, FnTargetSource, SingletonTargetSource, TargetSource};

pub use crate::config::{Introduction, ProxyConfig, ProxyFlags};

pub use crate::dispatch::{DispatchStrategy, ProxyDispatcher};

pub use crate::factory::{create_dispatcher, DispatcherBlueprint, ProxyFactory};

// ================================================================================================
// Serialization Boundary
// ================================================================================================

pub use crate::snapshot::{snapshot_dispatcher, ProxyCodec, Snapshot};
