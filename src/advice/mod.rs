//! Advice kinds and the uniform interceptor abstraction.
//!
//! Four kinds of advice exist, mirroring the classic interception model:
//!
//! - [`Interceptor`] (around) - full control over the call, including whether
//!   and how often to proceed
//! - [`BeforeAdvice`] - runs ahead of the call; a raised error is fail-fast and
//!   nothing downstream (including the target) executes
//! - [`AfterReturningAdvice`] - observes the successful result; skipped when the
//!   call raised
//! - [`ThrowsAdvice`] - observes a raised error, which still propagates
//!   unmodified afterwards
//!
//! Chains are homogeneous: every non-around kind is wrapped into an adapter
//! implementing [`Interceptor`] (see [`adapter`]), so the dispatcher walks a
//! single uniform list.

pub mod adapter;

use std::fmt;
use std::sync::Arc;

use strum::Display;

use crate::invocation::{ArgList, InvocationContext};
use crate::operation::{OperationSig, ReturnValue};
use crate::snapshot::Snapshot;
use crate::{Error, Result};

/// The kind tag of a piece of advice.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum AdviceKind {
    /// Around advice driving the call through [`InvocationContext::proceed`].
    Around,
    /// Runs before the call.
    Before,
    /// Runs after a successful call.
    AfterReturning,
    /// Observes a raised error.
    Throws,
}

/// Around advice: the uniform chain element.
///
/// Implementations receive the mutable invocation context and decide whether to
/// call [`InvocationContext::proceed`] zero, one, or several times.
pub trait Interceptor: Send + Sync {
    /// Wraps the rest of the chain (and ultimately the target).
    ///
    /// # Errors
    /// Propagates errors from downstream unmodified, or raises its own.
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<ReturnValue>;

    /// Snapshot support for serializable interceptors. Default: not serializable.
    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        None
    }
}

/// Advice executed before the target stage.
pub trait BeforeAdvice: Send + Sync {
    /// Runs ahead of the call; may rewrite arguments.
    ///
    /// # Errors
    /// A raised error aborts the chain: no later member, target included, runs.
    fn before(&self, sig: &OperationSig, args: &mut ArgList) -> Result<()>;

    /// Snapshot support for serializable advice. Default: not serializable.
    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        None
    }
}

/// Advice executed after a successful call; skipped when the call raised.
pub trait AfterReturningAdvice: Send + Sync {
    /// Observes the result. The result itself is read-only.
    ///
    /// # Errors
    /// A raised error replaces the successful outcome for upstream members.
    fn after_returning(&self, sig: &OperationSig, result: &ReturnValue, args: &ArgList)
        -> Result<()>;

    /// Snapshot support for serializable advice. Default: not serializable.
    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        None
    }
}

/// Advice that observes a raised error. The error continues to propagate
/// unmodified after the advice returns.
pub trait ThrowsAdvice: Send + Sync {
    /// Observes the error of a failed call.
    fn on_error(&self, sig: &OperationSig, error: &Error, args: &ArgList);

    /// Snapshot support for serializable advice. Default: not serializable.
    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        None
    }
}

/// A unit of advice of any kind, ready to be paired with a pointcut.
#[derive(Clone)]
pub enum Advice {
    /// Around advice.
    Around(Arc<dyn Interceptor>),
    /// Before advice.
    Before(Arc<dyn BeforeAdvice>),
    /// After-returning advice.
    AfterReturning(Arc<dyn AfterReturningAdvice>),
    /// Throws advice.
    Throws(Arc<dyn ThrowsAdvice>),
}

impl Advice {
    /// The kind tag.
    #[must_use]
    pub fn kind(&self) -> AdviceKind {
        match self {
            Advice::Around(_) => AdviceKind::Around,
            Advice::Before(_) => AdviceKind::Before,
            Advice::AfterReturning(_) => AdviceKind::AfterReturning,
            Advice::Throws(_) => AdviceKind::Throws,
        }
    }

    /// Wraps this advice into the uniform interceptor form used by chains.
    #[must_use]
    pub fn into_interceptor(self) -> Arc<dyn Interceptor> {
        match self {
            Advice::Around(interceptor) => interceptor,
            Advice::Before(advice) => Arc::new(adapter::BeforeAdapter::new(advice)),
            Advice::AfterReturning(advice) => Arc::new(adapter::AfterReturningAdapter::new(advice)),
            Advice::Throws(advice) => Arc::new(adapter::ThrowsAdapter::new(advice)),
        }
    }

    /// Snapshot support of the underlying advice object, if any.
    #[must_use]
    pub fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        match self {
            Advice::Around(a) => a.as_snapshot(),
            Advice::Before(a) => a.as_snapshot(),
            Advice::AfterReturning(a) => a.as_snapshot(),
            Advice::Throws(a) => a.as_snapshot(),
        }
    }

    /// Raw pointer identity of the underlying advice object.
    ///
    /// Advisors compare by reference, not value.
    #[must_use]
    pub fn ptr_id(&self) -> *const () {
        match self {
            Advice::Around(a) => Arc::as_ptr(a).cast(),
            Advice::Before(a) => Arc::as_ptr(a).cast(),
            Advice::AfterReturning(a) => Arc::as_ptr(a).cast(),
            Advice::Throws(a) => Arc::as_ptr(a).cast(),
        }
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Advice::{}", self.kind())
    }
}

/// Around advice backed by a closure.
pub struct FnInterceptor<F>(F);

impl<F> FnInterceptor<F>
where
    F: Fn(&mut InvocationContext<'_>) -> Result<ReturnValue> + Send + Sync,
{
    /// Wraps a closure as around advice.
    #[must_use]
    pub fn new(f: F) -> Self {
        FnInterceptor(f)
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut InvocationContext<'_>) -> Result<ReturnValue> + Send + Sync,
{
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<ReturnValue> {
        (self.0)(ctx)
    }
}
