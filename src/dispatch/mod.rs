//! The proxy dispatcher: the runtime entity receiving proxied calls.
//!
//! A dispatcher is the `Active` half of the proxy lifecycle (configurations are
//! the `Uninitialized` half; there is no teardown state — a dispatcher is simply
//! dropped). It routes each call through the advice chain for that operation
//! and ultimately into the real target.
//!
//! # Dispatch strategies
//!
//! - [`DispatchStrategy::Composition`] - the proxy presents only the declared
//!   operation surfaces and holds the target by reference.
//! - [`DispatchStrategy::Subclass`] - the proxy extends the target's concrete
//!   surface. Operations marked non-overridable remain callable but pass
//!   straight through to the internal target, bypassing every advisor. This is
//!   a documented capability limitation of base-type proxying (sealed and
//!   non-virtual members), not a defect; [`ProxyDispatcher::is_advised`]
//!   makes it observable.
//!
//! # Concurrency
//!
//! A single dispatcher may receive concurrent calls from many threads. Per-call
//! state lives on the calling stack; the chain cache is a concurrent map with
//! epoch-validated entries, so administrative advisor mutation invalidates
//! cached chains without blocking readers.
//!
//! # Fast path
//!
//! When no advisor applies to an operation (or its dynamic vetoes all fail),
//! the dispatcher degenerates to a direct forwarding call with no context
//! allocation.
//!
//! # Dynamic veto timing
//!
//! Dynamic pointcut vetoes are evaluated once per call, against the argument
//! record as it stands when dispatch begins — before any interceptor runs.
//! The selected chain is then fixed for the whole call: an interceptor that
//! rewrites arguments changes what the target and the already-selected advice
//! see, not which downstream interceptors run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use strum::Display;

use crate::advisor::AdvisorRegistry;
use crate::chain::ChainBuilder;
use crate::config::ProxyConfig;
use crate::invocation::{ArgList, InvocationContext};
use crate::operation::{
    AttributeValue, OperationDescriptor, OperationKey, ReturnValue, TargetHandle, TypeKey,
};
use crate::target::TargetSource;
use crate::{Error, Result};

/// How the dispatcher presents its operation surface.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchStrategy {
    /// Interface forwarding: only declared surfaces are exposed.
    Composition,
    /// Base-type extension: the target's concrete surface is exposed, with
    /// non-overridable operations passed through unadvised.
    Subclass,
}

/// How a routed operation reaches its implementation.
#[derive(Clone)]
pub(crate) enum RouteKind {
    /// Through the advice chain to the target.
    Advised,
    /// Directly to the target, bypassing all advice (non-overridable member on
    /// a subclass proxy).
    PassThrough,
    /// Directly to the delegate of introduction `usize`.
    Introduced(usize),
}

#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) descriptor: Arc<OperationDescriptor>,
    pub(crate) kind: RouteKind,
}

/// Immutable, shareable construction product of a configuration.
///
/// Shapes carry no per-instance state: no target, no delegates, no chain cache.
/// Structurally identical configurations (same [`crate::factory::DispatcherBlueprint`])
/// may share one shape; behavior is identical to an uncached build.
pub struct DispatcherShape {
    pub(crate) strategy: DispatchStrategy,
    pub(crate) blueprint: crate::factory::DispatcherBlueprint,
    pub(crate) routes: HashMap<TypeKey, HashMap<Arc<str>, Route>>,
    pub(crate) attributes: Vec<AttributeValue>,
}

impl DispatcherShape {
    /// Number of routable operations.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }
}

impl fmt::Debug for DispatcherShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherShape")
            .field("strategy", &self.strategy)
            .field("operations", &self.operation_count())
            .finish()
    }
}

/// A live proxy: routes calls through advice chains into the target.
pub struct ProxyDispatcher {
    shape: Arc<DispatcherShape>,
    target_source: Arc<dyn TargetSource>,
    registry: Arc<AdvisorRegistry>,
    chains: ChainBuilder,
    delegates: Vec<TargetHandle>,
}

impl ProxyDispatcher {
    pub(crate) fn new(shape: Arc<DispatcherShape>, config: &ProxyConfig) -> Self {
        ProxyDispatcher {
            shape,
            target_source: Arc::clone(config.target_source()),
            registry: Arc::clone(config.registry()),
            chains: ChainBuilder::new(),
            delegates: config
                .introductions()
                .iter()
                .map(|intro| Arc::clone(&intro.delegate))
                .collect(),
        }
    }

    /// The strategy this dispatcher was built with.
    #[must_use]
    pub fn strategy(&self) -> DispatchStrategy {
        self.shape.strategy
    }

    /// Declarative attributes exposed by the proxy (its own, plus the target's
    /// when attribute propagation was enabled).
    #[must_use]
    pub fn attributes(&self) -> &[AttributeValue] {
        &self.shape.attributes
    }

    /// The advisor registry this dispatcher consults.
    #[must_use]
    pub fn registry(&self) -> &Arc<AdvisorRegistry> {
        &self.registry
    }

    /// The target source calls resolve through.
    #[must_use]
    pub fn target_source(&self) -> &Arc<dyn TargetSource> {
        &self.target_source
    }

    /// Whether the proxy exposes the given operation.
    #[must_use]
    pub fn exposes(&self, declaring: &TypeKey, name: &str) -> bool {
        self.route(declaring, name).is_some()
    }

    /// Whether advice can apply to the given operation.
    ///
    /// `false` for pass-through (non-overridable) operations on subclass
    /// proxies and for introduced operations; such calls bypass the chain.
    #[must_use]
    pub fn is_advised(&self, declaring: &TypeKey, name: &str) -> bool {
        matches!(
            self.route(declaring, name).map(|r| &r.kind),
            Some(RouteKind::Advised)
        )
    }

    /// Dispatches a non-generic operation.
    ///
    /// `Out`/`InOut` slots of `args` carry the values the target assigned when
    /// the call returns.
    ///
    /// # Errors
    /// [`Error::OperationNotFound`] for unknown operations, plus any dispatch
    /// or advice error.
    pub fn invoke(&self, declaring: &TypeKey, name: &str, args: &mut ArgList) -> Result<ReturnValue> {
        self.invoke_generic(declaring, name, &[], args)
    }

    /// Dispatches an operation with an explicit generic instantiation.
    ///
    /// Each distinct set of generic arguments resolves through the pointcut
    /// matcher and chain cache independently.
    ///
    /// # Errors
    /// [`Error::OperationNotFound`] for unknown operations,
    /// [`Error::GenericArityMismatch`] for a wrong instantiation, plus any
    /// dispatch or advice error.
    pub fn invoke_generic(
        &self,
        declaring: &TypeKey,
        name: &str,
        generic_args: &[TypeKey],
        args: &mut ArgList,
    ) -> Result<ReturnValue> {
        let Some(route) = self.route(declaring, name) else {
            return Err(Error::OperationNotFound {
                declaring: declaring.to_string(),
                name: name.to_string(),
            });
        };
        let sig = route.descriptor.sig();
        let key = sig.close(generic_args)?;
        args.check_against(sig)?;

        match route.kind {
            RouteKind::Introduced(index) => {
                let delegate = self.delegates.get(index).cloned();
                Self::direct(&route.descriptor, &key, delegate, args)
            }
            RouteKind::PassThrough => {
                Self::direct(&route.descriptor, &key, self.target_source.resolve(), args)
            }
            RouteKind::Advised => {
                let chain = self.chains.chain_for(&key, sig, &self.registry);
                if chain.is_empty() {
                    // Degenerate forwarding call: no context, no chain walk.
                    return Self::direct(
                        &route.descriptor,
                        &key,
                        self.target_source.resolve(),
                        args,
                    );
                }
                let selected = chain.select_for_call(sig, args);
                let interceptors = selected.as_deref().unwrap_or_else(|| chain.interceptors());
                if interceptors.is_empty() {
                    return Self::direct(
                        &route.descriptor,
                        &key,
                        self.target_source.resolve(),
                        args,
                    );
                }
                let mut ctx = InvocationContext::new(
                    &route.descriptor,
                    &key,
                    self.target_source.resolve(),
                    interceptors,
                    args,
                );
                ctx.proceed()
            }
        }
    }

    fn route(&self, declaring: &TypeKey, name: &str) -> Option<&Route> {
        self.shape.routes.get(declaring)?.get(name)
    }

    pub(crate) fn shape(&self) -> &Arc<DispatcherShape> {
        &self.shape
    }

    pub(crate) fn has_introductions(&self) -> bool {
        !self.delegates.is_empty()
    }

    fn direct(
        descriptor: &Arc<OperationDescriptor>,
        key: &OperationKey,
        target: Option<TargetHandle>,
        args: &mut ArgList,
    ) -> Result<ReturnValue> {
        let Some(target) = target else {
            return Err(Error::TargetUnavailable {
                operation: descriptor.sig().full_name(),
            });
        };
        (descriptor.invoker())(&target, &key.generic_args, args)
    }
}

impl fmt::Debug for ProxyDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyDispatcher")
            .field("strategy", &self.shape.strategy)
            .field("operations", &self.shape.operation_count())
            .field("advisors", &self.registry.len())
            .finish()
    }
}
