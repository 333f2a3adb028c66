//! Target sources: the indirection supplying the real instance to invoke.
//!
//! A dispatcher never holds its target directly; it asks a [`TargetSource`] at
//! the start of every call. Static sources hand out the same instance forever;
//! dynamic sources may produce a fresh or pooled instance per call.

use std::fmt;
use std::sync::Arc;

use crate::operation::{TargetHandle, TypeKey};
use crate::snapshot::Snapshot;

/// Supplies the target instance for dispatch.
pub trait TargetSource: Send + Sync {
    /// Identity of the target's concrete type, if known.
    fn target_type(&self) -> Option<TypeKey>;

    /// True if every call resolves to the same instance.
    fn is_static(&self) -> bool;

    /// Resolves the instance for the current call. `None` means no target is
    /// available; dispatch fails with `TargetUnavailable` unless an interceptor
    /// absorbs the call.
    fn resolve(&self) -> Option<TargetHandle>;

    /// Snapshot support for serializable targets. Default: not serializable.
    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        None
    }
}

/// A fixed target instance.
pub struct SingletonTargetSource {
    key: TypeKey,
    target: TargetHandle,
}

impl SingletonTargetSource {
    /// Wraps a concrete instance under its type key.
    #[must_use]
    pub fn new(key: TypeKey, target: TargetHandle) -> Arc<Self> {
        Arc::new(SingletonTargetSource { key, target })
    }
}

impl TargetSource for SingletonTargetSource {
    fn target_type(&self) -> Option<TypeKey> {
        Some(self.key.clone())
    }

    fn is_static(&self) -> bool {
        true
    }

    fn resolve(&self) -> Option<TargetHandle> {
        Some(Arc::clone(&self.target))
    }
}

impl fmt::Debug for SingletonTargetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SingletonTargetSource({})", self.key)
    }
}

/// A source with no target at all.
///
/// Useful for proxies served entirely by interceptors and introductions; any
/// call that reaches the target stage fails with `TargetUnavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTargetSource;

impl TargetSource for EmptyTargetSource {
    fn target_type(&self) -> Option<TypeKey> {
        None
    }

    fn is_static(&self) -> bool {
        true
    }

    fn resolve(&self) -> Option<TargetHandle> {
        None
    }
}

/// A source resolving its instance through a closure on every call.
pub struct FnTargetSource<F> {
    key: TypeKey,
    supplier: F,
}

impl<F> FnTargetSource<F>
where
    F: Fn() -> Option<TargetHandle> + Send + Sync,
{
    /// Creates a per-call source.
    #[must_use]
    pub fn new(key: TypeKey, supplier: F) -> Arc<Self> {
        Arc::new(FnTargetSource { key, supplier })
    }
}

impl<F> TargetSource for FnTargetSource<F>
where
    F: Fn() -> Option<TargetHandle> + Send + Sync,
{
    fn target_type(&self) -> Option<TypeKey> {
        Some(self.key.clone())
    }

    fn is_static(&self) -> bool {
        false
    }

    fn resolve(&self) -> Option<TargetHandle> {
        (self.supplier)()
    }
}
