//! Advice chain construction and caching.
//!
//! For a given closed operation key, the builder walks the advisor registry in
//! order, keeps every advisor whose pointcut matches statically, and discards
//! the rest outright — calls that never need an advisor pay nothing for it.
//! Advisors with dynamic pointcuts stay in the chain together with their
//! pointcut and are vetoed per call.
//!
//! # Caching
//!
//! Built chains are cached per [`OperationKey`] in a concurrent map and tagged
//! with the registry epoch they were built against. A registry mutation bumps
//! the epoch; the next lookup for any key rebuilds its chain. Reads are
//! lock-free in the common case.

use std::sync::Arc;

use dashmap::DashMap;

use crate::advice::Interceptor;
use crate::advisor::AdvisorRegistry;
use crate::invocation::ArgList;
use crate::operation::{OperationKey, OperationSig};
use crate::pointcut::PointcutRef;

/// One statically matched chain position.
struct ChainEntry {
    interceptor: Arc<dyn Interceptor>,
    /// Present only for dynamic pointcuts; re-evaluated per call.
    dynamic: Option<PointcutRef>,
}

/// The statically matched chain for one closed operation key.
pub struct CachedChain {
    epoch: u64,
    entries: Vec<ChainEntry>,
    /// Uniform interceptor list assuming every dynamic veto passes.
    full: Vec<Arc<dyn Interceptor>>,
    has_dynamic: bool,
}

impl CachedChain {
    /// True if no advisor applies to this operation at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of statically matched advisors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The full interceptor list (every dynamic veto assumed passing).
    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.full
    }

    /// Applies per-call dynamic vetoes against the current arguments.
    ///
    /// Returns `None` when the full list applies unchanged (no dynamic
    /// pointcuts, the common case), avoiding a per-call allocation.
    #[must_use]
    pub fn select_for_call(&self, sig: &OperationSig, args: &ArgList) -> Option<Vec<Arc<dyn Interceptor>>> {
        if !self.has_dynamic {
            return None;
        }
        Some(
            self.entries
                .iter()
                .filter(|entry| match &entry.dynamic {
                    Some(pointcut) => pointcut.matches_invocation(sig, &sig.declaring, args),
                    None => true,
                })
                .map(|entry| Arc::clone(&entry.interceptor))
                .collect(),
        )
    }
}

/// Per-configuration chain cache.
#[derive(Default)]
pub struct ChainBuilder {
    cache: DashMap<OperationKey, Arc<CachedChain>>,
}

impl ChainBuilder {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        ChainBuilder {
            cache: DashMap::new(),
        }
    }

    /// Returns the chain for `key`, rebuilding it if the registry has mutated
    /// since it was cached.
    #[must_use]
    pub fn chain_for(
        &self,
        key: &OperationKey,
        sig: &OperationSig,
        registry: &AdvisorRegistry,
    ) -> Arc<CachedChain> {
        let epoch = registry.epoch();
        if let Some(cached) = self.cache.get(key) {
            if cached.epoch == epoch {
                return Arc::clone(&cached);
            }
        }
        tracing::trace!(operation = %key, epoch, "building advice chain");
        let chain = Arc::new(Self::build(sig, registry, epoch));
        self.cache.insert(key.clone(), Arc::clone(&chain));
        chain
    }

    /// Number of cached chains (stale entries included until next lookup).
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn build(sig: &OperationSig, registry: &AdvisorRegistry, epoch: u64) -> CachedChain {
        let mut entries = Vec::new();
        let mut has_dynamic = false;
        for advisor in registry.advisors() {
            let pointcut = advisor.pointcut();
            if !pointcut.matches_operation(sig, &sig.declaring) {
                continue;
            }
            let dynamic = if pointcut.is_dynamic() {
                has_dynamic = true;
                Some(Arc::clone(pointcut))
            } else {
                None
            };
            entries.push(ChainEntry {
                interceptor: Arc::clone(advisor.interceptor()),
                dynamic,
            });
        }
        let full = entries
            .iter()
            .map(|entry| Arc::clone(&entry.interceptor))
            .collect();
        CachedChain {
            epoch,
            entries,
            full,
            has_dynamic,
        }
    }
}
