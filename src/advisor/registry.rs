//! Ordered advisor registry with freeze semantics.
//!
//! Order is significant: advice executes in registration order for the before
//! phase and reverse order for after phases, because each advisor wraps the
//! next (nested-interceptor semantics).
//!
//! # Thread Safety
//!
//! Reads take a snapshot under a read lock; mutation is expected to be rare and
//! administrative (typically before calls begin). Every successful mutation
//! bumps an epoch counter; chain caches compare epochs to detect staleness.
//! No user code runs while the lock is held, so a poisoned lock still guards a
//! consistent list; readers and writers both recover from poisoning.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::advice::Advice;
use crate::advisor::Advisor;
use crate::{Error, Result};

/// Ordered collection of advisors attached to a proxy configuration.
#[derive(Debug, Default)]
pub struct AdvisorRegistry {
    advisors: RwLock<Vec<Arc<Advisor>>>,
    frozen: AtomicBool,
    epoch: AtomicU64,
}

impl AdvisorRegistry {
    /// Creates an empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        AdvisorRegistry::default()
    }

    /// Appends an advisor.
    ///
    /// # Errors
    /// Returns [`Error::ConfigurationFrozen`] if the registry is frozen.
    pub fn add(&self, advisor: Arc<Advisor>) -> Result<()> {
        self.check_frozen()?;
        let mut advisors = self.advisors.write().unwrap_or_else(PoisonError::into_inner);
        advisors.push(advisor);
        self.bump_epoch();
        Ok(())
    }

    /// Wraps plain advice with an always-matching pointcut and appends it,
    /// returning the created advisor.
    ///
    /// # Errors
    /// Returns [`Error::ConfigurationFrozen`] if the registry is frozen.
    pub fn add_advice(&self, advice: Advice) -> Result<Arc<Advisor>> {
        let advisor = Advisor::for_advice(advice);
        self.add(advisor.clone())?;
        Ok(advisor)
    }

    /// Inserts an advisor at `index` (clamped to the current length).
    ///
    /// # Errors
    /// Returns [`Error::ConfigurationFrozen`] if the registry is frozen.
    pub fn insert(&self, index: usize, advisor: Arc<Advisor>) -> Result<()> {
        self.check_frozen()?;
        let mut advisors = self.advisors.write().unwrap_or_else(PoisonError::into_inner);
        let index = index.min(advisors.len());
        advisors.insert(index, advisor);
        self.bump_epoch();
        Ok(())
    }

    /// Removes an advisor by reference identity. Returns whether it was found.
    ///
    /// # Errors
    /// Returns [`Error::ConfigurationFrozen`] if the registry is frozen.
    pub fn remove(&self, advisor: &Arc<Advisor>) -> Result<bool> {
        self.check_frozen()?;
        let mut advisors = self.advisors.write().unwrap_or_else(PoisonError::into_inner);
        let before = advisors.len();
        advisors.retain(|existing| !Arc::ptr_eq(existing, advisor));
        let removed = advisors.len() != before;
        if removed {
            self.bump_epoch();
        }
        Ok(removed)
    }

    /// Removes every advisor carrying the given advice object (by reference
    /// identity). Returns whether anything was removed.
    ///
    /// # Errors
    /// Returns [`Error::ConfigurationFrozen`] if the registry is frozen.
    pub fn remove_advice(&self, advice: &Advice) -> Result<bool> {
        self.check_frozen()?;
        let mut advisors = self.advisors.write().unwrap_or_else(PoisonError::into_inner);
        let before = advisors.len();
        let id = advice.ptr_id();
        advisors.retain(|existing| existing.advice().ptr_id() != id);
        let removed = advisors.len() != before;
        if removed {
            self.bump_epoch();
        }
        Ok(removed)
    }

    /// Freezes the registry; subsequent mutation fails.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
        tracing::debug!("advisor registry frozen");
    }

    /// Unfreezes the registry; mutation is permitted again.
    pub fn unfreeze(&self) {
        self.frozen.store(false, Ordering::SeqCst);
    }

    /// Whether the registry is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    /// Mutation epoch; bumped on every successful add/insert/remove.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Ordered read-only snapshot of the current advisors.
    #[must_use]
    pub fn advisors(&self) -> Vec<Arc<Advisor>> {
        match self.advisors.read() {
            Ok(advisors) => advisors.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of registered advisors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.advisors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if no advisors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_frozen(&self) -> Result<()> {
        if self.is_frozen() {
            return Err(Error::ConfigurationFrozen);
        }
        Ok(())
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}
