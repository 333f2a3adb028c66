//! Advisors: the pairing of a pointcut with a piece of advice.
//!
//! Advisors are created by the caller, appended to a registry, and never
//! mutated in place; replacing advice means remove + add. Identity is by
//! reference (`Arc` pointer), not by value.

mod registry;

pub use registry::AdvisorRegistry;

use std::fmt;
use std::sync::Arc;

use crate::advice::{Advice, AdviceKind, Interceptor};
use crate::pointcut::{PointcutRef, TruePointcut};

/// A pointcut paired with advice.
///
/// The uniform interceptor form of the advice is computed once at construction
/// so chain building never re-wraps.
pub struct Advisor {
    name: Option<String>,
    pointcut: PointcutRef,
    advice: Advice,
    interceptor: Arc<dyn Interceptor>,
}

impl Advisor {
    /// Pairs a pointcut with advice.
    #[must_use]
    pub fn new(pointcut: PointcutRef, advice: Advice) -> Arc<Self> {
        let interceptor = advice.clone().into_interceptor();
        Arc::new(Advisor {
            name: None,
            pointcut,
            advice,
            interceptor,
        })
    }

    /// Wraps plain advice with an always-matching pointcut.
    #[must_use]
    pub fn for_advice(advice: Advice) -> Arc<Self> {
        Advisor::new(Arc::new(TruePointcut), advice)
    }

    /// Pairs a pointcut with advice under a diagnostic name.
    #[must_use]
    pub fn named(name: &str, pointcut: PointcutRef, advice: Advice) -> Arc<Self> {
        let interceptor = advice.clone().into_interceptor();
        Arc::new(Advisor {
            name: Some(name.to_string()),
            pointcut,
            advice,
            interceptor,
        })
    }

    /// Diagnostic name, if one was given.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The advisor's pointcut.
    #[must_use]
    pub fn pointcut(&self) -> &PointcutRef {
        &self.pointcut
    }

    /// The advisor's advice.
    #[must_use]
    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    /// The advice kind tag.
    #[must_use]
    pub fn kind(&self) -> AdviceKind {
        self.advice.kind()
    }

    /// The advice in uniform interceptor form.
    #[must_use]
    pub fn interceptor(&self) -> &Arc<dyn Interceptor> {
        &self.interceptor
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("dynamic", &self.pointcut.is_dynamic())
            .finish()
    }
}
