//! Adapters wrapping non-around advice into the uniform [`Interceptor`] form.
//!
//! The chain builder produces homogeneous interceptor lists; these adapters
//! encode the phase semantics of each advice kind:
//!
//! - before: fail-fast, the target never runs on error
//! - after-returning: skipped on error
//! - throws: observes the error, which still propagates unmodified

use std::sync::Arc;

use crate::advice::{AfterReturningAdvice, BeforeAdvice, Interceptor, ThrowsAdvice};
use crate::invocation::InvocationContext;
use crate::operation::ReturnValue;
use crate::snapshot::Snapshot;
use crate::Result;

/// Runs before-advice, then proceeds.
pub struct BeforeAdapter {
    advice: Arc<dyn BeforeAdvice>,
}

impl BeforeAdapter {
    pub(crate) fn new(advice: Arc<dyn BeforeAdvice>) -> Self {
        BeforeAdapter { advice }
    }
}

impl Interceptor for BeforeAdapter {
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<ReturnValue> {
        let sig = ctx.operation().sig().clone();
        self.advice.before(&sig, ctx.args_mut())?;
        ctx.proceed()
    }

    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        self.advice.as_snapshot()
    }
}

/// Proceeds, then runs after-returning advice on success only.
pub struct AfterReturningAdapter {
    advice: Arc<dyn AfterReturningAdvice>,
}

impl AfterReturningAdapter {
    pub(crate) fn new(advice: Arc<dyn AfterReturningAdvice>) -> Self {
        AfterReturningAdapter { advice }
    }
}

impl Interceptor for AfterReturningAdapter {
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<ReturnValue> {
        let result = ctx.proceed()?;
        let sig = ctx.operation().sig().clone();
        self.advice.after_returning(&sig, &result, ctx.args())?;
        Ok(result)
    }

    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        self.advice.as_snapshot()
    }
}

/// Proceeds; on error lets the advice observe it before it continues upward.
pub struct ThrowsAdapter {
    advice: Arc<dyn ThrowsAdvice>,
}

impl ThrowsAdapter {
    pub(crate) fn new(advice: Arc<dyn ThrowsAdvice>) -> Self {
        ThrowsAdapter { advice }
    }
}

impl Interceptor for ThrowsAdapter {
    fn invoke(&self, ctx: &mut InvocationContext<'_>) -> Result<ReturnValue> {
        match ctx.proceed() {
            Ok(result) => Ok(result),
            Err(error) => {
                let sig = ctx.operation().sig().clone();
                self.advice.on_error(&sig, &error, ctx.args());
                Err(error)
            }
        }
    }

    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        self.advice.as_snapshot()
    }
}
