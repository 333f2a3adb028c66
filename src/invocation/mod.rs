//! Per-call invocation state and the proceed protocol.
//!
//! An [`InvocationContext`] is created fresh for every dispatched call and is
//! exclusively owned by the calling stack; it is never shared across threads and
//! needs no locking. It carries the closed operation identity, the resolved
//! target, the mutable argument record, and a cursor into the advice chain.
//!
//! # Proceed semantics
//!
//! [`InvocationContext::proceed`] advances the cursor and hands control to the
//! next interceptor; once the chain is exhausted it invokes the real target.
//! The cursor is never rewound, so an interceptor calling `proceed()` a second
//! time after the inner chain has completed re-invokes the target directly —
//! the target executes once per such call, side effects included. Retry-style
//! advice relies on exactly this. An interceptor that never proceeds
//! short-circuits the call; the target does not run.
//!
//! If the target raises, the error unwinds through the interceptors that have
//! already been entered, unmodified.

mod args;

pub use args::{ArgList, ArgSlot};

use std::sync::Arc;

use crate::advice::Interceptor;
use crate::operation::{OperationDescriptor, OperationKey, ReturnValue, TargetHandle, TypeKey};
use crate::{Error, Result};

/// Mutable record of one in-flight call.
pub struct InvocationContext<'a> {
    descriptor: &'a OperationDescriptor,
    key: &'a OperationKey,
    target: Option<TargetHandle>,
    chain: &'a [Arc<dyn Interceptor>],
    cursor: usize,
    args: &'a mut ArgList,
}

impl<'a> InvocationContext<'a> {
    pub(crate) fn new(
        descriptor: &'a OperationDescriptor,
        key: &'a OperationKey,
        target: Option<TargetHandle>,
        chain: &'a [Arc<dyn Interceptor>],
        args: &'a mut ArgList,
    ) -> Self {
        InvocationContext {
            descriptor,
            key,
            target,
            chain,
            cursor: 0,
            args,
        }
    }

    /// The operation being invoked.
    #[must_use]
    pub fn operation(&self) -> &OperationDescriptor {
        self.descriptor
    }

    /// Closed identity of this invocation (includes generic arguments).
    #[must_use]
    pub fn key(&self) -> &OperationKey {
        self.key
    }

    /// Generic type arguments of this instantiation.
    #[must_use]
    pub fn generic_args(&self) -> &[TypeKey] {
        &self.key.generic_args
    }

    /// The resolved target instance, if any.
    #[must_use]
    pub fn target(&self) -> Option<&TargetHandle> {
        self.target.as_ref()
    }

    /// Read access to the argument record.
    #[must_use]
    pub fn args(&self) -> &ArgList {
        self.args
    }

    /// Mutable access to the argument record; interceptors may rewrite slots
    /// before proceeding.
    pub fn args_mut(&mut self) -> &mut ArgList {
        self.args
    }

    /// Interceptors remaining ahead of the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.cursor)
    }

    /// Runs the next stage of the chain, or the target once the chain is
    /// exhausted. See the module docs for replay and short-circuit semantics.
    ///
    /// # Errors
    /// Returns [`Error::TargetUnavailable`] if the target stage is reached with
    /// no usable target, or whatever error an interceptor or the target raises.
    pub fn proceed(&mut self) -> Result<ReturnValue> {
        if self.cursor < self.chain.len() {
            let interceptor = Arc::clone(&self.chain[self.cursor]);
            self.cursor += 1;
            interceptor.invoke(self)
        } else {
            self.invoke_target()
        }
    }

    fn invoke_target(&mut self) -> Result<ReturnValue> {
        let Some(target) = self.target.clone() else {
            return Err(Error::TargetUnavailable {
                operation: self.descriptor.sig().full_name(),
            });
        };
        (self.descriptor.invoker())(&target, &self.key.generic_args, self.args)
    }
}
