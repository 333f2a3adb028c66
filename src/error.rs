use std::any::Any;
use std::fmt;

use thiserror::Error;

/// A fault raised by a target operation or by user advice.
///
/// Faults carry the original payload untouched so that callers (and throws-advice)
/// can downcast back to the concrete value that was raised. The interception
/// pipeline never wraps, rethrows, or downgrades a fault — it travels through the
/// chain exactly as produced.
#[derive(Error)]
#[error("{message}")]
pub struct Fault {
    /// Human-readable description of the fault.
    pub message: String,
    /// The original raised value, if one was attached.
    pub payload: Option<Box<dyn Any + Send>>,
}

impl Fault {
    /// Creates a fault with a message and no payload.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Fault {
            message: message.into(),
            payload: None,
        }
    }

    /// Creates a fault carrying a typed payload.
    #[must_use]
    pub fn with_payload(message: impl Into<String>, payload: impl Any + Send) -> Self {
        Fault {
            message: message.into(),
            payload: Some(Box::new(payload)),
        }
    }

    /// Attempts to view the payload as a concrete type.
    #[must_use]
    pub fn payload_ref<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("message", &self.message)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// The generic Error type, which provides coverage for all errors this library can
/// potentially return.
///
/// This enum covers every failure mode of proxy construction, advisor management,
/// and call dispatch. Construction-time errors (`ProxyConstruction`,
/// `DuplicateOperation`) are fatal and never partial; dispatch-time errors
/// (`TargetUnavailable`, `Fault`) are surfaced per call.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::ConfigurationFrozen`] - Advisor mutation attempted after freeze
/// - [`Error::ProxyConstruction`] - Target/base type unsuitable for the requested strategy
/// - [`Error::DuplicateOperation`] - Surface declared the same operation twice
///
/// ## Dispatch Errors
/// - [`Error::TargetUnavailable`] - No usable target instance at call time
/// - [`Error::OperationNotFound`] - Call named an operation the proxy does not expose
/// - [`Error::ArgumentMismatch`] - Argument record does not fit the operation signature
/// - [`Error::GenericArityMismatch`] - Wrong number of generic type arguments
/// - [`Error::Fault`] - A target or advice raised a fault; propagated unmodified
///
/// ## Serialization Errors
/// - [`Error::NotSerializable`] - A proxy component has no snapshot representation
/// - [`Error::UnknownSnapshotTag`] - Restore found a tag the codec does not know
/// - [`Error::Snapshot`] - Binary envelope encoding/decoding failed
#[derive(Error, Debug)]
pub enum Error {
    /// Mutation was attempted on a frozen advisor registry.
    ///
    /// Once a configuration is frozen, its advisor list is immutable; any
    /// add/insert/remove fails with this error until the configuration is
    /// unfrozen. Never retried automatically.
    #[error("Configuration is frozen - the advisor list can no longer be modified")]
    ConfigurationFrozen,

    /// The requested dispatch strategy cannot be built over the given type.
    ///
    /// Raised at construction time when a subclass proxy is requested over a
    /// sealed or surface-less concrete type, or a composition proxy has no
    /// usable operation surface at all.
    #[error("Cannot construct proxy over `{type_name}`: {reason}")]
    ProxyConstruction {
        /// Name of the offending target or base type.
        type_name: String,
        /// Why the strategy cannot be applied to it.
        reason: String,
    },

    /// No target instance was available (or it was of an incompatible runtime
    /// type) when dispatch reached the target stage.
    ///
    /// An interceptor that fully handles the call without proceeding never
    /// triggers this error.
    #[error("No target available for operation `{operation}`")]
    TargetUnavailable {
        /// The operation whose dispatch failed.
        operation: String,
    },

    /// A call named an operation the dispatcher does not expose.
    #[error("Operation `{name}` not found on `{declaring}`")]
    OperationNotFound {
        /// Declaring surface the caller asked for.
        declaring: String,
        /// Operation name the caller asked for.
        name: String,
    },

    /// A surface builder was given two operations with the same name.
    #[error("Operation `{0}` declared more than once on the same surface")]
    DuplicateOperation(String),

    /// The argument record does not match the operation's parameter list.
    #[error("Argument mismatch for `{operation}`: {message}")]
    ArgumentMismatch {
        /// The operation being invoked.
        operation: String,
        /// What was wrong (count, slot type, missing out-value).
        message: String,
    },

    /// A generic operation was invoked with the wrong number of type arguments.
    #[error("Operation `{operation}` expects {expected} generic argument(s), got {actual}")]
    GenericArityMismatch {
        /// The operation being invoked.
        operation: String,
        /// Declared generic arity.
        expected: usize,
        /// Supplied generic argument count.
        actual: usize,
    },

    /// A proxy component (target, advice, or pointcut) cannot be serialized.
    ///
    /// Serialization fails loudly rather than silently dropping advice on
    /// round-trip.
    #[error("Proxy is not serializable: {component} has no snapshot representation")]
    NotSerializable {
        /// Which component blocked serialization.
        component: String,
    },

    /// A snapshot referenced a tag that was never registered with the codec.
    #[error("Unknown snapshot tag `{0}` - register it with the ProxyCodec before restoring")]
    UnknownSnapshotTag(String),

    /// The binary snapshot envelope could not be encoded or decoded.
    #[error("Snapshot envelope error: {0}")]
    Snapshot(String),

    /// A fault raised by the target or by user advice, propagated unmodified.
    #[error("{0}")]
    Fault(#[from] Fault),
}

impl Error {
    /// True if this error is a user-raised fault rather than a pipeline error.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        matches!(self, Error::Fault(_))
    }
}
