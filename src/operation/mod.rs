//! Operation model: explicit, registered call surfaces.
//!
//! This crate performs no runtime reflection. Every operation a proxy can route is
//! registered up front as an [`OperationDescriptor`]: a signature plus an invoker
//! closure bound at configuration time. Operation identity is structural:
//!
//! - [`TypeKey`] - interned name of a declaring type or surface
//! - [`OperationSig`] - open signature (name, declaring key, parameters, generic arity)
//! - [`OperationKey`] - closed identity including the generic type arguments of a
//!   specific instantiation
//!
//! Two invocations of the same generic operation with different type arguments have
//! distinct [`OperationKey`]s and resolve through the pointcut matcher and chain
//! builder independently, while sharing one advisor registry.

mod surface;

pub use surface::{AttributeValue, ConcreteSurface, OperationSurface, SurfaceBuilder};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use strum::Display;

use crate::invocation::ArgList;
use crate::{Error, Result};

/// Interned identity of a declaring type or operation surface.
///
/// Keys compare and hash by name. They are cheap to clone and are used as the
/// structural identity everywhere a reflective framework would use a runtime type.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    /// Creates a key from a type or surface name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        TypeKey(Arc::from(name.as_ref()))
    }

    /// Returns the key's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        TypeKey::new(name)
    }
}

/// Direction of a call parameter.
///
/// Output channels are modeled as ordinary slots in the argument record rather
/// than through reference semantics: the target writes `InOut` and `Out` slots
/// and the caller reads them back after dispatch.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    /// Read-only input.
    In,
    /// Carries a value in and out (a `ref` parameter).
    InOut,
    /// Output-only; the slot starts empty and must be written by the target.
    Out,
}

/// A single parameter of an operation signature.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: Arc<str>,
    /// Direction marker.
    pub mode: ParamMode,
}

impl ParamSpec {
    /// An input parameter.
    #[must_use]
    pub fn input(name: &str) -> Self {
        ParamSpec {
            name: Arc::from(name),
            mode: ParamMode::In,
        }
    }

    /// An in/out parameter.
    #[must_use]
    pub fn inout(name: &str) -> Self {
        ParamSpec {
            name: Arc::from(name),
            mode: ParamMode::InOut,
        }
    }

    /// An output-only parameter.
    #[must_use]
    pub fn output(name: &str) -> Self {
        ParamSpec {
            name: Arc::from(name),
            mode: ParamMode::Out,
        }
    }
}

/// Open signature of an operation: everything known before a call, excluding the
/// generic instantiation.
#[derive(Debug, Clone)]
pub struct OperationSig {
    /// Operation name, unique within its declaring surface.
    pub name: Arc<str>,
    /// The surface or type declaring this operation.
    pub declaring: TypeKey,
    /// Positional parameter list.
    pub params: Arc<[ParamSpec]>,
    /// Number of generic type arguments the operation takes (0 for non-generic).
    pub generic_arity: usize,
}

impl OperationSig {
    /// Creates a non-generic signature.
    #[must_use]
    pub fn new(declaring: TypeKey, name: &str, params: Vec<ParamSpec>) -> Self {
        OperationSig {
            name: Arc::from(name),
            declaring,
            params: params.into(),
            generic_arity: 0,
        }
    }

    /// Creates a generic signature with the given arity.
    #[must_use]
    pub fn generic(declaring: TypeKey, name: &str, params: Vec<ParamSpec>, arity: usize) -> Self {
        OperationSig {
            name: Arc::from(name),
            declaring,
            params: params.into(),
            generic_arity: arity,
        }
    }

    /// `Declaring.name` form used in error messages and logs.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring, self.name)
    }

    /// Closes this signature over a concrete generic instantiation.
    ///
    /// # Errors
    /// Returns [`Error::GenericArityMismatch`] if the argument count does not
    /// match the declared arity.
    pub fn close(&self, generic_args: &[TypeKey]) -> Result<OperationKey> {
        if generic_args.len() != self.generic_arity {
            return Err(Error::GenericArityMismatch {
                operation: self.full_name(),
                expected: self.generic_arity,
                actual: generic_args.len(),
            });
        }
        Ok(OperationKey {
            declaring: self.declaring.clone(),
            name: self.name.clone(),
            generic_args: generic_args.into(),
        })
    }
}

/// Closed identity of an operation instantiation.
///
/// Includes the generic type arguments, so `convert::<A>` and `convert::<B>` are
/// distinct keys with independently matched and cached advice chains.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    /// Declaring surface.
    pub declaring: TypeKey,
    /// Operation name.
    pub name: Arc<str>,
    /// Concrete generic arguments (empty for non-generic operations).
    pub generic_args: Arc<[TypeKey]>,
}

impl fmt::Debug for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring, self.name)?;
        if !self.generic_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.generic_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shared handle to a live target instance.
pub type TargetHandle = Arc<dyn Any + Send + Sync>;

/// Dynamically-typed return value of an operation.
pub type ReturnValue = Box<dyn Any + Send>;

/// Boxes an operation result.
#[must_use]
pub fn ret<T: Any + Send>(value: T) -> ReturnValue {
    Box::new(value)
}

/// The unit return value for void operations.
#[must_use]
pub fn unit() -> ReturnValue {
    Box::new(())
}

/// Downcasts a return value, surfacing a mismatch as an argument error.
///
/// # Errors
/// Returns [`Error::ArgumentMismatch`] if the value is not of type `T`.
pub fn unwrap_return<T: Any>(value: ReturnValue, operation: &str) -> Result<T> {
    value.downcast::<T>().map(|b| *b).map_err(|_| Error::ArgumentMismatch {
        operation: operation.to_string(),
        message: "return value has unexpected type".to_string(),
    })
}

/// Invoker closure bound to an operation at configuration time.
///
/// Receives the resolved target handle, the generic arguments of this
/// instantiation, and the mutable argument record. Writes `Out`/`InOut` results
/// back into the record before returning.
pub type Invoker =
    Arc<dyn Fn(&TargetHandle, &[TypeKey], &mut ArgList) -> Result<ReturnValue> + Send + Sync>;

/// A registered operation: signature, overridability, and the invoker that
/// reaches the real target.
#[derive(Clone)]
pub struct OperationDescriptor {
    sig: OperationSig,
    overridable: bool,
    invoker: Invoker,
}

impl OperationDescriptor {
    /// Registers an operation against a concrete target type.
    ///
    /// The returned descriptor is overridable (advice applies). The closure
    /// receives the downcast target; if the live target is of a different
    /// runtime type the call fails with [`Error::TargetUnavailable`].
    pub fn bind<T, F>(sig: OperationSig, body: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &[TypeKey], &mut ArgList) -> Result<ReturnValue> + Send + Sync + 'static,
    {
        let operation = sig.full_name();
        OperationDescriptor {
            sig,
            overridable: true,
            invoker: Arc::new(move |handle, generics, args| {
                let target = (**handle)
                    .downcast_ref::<T>()
                    .ok_or_else(|| Error::TargetUnavailable {
                        operation: operation.clone(),
                    })?;
                body(target, generics, args)
            }),
        }
    }

    /// Marks the operation as non-overridable.
    ///
    /// On subclass-strategy proxies such operations pass straight through to the
    /// internal target, bypassing every advisor. This mirrors the sealed /
    /// non-virtual member limitation of base-type proxying and is a
    /// documented capability restriction, not an error.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.overridable = false;
        self
    }

    /// The operation's open signature.
    #[must_use]
    pub fn sig(&self) -> &OperationSig {
        &self.sig
    }

    /// Whether advice can wrap this operation on subclass proxies.
    #[must_use]
    pub fn is_overridable(&self) -> bool {
        self.overridable
    }

    /// The bound invoker.
    #[must_use]
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("sig", &self.sig)
            .field("overridable", &self.overridable)
            .finish()
    }
}
