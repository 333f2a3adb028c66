use std::any::Any;
use std::fmt;

use crate::operation::{OperationSig, ParamMode, ParamSpec};
use crate::{Error, Result};

/// One positional slot of an argument record.
pub struct ArgSlot {
    spec: ParamSpec,
    value: Option<Box<dyn Any + Send>>,
}

impl ArgSlot {
    /// The parameter this slot is bound to.
    #[must_use]
    pub fn spec(&self) -> &ParamSpec {
        &self.spec
    }

    /// Whether the slot currently holds a value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Mutable, fixed-length argument record for a single call.
///
/// Slots positionally match the operation's parameter list, including `InOut`
/// and `Out` parameters: output channels are regular slots the target writes and
/// the caller reads back after dispatch. Interceptors may rewrite any slot
/// before proceeding.
///
/// Accessors are `Option`-based; [`ArgList::expect`] and
/// [`ArgList::expect_take`] convert a missing or mistyped slot into an
/// [`Error::ArgumentMismatch`] for use inside invokers and advice.
pub struct ArgList {
    slots: Vec<ArgSlot>,
}

impl ArgList {
    /// An argument record with no slots, for nullary operations.
    #[must_use]
    pub fn empty() -> Self {
        ArgList { slots: Vec::new() }
    }

    /// Creates an unset record shaped after a signature's parameter list.
    #[must_use]
    pub fn for_sig(sig: &OperationSig) -> Self {
        ArgList {
            slots: sig
                .params
                .iter()
                .map(|spec| ArgSlot {
                    spec: spec.clone(),
                    value: None,
                })
                .collect(),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the record has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The parameter spec at `index`.
    #[must_use]
    pub fn spec(&self, index: usize) -> Option<&ParamSpec> {
        self.slots.get(index).map(ArgSlot::spec)
    }

    /// Whether the slot at `index` holds a value.
    #[must_use]
    pub fn is_set(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(ArgSlot::is_set)
    }

    /// Writes a value into a slot, returning `false` if `index` is out of range.
    pub fn set<T: Any + Send>(&mut self, index: usize, value: T) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.value = Some(Box::new(value));
                true
            }
            None => false,
        }
    }

    /// Empties a slot (used to model consuming an `Out` value).
    pub fn clear(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.value = None;
        }
    }

    /// Reads a slot as type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.value.as_ref()?.downcast_ref::<T>()
    }

    /// Mutable view of a slot as type `T`.
    #[must_use]
    pub fn get_mut<T: Any>(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.value.as_mut()?.downcast_mut::<T>()
    }

    /// Removes and returns a slot's value as type `T`.
    ///
    /// If the value is present but of a different type it is left in place and
    /// `None` is returned.
    #[must_use]
    pub fn take<T: Any>(&mut self, index: usize) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        if slot.value.as_ref()?.is::<T>() {
            let boxed = slot.value.take()?;
            // Checked above, the downcast cannot fail.
            boxed.downcast::<T>().ok().map(|b| *b)
        } else {
            None
        }
    }

    /// Reads a slot as type `T`, surfacing failure as [`Error::ArgumentMismatch`].
    ///
    /// # Errors
    /// Fails when the slot is out of range, unset, or of a different type.
    pub fn expect<T: Any>(&self, index: usize, operation: &str) -> Result<&T> {
        self.get::<T>(index).ok_or_else(|| Error::ArgumentMismatch {
            operation: operation.to_string(),
            message: format!("slot {index} is missing or has an unexpected type"),
        })
    }

    /// Takes a slot's value as type `T`, surfacing failure as [`Error::ArgumentMismatch`].
    ///
    /// # Errors
    /// Fails when the slot is out of range, unset, or of a different type.
    pub fn expect_take<T: Any>(&mut self, index: usize, operation: &str) -> Result<T> {
        self.take::<T>(index).ok_or_else(|| Error::ArgumentMismatch {
            operation: operation.to_string(),
            message: format!("slot {index} is missing or has an unexpected type"),
        })
    }

    /// Validates the record against a signature before dispatch: the slot count
    /// must equal the parameter count and every `In`/`InOut` slot must be set.
    /// `Out` slots may be empty.
    ///
    /// # Errors
    /// Returns [`Error::ArgumentMismatch`] describing the first violation.
    pub fn check_against(&self, sig: &OperationSig) -> Result<()> {
        if self.slots.len() != sig.params.len() {
            return Err(Error::ArgumentMismatch {
                operation: sig.full_name(),
                message: format!(
                    "expected {} argument slot(s), got {}",
                    sig.params.len(),
                    self.slots.len()
                ),
            });
        }
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.spec.mode != ParamMode::Out && !slot.is_set() {
                return Err(Error::ArgumentMismatch {
                    operation: sig.full_name(),
                    message: format!("{} slot `{}` is unset", slot.spec.mode, slot.spec.name),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for slot in &self.slots {
            list.entry(&format_args!(
                "{} {}: {}",
                slot.spec.mode,
                slot.spec.name,
                if slot.is_set() { "set" } else { "unset" }
            ));
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::TypeKey;

    fn sig() -> OperationSig {
        OperationSig::new(
            TypeKey::new("ISvc"),
            "do_it",
            vec![
                ParamSpec::input("val"),
                ParamSpec::inout("flag"),
                ParamSpec::output("result"),
            ],
        )
    }

    #[test]
    fn test_for_sig_shape() {
        let args = ArgList::for_sig(&sig());
        assert_eq!(args.len(), 3);
        assert!(!args.is_set(0));
        assert_eq!(args.spec(1).unwrap().mode, ParamMode::InOut);
        assert_eq!(args.spec(2).unwrap().mode, ParamMode::Out);
    }

    #[test]
    fn test_set_get_take() {
        let mut args = ArgList::for_sig(&sig());
        assert!(args.set(0, 41_i32));
        assert!(!args.set(9, 0_i32));
        assert_eq!(args.get::<i32>(0), Some(&41));
        assert_eq!(args.get::<String>(0), None);
        assert_eq!(args.take::<i32>(0), Some(41));
        assert!(!args.is_set(0));
    }

    #[test]
    fn test_take_wrong_type_leaves_value() {
        let mut args = ArgList::for_sig(&sig());
        args.set(0, 41_i32);
        assert_eq!(args.take::<String>(0), None);
        assert!(args.is_set(0));
    }

    #[test]
    fn test_get_mut_rewrite() {
        let mut args = ArgList::for_sig(&sig());
        args.set(1, false);
        *args.get_mut::<bool>(1).unwrap() = true;
        assert_eq!(args.get::<bool>(1), Some(&true));
    }

    #[test]
    fn test_check_against_requires_inputs() {
        let sig = sig();
        let mut args = ArgList::for_sig(&sig);
        // Out slot (2) may stay unset, but In (0) and InOut (1) must be filled.
        let err = args.check_against(&sig).unwrap_err();
        assert!(matches!(err, Error::ArgumentMismatch { .. }));

        args.set(0, 1_i32);
        args.set(1, true);
        args.check_against(&sig).unwrap();
    }

    #[test]
    fn test_check_against_arity() {
        let args = ArgList::empty();
        let err = args.check_against(&sig()).unwrap_err();
        assert!(matches!(err, Error::ArgumentMismatch { .. }));
    }

    #[test]
    fn test_expect_helpers() {
        let mut args = ArgList::for_sig(&sig());
        args.set(0, 7_i32);
        assert_eq!(*args.expect::<i32>(0, "ISvc.do_it").unwrap(), 7);
        assert!(args.expect::<i32>(2, "ISvc.do_it").is_err());
        assert_eq!(args.expect_take::<i32>(0, "ISvc.do_it").unwrap(), 7);
    }
}
