//! Pointcuts: predicates selecting the operations an advisor applies to.
//!
//! A pointcut answers two questions:
//!
//! 1. statically, once per operation signature: does this advisor apply at all?
//! 2. dynamically, per call (only if [`Pointcut::is_dynamic`]): given the
//!    current arguments, does it apply to *this* invocation?
//!
//! Static matching is the cheap gate. The chain builder evaluates it once per
//! closed operation key and caches the result; a dynamic pointcut that matched
//! statically stays in the chain and is vetoed per call. Static results must be
//! referentially stable: for a given (operation, declaring type) pair a static
//! pointcut must always answer the same, independent of argument values.
//!
//! Pointcuts are pure predicates. They have no error paths.

use std::fmt;
use std::sync::Arc;

use crate::invocation::ArgList;
use crate::operation::{OperationSig, TypeKey};
use crate::snapshot::Snapshot;

/// Predicate selecting which operations an advisor applies to.
pub trait Pointcut: Send + Sync {
    /// Static match, evaluated once per operation signature and cached.
    fn matches_operation(&self, sig: &OperationSig, declaring: &TypeKey) -> bool;

    /// Whether [`Pointcut::matches_invocation`] must be re-evaluated per call.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Per-call match, consulted only for dynamic pointcuts that matched
    /// statically. Default accepts every invocation.
    fn matches_invocation(&self, sig: &OperationSig, declaring: &TypeKey, args: &ArgList) -> bool {
        let _ = (sig, declaring, args);
        true
    }

    /// Snapshot support for serializable pointcuts. Default: not serializable.
    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        None
    }
}

/// Matches every operation. Used when plain advice is added without an explicit
/// pointcut.
#[derive(Debug, Default, Clone, Copy)]
pub struct TruePointcut;

impl Pointcut for TruePointcut {
    fn matches_operation(&self, _: &OperationSig, _: &TypeKey) -> bool {
        true
    }

    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        Some(self)
    }
}

/// Matches no operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FalsePointcut;

impl Pointcut for FalsePointcut {
    fn matches_operation(&self, _: &OperationSig, _: &TypeKey) -> bool {
        false
    }
}

/// Matches operations by name against a list of exact names or trailing-`*`
/// prefix patterns (`get*` matches `get_count`).
#[derive(Debug, Clone)]
pub struct NameMatchPointcut {
    patterns: Vec<String>,
}

impl NameMatchPointcut {
    /// Creates an empty matcher (matches nothing until patterns are added).
    #[must_use]
    pub fn new() -> Self {
        NameMatchPointcut {
            patterns: Vec::new(),
        }
    }

    /// Adds a name or trailing-`*` prefix pattern.
    #[must_use]
    pub fn name(mut self, pattern: &str) -> Self {
        self.patterns.push(pattern.to_string());
        self
    }

    /// The registered patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub(crate) fn from_patterns(patterns: Vec<String>) -> Self {
        NameMatchPointcut { patterns }
    }

    fn matches_name(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| {
            match pattern.strip_suffix('*') {
                Some(prefix) => name.starts_with(prefix),
                None => name == pattern,
            }
        })
    }
}

impl Default for NameMatchPointcut {
    fn default() -> Self {
        NameMatchPointcut::new()
    }
}

impl Pointcut for NameMatchPointcut {
    fn matches_operation(&self, sig: &OperationSig, _: &TypeKey) -> bool {
        self.matches_name(&sig.name)
    }

    fn as_snapshot(&self) -> Option<&dyn Snapshot> {
        Some(self)
    }
}

/// Matches every operation declared on a specific surface.
#[derive(Debug, Clone)]
pub struct DeclaringTypePointcut {
    declaring: TypeKey,
}

impl DeclaringTypePointcut {
    /// Matches operations declared on `declaring`.
    #[must_use]
    pub fn new(declaring: TypeKey) -> Self {
        DeclaringTypePointcut { declaring }
    }
}

impl Pointcut for DeclaringTypePointcut {
    fn matches_operation(&self, _: &OperationSig, declaring: &TypeKey) -> bool {
        *declaring == self.declaring
    }
}

/// Static pointcut backed by a closure.
pub struct FnPointcut<F>(F);

impl<F> FnPointcut<F>
where
    F: Fn(&OperationSig, &TypeKey) -> bool + Send + Sync,
{
    /// Wraps a static predicate closure.
    #[must_use]
    pub fn new(f: F) -> Self {
        FnPointcut(f)
    }
}

impl<F> Pointcut for FnPointcut<F>
where
    F: Fn(&OperationSig, &TypeKey) -> bool + Send + Sync,
{
    fn matches_operation(&self, sig: &OperationSig, declaring: &TypeKey) -> bool {
        (self.0)(sig, declaring)
    }
}

/// Dynamic pointcut: a static gate plus a per-call predicate over the argument
/// record.
pub struct DynamicFnPointcut<S, D> {
    static_gate: S,
    per_call: D,
}

impl<S, D> DynamicFnPointcut<S, D>
where
    S: Fn(&OperationSig, &TypeKey) -> bool + Send + Sync,
    D: Fn(&OperationSig, &TypeKey, &ArgList) -> bool + Send + Sync,
{
    /// Combines a static gate with a per-call predicate.
    #[must_use]
    pub fn new(static_gate: S, per_call: D) -> Self {
        DynamicFnPointcut {
            static_gate,
            per_call,
        }
    }
}

impl<S, D> Pointcut for DynamicFnPointcut<S, D>
where
    S: Fn(&OperationSig, &TypeKey) -> bool + Send + Sync,
    D: Fn(&OperationSig, &TypeKey, &ArgList) -> bool + Send + Sync,
{
    fn matches_operation(&self, sig: &OperationSig, declaring: &TypeKey) -> bool {
        (self.static_gate)(sig, declaring)
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn matches_invocation(&self, sig: &OperationSig, declaring: &TypeKey, args: &ArgList) -> bool {
        (self.per_call)(sig, declaring, args)
    }
}

/// Shared pointcut handle.
pub type PointcutRef = Arc<dyn Pointcut>;

impl fmt::Debug for dyn Pointcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pointcut({})",
            if self.is_dynamic() { "dynamic" } else { "static" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: &str) -> OperationSig {
        OperationSig::new(TypeKey::new("ISvc"), name, vec![])
    }

    #[test]
    fn test_true_false_pointcuts() {
        let declaring = TypeKey::new("ISvc");
        assert!(TruePointcut.matches_operation(&sig("any"), &declaring));
        assert!(!FalsePointcut.matches_operation(&sig("any"), &declaring));
        assert!(!TruePointcut.is_dynamic());
    }

    #[test]
    fn test_name_match_exact_and_prefix() {
        let pc = NameMatchPointcut::new().name("ping").name("get*");
        let declaring = TypeKey::new("ISvc");
        assert!(pc.matches_operation(&sig("ping"), &declaring));
        assert!(pc.matches_operation(&sig("get_count"), &declaring));
        assert!(!pc.matches_operation(&sig("pinger"), &declaring));
        assert!(!pc.matches_operation(&sig("set_count"), &declaring));
    }

    #[test]
    fn test_name_match_is_deterministic() {
        let pc = NameMatchPointcut::new().name("ping");
        let declaring = TypeKey::new("ISvc");
        let s = sig("ping");
        let first = pc.matches_operation(&s, &declaring);
        let second = pc.matches_operation(&s, &declaring);
        assert_eq!(first, second);
    }

    #[test]
    fn test_declaring_type_pointcut() {
        let pc = DeclaringTypePointcut::new(TypeKey::new("ISvc"));
        assert!(pc.matches_operation(&sig("x"), &TypeKey::new("ISvc")));
        assert!(!pc.matches_operation(&sig("x"), &TypeKey::new("IOther")));
    }

    #[test]
    fn test_dynamic_pointcut_two_phases() {
        let pc = DynamicFnPointcut::new(
            |sig: &OperationSig, _: &TypeKey| sig.name.as_ref() == "guarded",
            |_: &OperationSig, _: &TypeKey, args: &ArgList| {
                args.get::<i32>(0).is_some_and(|v| *v > 0)
            },
        );
        let declaring = TypeKey::new("ISvc");
        let s = OperationSig::new(
            declaring.clone(),
            "guarded",
            vec![crate::operation::ParamSpec::input("v")],
        );
        assert!(pc.is_dynamic());
        assert!(pc.matches_operation(&s, &declaring));

        let mut args = ArgList::for_sig(&s);
        args.set(0, 5_i32);
        assert!(pc.matches_invocation(&s, &declaring, &args));
        args.set(0, -5_i32);
        assert!(!pc.matches_invocation(&s, &declaring, &args));
    }
}
