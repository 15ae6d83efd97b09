// Callable: an erased invocation target.
//
// Either an (entity id, method name) pair resolved through the registry at
// call time, or a custom target (lambda, managed delegate) behind a trait
// object. Holds no object pointer, so a callable can outlive its target;
// invoking a dead target reports InstanceNull instead of dangling.

use std::sync::Arc;

use crate::entity::{entity_registry, EntityId};
use crate::error::{CallError, CallResult};
use crate::string_name::StringName;
use crate::variant::Variant;

/// Implemented by custom invocation targets: lambdas and foreign-runtime
/// delegates. Identity (not content) drives equality and hashing.
pub trait CustomCallable: Send + Sync {
    fn call(&self, args: &[Variant]) -> CallResult;

    /// Object this target is logically attached to, if any. Drives back-edge
    /// bookkeeping for signal connections.
    fn target_id(&self) -> EntityId {
        EntityId::NULL
    }

    /// Display name for diagnostics.
    fn name(&self) -> String;

    /// Stable identity key; two wrappers around the same underlying target
    /// must return the same key.
    fn identity_key(&self) -> u64;

    /// Whether the target can still be invoked.
    fn is_valid(&self) -> bool {
        true
    }
}

#[derive(Clone, Default)]
pub enum Callable {
    #[default]
    Null,
    Method {
        target: EntityId,
        method: StringName,
    },
    Custom(Arc<dyn CustomCallable>),
}

impl Callable {
    pub fn method(target: EntityId, method: impl Into<StringName>) -> Self {
        Callable::Method {
            target,
            method: method.into(),
        }
    }

    pub fn custom(target: Arc<dyn CustomCallable>) -> Self {
        Callable::Custom(target)
    }

    /// Wrap a plain closure. The callable's identity is the allocation, so
    /// two `from_fn` results never compare equal.
    pub fn from_fn(
        name: &str,
        f: impl Fn(&[Variant]) -> CallResult + Send + Sync + 'static,
    ) -> Self {
        struct FnCallable {
            name: String,
            f: Box<dyn Fn(&[Variant]) -> CallResult + Send + Sync>,
        }
        impl CustomCallable for FnCallable {
            fn call(&self, args: &[Variant]) -> CallResult {
                (self.f)(args)
            }
            fn name(&self) -> String {
                self.name.clone()
            }
            fn identity_key(&self) -> u64 {
                self as *const FnCallable as u64
            }
        }
        Callable::Custom(Arc::new(FnCallable {
            name: name.to_owned(),
            f: Box::new(f),
        }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Callable::Null)
    }

    /// The entity this callable targets, or NULL for detached customs.
    pub fn object_id(&self) -> EntityId {
        match self {
            Callable::Null => EntityId::NULL,
            Callable::Method { target, .. } => *target,
            Callable::Custom(c) => c.target_id(),
        }
    }

    /// Method name for method callables, display name otherwise.
    pub fn method_name(&self) -> Option<StringName> {
        match self {
            Callable::Method { method, .. } => Some(*method),
            _ => None,
        }
    }

    /// Whether invoking now could succeed: the target still resolves (or the
    /// custom target reports itself valid).
    pub fn is_valid(&self) -> bool {
        match self {
            Callable::Null => false,
            Callable::Method { target, .. } => entity_registry().resolve(*target).is_some(),
            Callable::Custom(c) => c.is_valid(),
        }
    }

    /// Invoke the target. A dead method target reports `InstanceNull`; the
    /// caller decides whether that is an error (signal emission treats it as
    /// a skip).
    pub fn call(&self, args: &[Variant]) -> CallResult {
        match self {
            Callable::Null => Err(CallError::InstanceNull),
            Callable::Method { target, method } => {
                let Some(obj) = entity_registry().resolve(*target) else {
                    return Err(CallError::InstanceNull);
                };
                obj.call(*method, args)
            }
            Callable::Custom(c) => c.call(args),
        }
    }

    /// Identity key used for hashing and slot-map ordering.
    pub fn identity_key(&self) -> u64 {
        match self {
            Callable::Null => 0,
            Callable::Method { target, method } => {
                // Entity ids and intern ids are both process-unique; fold the
                // method id into the high bits the entity id never uses alone.
                target.to_raw() ^ ((method.id() as u64) << 1).rotate_left(32)
            }
            Callable::Custom(c) => c.identity_key(),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Null, Callable::Null) => true,
            (
                Callable::Method { target: t1, method: m1 },
                Callable::Method { target: t2, method: m2 },
            ) => t1 == t2 && m1 == m2,
            (Callable::Custom(a), Callable::Custom(b)) => a.identity_key() == b.identity_key(),
            _ => false,
        }
    }
}

impl Eq for Callable {}

impl std::hash::Hash for Callable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity_key().hash(state);
    }
}

impl std::fmt::Debug for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Null => write!(f, "Callable(null)"),
            Callable::Method { target, method } => {
                write!(f, "Callable({target}::{method})")
            }
            Callable::Custom(c) => write!(f, "Callable(custom {})", c.name()),
        }
    }
}

impl std::fmt::Display for Callable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Callable::Null => write!(f, "null::null"),
            Callable::Method { target, method } => write!(f, "{target}::{method}"),
            Callable::Custom(c) => write!(f, "{}", c.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_callables_compare_by_target_and_name() {
        let id = EntityId::from_raw(42);
        let a = Callable::method(id, "foo");
        let b = Callable::method(id, "foo");
        let c = Callable::method(id, "bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fn_callables_have_allocation_identity() {
        let a = Callable::from_fn("f", |_| Ok(Variant::Nil));
        let b = Callable::from_fn("f", |_| Ok(Variant::Nil));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn null_callable_reports_instance_null() {
        assert_eq!(Callable::Null.call(&[]), Err(CallError::InstanceNull));
    }

    #[test]
    fn dead_method_target_reports_instance_null() {
        let c = Callable::method(EntityId::from_raw(0xdead_0001), "anything");
        assert_eq!(c.call(&[]), Err(CallError::InstanceNull));
        assert!(!c.is_valid());
    }
}
