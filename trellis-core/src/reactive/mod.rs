//! Reactive Primitives
//!
//! This module implements the engine's public primitives: observables,
//! refs, computeds, and the watch API.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An Observable wraps a record and intercepts keyed reads and writes. A
//! read performed inside a tracking context (an effect's initial run or a
//! computed's getter) registers that context against the key; a write that
//! changes the value notifies everything registered.
//!
//! ## Refs
//!
//! A Ref is the degenerate single-slot observable: `{ value: v }`. It is
//! the cheapest way to make one value observable.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result and re-evaluates
//! lazily: upstream changes only mark it dirty, and the next read runs the
//! getter again. Getters receive their previous result, enabling
//! incremental computation.
//!
//! ## Effects
//!
//! Effects are caller-supplied callbacks registered through the watch API.
//! They re-run synchronously, at the point of mutation, whenever a key they
//! read during their registration run changes.
//!
//! # Implementation Notes
//!
//! Dependency discovery is automatic: a thread-local tracking context
//! records who is currently evaluating, and the interception paths consult
//! it on every read. This "transparent reactivity" approach is the one used
//! by Vue 3, SolidJS, and Leptos.

pub(crate) mod computed;
pub(crate) mod context;
pub(crate) mod effect;
pub(crate) mod observable;
mod watch;

pub use computed::Computed;
pub use effect::{Disposer, Effect, EffectId};
pub use observable::{Observable, Ref};
pub use watch::{unwatch, watch, watch_computed, watch_computed_fn, watch_reactive, watch_ref};

#[cfg(feature = "python")]
pub use observable::PyRefValue;

use crate::value::Value;

/// The key under which refs and computeds expose their single slot.
pub const VALUE_KEY: &str = "value";

/// Deep-wrap a plain record into an Observable.
///
/// Record-typed entries are recursively wrapped as well, and later writes
/// of plain records into the result are wrapped at write time. An
/// already-reactive input is returned unchanged; non-record values pass
/// through untouched.
pub fn reactive(value: Value) -> Value {
    observable::reactify(value)
}

/// Shallow-wrap a plain record into an Observable.
///
/// Only top-level keyed access is intercepted; stored values are never
/// converted. An already-reactive input is returned unchanged.
pub fn reactive_shallow(value: Value) -> Value {
    match value {
        Value::Table(record) => Value::Reactive(Observable::new_shallow(record)),
        other => other,
    }
}

/// Release a computed from the dependency graph and drop its cache.
pub fn clear_computed(c: &Computed) {
    c.release();
}

/// Whether `value` is an observable (refs included).
pub fn is_reactive(value: &Value) -> bool {
    value.is_reactive()
}

/// Whether `value` is a ref.
pub fn is_ref(value: &Value) -> bool {
    value.is_ref()
}

/// Whether `value` is a computed.
pub fn is_computed(value: &Value) -> bool {
    value.is_computed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Table;

    #[test]
    fn reactive_wraps_records() {
        let wrapped = reactive(Value::Table(Table::new()));
        assert!(is_reactive(&wrapped));
        assert!(!is_ref(&wrapped));
        assert!(!is_computed(&wrapped));
    }

    #[test]
    fn reactive_is_idempotent() {
        let first = reactive(Value::Table(Table::new()));
        let again = reactive(first.clone());

        let a = first.as_reactive().unwrap();
        let b = again.as_reactive().unwrap();
        assert!(a.same(b));
    }

    #[test]
    fn reactive_passes_primitives_through() {
        assert_eq!(reactive(Value::Int(1)), Value::Int(1));
        assert_eq!(reactive_shallow(Value::Nil), Value::Nil);
    }

    #[test]
    fn predicates_discriminate_the_three_variants() {
        let obs = reactive(Value::Table(Table::new()));
        let r: Value = Ref::new(Value::Int(1)).into();
        let c: Value = Value::Computed(Computed::new(|_| Value::Nil));

        assert!(is_reactive(&obs) && !is_ref(&obs) && !is_computed(&obs));
        assert!(is_reactive(&r) && is_ref(&r) && !is_computed(&r));
        assert!(!is_reactive(&c) && !is_ref(&c) && is_computed(&c));

        assert!(!is_reactive(&Value::Int(3)));
    }

    #[test]
    fn shallow_wrapping_is_shallow() {
        let record = Table::from_entries([(
            "nested",
            Value::Table(Table::from_entries([("x", Value::Int(1))])),
        )]);

        let wrapped = reactive_shallow(Value::Table(record));
        let obs = wrapped.as_reactive().unwrap();
        assert!(!obs.is_deep());
        assert!(obs.get("nested").is_table());
    }
}
