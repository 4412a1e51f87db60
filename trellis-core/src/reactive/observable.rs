//! Observable (Reactive Object) Implementation
//!
//! An Observable wraps a record and intercepts its keyed reads and writes.
//!
//! # How Observables Work
//!
//! 1. A tracked read records the current effect as a subscriber of
//!    `(observable, key)` and the current computed as a dependent.
//!
//! 2. A write that actually changes the stored value (identity/primitive
//!    equality) first dirty-marks every transitively dependent computed,
//!    then invokes the key's effects in insertion order with the old value.
//!
//! 3. In deep mode, record values are converted to Observables — recursively
//!    at construction, and again at write time for records assigned later.
//!    Conversion is idempotent: an already-reactive value passes through.
//!
//! The wrapper is the graph identity; the underlying record never enters
//! the dependency tables.

use std::sync::Arc;

use crate::graph::{self, TargetId, Watchable};
use crate::reactive::VALUE_KEY;
use crate::value::{Table, Value};

struct ObservableInner {
    id: TargetId,
    storage: Table,
    deep: bool,
    is_ref: bool,
}

/// A record wrapper whose keyed access drives dependency tracking and
/// change notification.
///
/// Cloning an `Observable` clones the handle; all clones share the same
/// storage and graph identity.
pub struct Observable {
    inner: Arc<ObservableInner>,
}

impl Observable {
    /// Wrap a record in deep mode: record-typed entries are recursively
    /// converted to Observables before storage.
    pub fn new(record: Table) -> Self {
        wrap_deep(record)
    }

    /// Wrap a record in shallow mode: entries are stored as-is.
    pub fn new_shallow(record: Table) -> Self {
        Self::from_parts(record, false, false)
    }

    fn from_parts(storage: Table, deep: bool, is_ref: bool) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                id: TargetId::new(),
                storage,
                deep,
                is_ref,
            }),
        }
    }

    /// Get the observable's graph identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Tracked read of `key`. Missing keys yield `Nil`.
    ///
    /// Records the current effect as a subscriber and the current computed
    /// as a dependent of `(self, key)` before returning.
    pub fn get(&self, key: &str) -> Value {
        let value = self.inner.storage.get(key);
        graph::track(self.inner.id, key);
        value
    }

    /// Read `key` without recording a dependency.
    pub fn get_untracked(&self, key: &str) -> Value {
        self.inner.storage.get(key)
    }

    /// Write `value` under `key`.
    ///
    /// In deep mode a plain record value is converted to an Observable
    /// first. A write whose new value is identity-equal to the old one is a
    /// no-op. Otherwise the value is stored, every dependent computed of
    /// `(self, key)` is recursively marked dirty, and the key's effects run
    /// in insertion order with the old value as argument.
    pub fn set(&self, key: &str, value: Value) {
        // A ref recognizes its single slot only.
        if self.inner.is_ref && key != VALUE_KEY {
            return;
        }

        let value = if self.inner.deep { reactify(value) } else { value };

        let old = self.inner.storage.get(key);
        if old.identity_eq(&value) {
            return;
        }

        tracing::trace!(target_id = self.inner.id.raw(), key, "observable write");
        self.inner.storage.set(key, value);

        graph::propagate(self.inner.id, key);
        graph::notify(self.inner.id, key, old);
    }

    /// Snapshot the stored keys, without tracking.
    pub fn keys(&self) -> Vec<String> {
        self.inner.storage.keys()
    }

    /// Whether writes convert record values to Observables.
    pub fn is_deep(&self) -> bool {
        self.inner.deep
    }

    /// Whether this observable was constructed as a ref.
    pub fn is_ref(&self) -> bool {
        self.inner.is_ref
    }

    /// Handle identity: do both handles share the same observable?
    pub fn same(&self, other: &Observable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The raw storage, bypassing interception. Used for traversal by deep
    /// construction and the reactive walker.
    pub(crate) fn raw(&self) -> &Table {
        &self.inner.storage
    }
}

impl Clone for Observable {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Watchable for Observable {
    fn target_id(&self) -> TargetId {
        self.inner.id
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("deep", &self.inner.deep)
            .field("is_ref", &self.inner.is_ref)
            .field("storage", &self.inner.storage)
            .finish()
    }
}

/// A single-`value`-slot observable.
///
/// `Ref::new(v)` is the deep wrapping of `{ value: v }`, tagged at
/// construction so `is_ref` never has to inspect keys. All tracking and
/// notification behavior is inherited from [`Observable`].
pub struct Ref {
    obs: Observable,
}

impl Ref {
    /// Create a ref holding `initial`. `Nil` is the normalized form of an
    /// absent initial value.
    pub fn new(initial: Value) -> Self {
        let obs = Observable::from_parts(Table::new(), true, true);
        obs.set(VALUE_KEY, initial);
        Self { obs }
    }

    /// Get the ref's graph identity.
    pub fn id(&self) -> TargetId {
        self.obs.id()
    }

    /// Tracked read of the `value` slot.
    pub fn get(&self) -> Value {
        self.obs.get(VALUE_KEY)
    }

    /// Read the `value` slot without recording a dependency.
    pub fn get_untracked(&self) -> Value {
        self.obs.get_untracked(VALUE_KEY)
    }

    /// Write the `value` slot.
    pub fn set(&self, value: Value) {
        self.obs.set(VALUE_KEY, value);
    }

    /// The underlying observable.
    pub fn observable(&self) -> &Observable {
        &self.obs
    }

    /// Recover a ref handle from an observable constructed by `Ref::new`.
    pub fn from_observable(obs: Observable) -> Option<Ref> {
        if obs.is_ref() {
            Some(Ref { obs })
        } else {
            None
        }
    }
}

impl Clone for Ref {
    fn clone(&self) -> Self {
        Self {
            obs: self.obs.clone(),
        }
    }
}

impl Watchable for Ref {
    fn target_id(&self) -> TargetId {
        self.obs.id()
    }
}

impl std::fmt::Debug for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.obs.id())
            .field("value", &self.get_untracked())
            .finish()
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Reactive(r.obs)
    }
}

/// Convert a value for storage in a deep observable: plain records become
/// Observables, everything else — already-reactive values included — passes
/// through unchanged.
pub(crate) fn reactify(value: Value) -> Value {
    match value {
        Value::Table(record) => Value::Reactive(wrap_deep(record)),
        other => other,
    }
}

fn wrap_deep(record: Table) -> Observable {
    for (key, value) in record.entries() {
        if let Value::Table(nested) = value {
            record.set(&key, Value::Reactive(wrap_deep(nested)));
        }
    }
    Observable::from_parts(record, true, false)
}


// ----------------------------------------------------------------------------
// Python Bindings
// ----------------------------------------------------------------------------

#[cfg(feature = "python")]
mod python {
    use pyo3::exceptions::PyTypeError;
    use pyo3::prelude::*;
    use pyo3::types::{PyBool, PyDict};

    use super::Ref;
    use crate::value::{Table, Value};

    /// Python-exposed Ref type.
    ///
    /// Bridges host values across the boundary: `None`, booleans, integers,
    /// floats, strings, and dicts (recursively) convert both ways. Reactive
    /// record values come back as detached dict snapshots; computed values
    /// do not cross.
    #[pyclass(name = "Ref")]
    pub struct PyRefValue {
        inner: Ref,
    }

    #[pymethods]
    impl PyRefValue {
        /// Create a new ref with the given initial value.
        #[new]
        #[pyo3(signature = (value = None))]
        fn new(value: Option<Bound<'_, PyAny>>) -> PyResult<Self> {
            let initial = match value {
                Some(v) => py_to_value(&v)?,
                None => Value::Nil,
            };
            Ok(Self {
                inner: Ref::new(initial),
            })
        }

        /// Get the current value.
        #[getter]
        fn value(&self, py: Python<'_>) -> PyResult<PyObject> {
            value_to_py(py, &self.inner.get())
        }

        /// Set a new value.
        #[setter]
        fn set_value(&self, value: Bound<'_, PyAny>) -> PyResult<()> {
            self.inner.set(py_to_value(&value)?);
            Ok(())
        }

        /// Get the ref's unique ID.
        #[getter]
        fn id(&self) -> u64 {
            self.inner.id().raw()
        }

        fn __repr__(&self) -> String {
            format!(
                "Ref(id={}, value={:?})",
                self.inner.id().raw(),
                self.inner.get_untracked()
            )
        }
    }

    fn value_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
        match value {
            Value::Nil => Ok(py.None()),
            Value::Bool(b) => Ok((*b).into_py(py)),
            Value::Int(i) => Ok((*i).into_py(py)),
            Value::Float(x) => Ok((*x).into_py(py)),
            Value::Str(s) => Ok(s.as_ref().into_py(py)),
            Value::Table(t) => table_to_dict(py, t),
            Value::Reactive(o) => table_to_dict(py, o.raw()),
            Value::Computed(_) => Err(PyTypeError::new_err(
                "computed values cannot cross the host boundary",
            )),
        }
    }

    fn table_to_dict(py: Python<'_>, table: &Table) -> PyResult<PyObject> {
        let dict = PyDict::new_bound(py);
        for (key, value) in table.entries() {
            dict.set_item(key, value_to_py(py, &value)?)?;
        }
        Ok(dict.into_any().unbind())
    }

    fn py_to_value(value: &Bound<'_, PyAny>) -> PyResult<Value> {
        if value.is_none() {
            return Ok(Value::Nil);
        }
        // bool first: Python bools extract as integers otherwise.
        if let Ok(b) = value.downcast::<PyBool>() {
            return Ok(Value::Bool(b.is_true()));
        }
        if let Ok(i) = value.extract::<i64>() {
            return Ok(Value::Int(i));
        }
        if let Ok(x) = value.extract::<f64>() {
            return Ok(Value::Float(x));
        }
        if let Ok(s) = value.extract::<String>() {
            return Ok(Value::str(s));
        }
        if let Ok(dict) = value.downcast::<PyDict>() {
            let table = Table::new();
            for (key, entry) in dict.iter() {
                let key: String = key.extract()?;
                table.set(&key, py_to_value(&entry)?);
            }
            return Ok(Value::Table(table));
        }
        let type_name: String = value.get_type().name()?.extract()?;
        Err(PyTypeError::new_err(format!(
            "unsupported host value of type {type_name}"
        )))
    }
}

#[cfg(feature = "python")]
pub use python::PyRefValue;
