//! Dynamic Value Model
//!
//! The engine stores and propagates dynamically-typed values. A `Value` is
//! either a primitive (nil, boolean, integer, float, string), a plain record
//! (`Table`), or a handle to one of the reactive wrappers (`Observable`,
//! `Computed`).
//!
//! # Equality
//!
//! Change detection uses identity/primitive equality, never deep equality:
//!
//! - Primitives and strings compare by value (`f64` by IEEE `==`, so
//!   `NaN != NaN`).
//! - Tables, observables, and computeds compare by allocation identity.
//! - There is no numeric coercion: `Int(1)` and `Float(1.0)` are different.
//!
//! `PartialEq` for `Value` implements exactly this relation, so a write that
//! stores an identity-equal value is a no-op for the whole engine.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use crate::reactive::{Computed, Observable};

/// A plain string-keyed record.
///
/// Tables are shared handles: cloning a `Table` clones the handle, not the
/// entries. Identity (`same`) is handle identity.
///
/// Storing `Nil` under a key removes the key, so `keys` only ever reports
/// entries that hold a real value.
#[derive(Clone, Default)]
pub struct Table(Arc<RwLock<HashMap<String, Value>>>);

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Build a table from key/value pairs. `Nil` values are skipped.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let table = Self::new();
        for (key, value) in entries {
            table.set(&key.into(), value);
        }
        table
    }

    /// Get the value stored under `key`, or `Nil` if absent.
    pub fn get(&self, key: &str) -> Value {
        self.0
            .read()
            .expect("table lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Store `value` under `key`. Storing `Nil` removes the entry.
    pub fn set(&self, key: &str, value: Value) {
        let mut entries = self.0.write().expect("table lock poisoned");
        if value.is_nil() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), value);
        }
    }

    /// Snapshot the current entries.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .read()
            .expect("table lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Snapshot the current keys.
    pub fn keys(&self) -> Vec<String> {
        self.0
            .read()
            .expect("table lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.0.read().expect("table lock poisoned").len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle identity: do both handles point at the same storage?
    pub fn same(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.0.read().expect("table lock poisoned");
        f.debug_map().entries(entries.iter()).finish()
    }
}

/// A dynamically-typed value.
#[derive(Clone)]
pub enum Value {
    /// The absence sentinel. Reads of missing keys yield `Nil`.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// A plain, untracked record.
    Table(Table),
    /// A reactive object (or ref) participating in dependency tracking.
    Reactive(Observable),
    /// A lazily-recomputed derived value.
    Computed(Computed),
}

impl Value {
    /// Build a string value.
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Value::Table(_))
    }

    /// Whether this value is a reactive object (refs included).
    pub fn is_reactive(&self) -> bool {
        matches!(self, Value::Reactive(_))
    }

    /// Whether this value is a ref (a reactive object tagged at
    /// construction as a single-`value`-slot wrapper).
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Reactive(o) if o.is_ref())
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Value::Computed(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Observable> {
        match self {
            Value::Reactive(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_computed(&self) -> Option<&Computed> {
        match self {
            Value::Computed(c) => Some(c),
            _ => None,
        }
    }

    /// Identity/primitive equality. This is the relation write paths use to
    /// decide whether a value changed.
    pub fn identity_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.same(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.same(b),
            (Value::Computed(a), Value::Computed(b)) => a.same(b),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.identity_eq(other)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Table(t) => write!(f, "{t:?}"),
            Value::Reactive(o) => write!(f, "reactive(#{})", o.id().raw()),
            Value::Computed(c) => write!(f, "computed(#{})", c.id().raw()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::str(s)
    }
}

impl From<Table> for Value {
    fn from(t: Table) -> Self {
        Value::Table(t)
    }
}

impl From<Observable> for Value {
    fn from(o: Observable) -> Self {
        Value::Reactive(o)
    }
}

impl From<Computed> for Value {
    fn from(c: Computed) -> Self {
        Value::Computed(c)
    }
}
