//! Computed (Derived) Values
//!
//! A Computed is a lazily re-evaluated cached value. Its dependencies are
//! discovered while the getter runs: the computed is pushed on the tracking
//! stack, so every tracked read inside the getter records the computed as a
//! dependent of the key it read.
//!
//! # How Computeds Work
//!
//! 1. A computed starts dirty with a `Nil` cache. The getter does not run at
//!    construction.
//!
//! 2. Reading the value while dirty recomputes: the getter runs with the
//!    previous cached value as its argument, the result becomes the new
//!    cache, and the dirty flag clears.
//!
//! 3. When an upstream key changes, the computed is marked dirty again —
//!    transitively through the dependency graph — before any effect runs.
//!
//! 4. The dirty flag is the sole recompute authority. A getter that returned
//!    `Nil` is cached like any other result and re-evaluates only on the
//!    next upstream change.
//!
//! # Previous-Value Getters
//!
//! The getter receives the previous cached value (`Nil` on the first run),
//! which lets callers build incremental computations without a side channel.

use std::sync::{Arc, RwLock, Weak};

use super::context::ComputedFrame;
use crate::graph::{self, TargetId, Watchable};
use crate::reactive::VALUE_KEY;
use crate::value::Value;

struct ComputedState {
    cached: Value,
    dirty: bool,
}

struct ComputedInner {
    id: TargetId,
    getter: Box<dyn Fn(Value) -> Value + Send + Sync>,
    setter: Option<Box<dyn Fn(Value) + Send + Sync>>,
    state: RwLock<ComputedState>,
}

/// A lazily-evaluated, cache-backed derived value.
///
/// Cloning a `Computed` clones the handle; all clones share the same cache,
/// dirty flag, and graph identity.
///
/// # Example
///
/// ```rust,ignore
/// let n = Ref::new(Value::Int(1));
/// let n2 = n.clone();
/// let doubled = Computed::new(move |_| {
///     Value::Int(n2.get().as_int().unwrap_or(0) * 2)
/// });
///
/// assert_eq!(doubled.get(), Value::Int(2));
/// ```
pub struct Computed {
    inner: Arc<ComputedInner>,
}

impl Computed {
    /// Create a read-only computed from a getter.
    ///
    /// The getter is not run until the value is first read.
    pub fn new<G>(getter: G) -> Self
    where
        G: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self::build(Box::new(getter), None)
    }

    /// Create a read/write computed from a getter and a setter.
    ///
    /// The setter receives the incoming value on writes.
    pub fn with_setter<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(Value) -> Value + Send + Sync + 'static,
        S: Fn(Value) + Send + Sync + 'static,
    {
        Self::build(Box::new(getter), Some(Box::new(setter)))
    }

    fn build(
        getter: Box<dyn Fn(Value) -> Value + Send + Sync>,
        setter: Option<Box<dyn Fn(Value) + Send + Sync>>,
    ) -> Self {
        Self {
            inner: Arc::new(ComputedInner {
                id: TargetId::new(),
                getter,
                setter,
                state: RwLock::new(ComputedState {
                    cached: Value::Nil,
                    dirty: true,
                }),
            }),
        }
    }

    /// Get the computed's graph identity.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Read the current value, recomputing first if dirty.
    ///
    /// The read is tracked: the current effect subscribes to this computed's
    /// `value` slot, and the current computed (when it is not this one) is
    /// recorded as a dependent.
    pub fn get(&self) -> Value {
        let dirty = self.inner.state.read().expect("computed lock poisoned").dirty;
        if dirty {
            self.recompute();
        }

        let value = self
            .inner
            .state
            .read()
            .expect("computed lock poisoned")
            .cached
            .clone();

        // Tracked after any recompute, so the subscription lands on the
        // outer frame rather than on this computed's own evaluation.
        graph::track(self.inner.id, VALUE_KEY);

        value
    }

    /// Write the value through the configured setter.
    ///
    /// Without a setter this is a complete no-op: nothing is stored, nothing
    /// is notified. With a setter, the incoming value replaces the cache,
    /// the setter runs, and — when the cache actually changed — dirtiness
    /// propagates downstream and subscribed effects fire with the old value.
    pub fn set(&self, value: Value) {
        let Some(setter) = &self.inner.setter else {
            return;
        };

        let old = {
            let mut state = self.inner.state.write().expect("computed lock poisoned");
            std::mem::replace(&mut state.cached, value.clone())
        };

        setter(value.clone());

        if !old.identity_eq(&value) {
            graph::propagate(self.inner.id, VALUE_KEY);
            graph::notify(self.inner.id, VALUE_KEY, old);
        }
    }

    /// Whether the cache is currently invalid.
    pub fn is_dirty(&self) -> bool {
        self.inner.state.read().expect("computed lock poisoned").dirty
    }

    /// Whether a setter was configured.
    pub fn is_writable(&self) -> bool {
        self.inner.setter.is_some()
    }

    /// Release this computed from the dependency graph.
    ///
    /// Removes it from every dependents list, drops its own dependents
    /// entry, and discards the cache. A released computed still answers
    /// reads, but upstream changes no longer invalidate it.
    pub fn release(&self) {
        graph::clear_link(self);

        let mut state = self.inner.state.write().expect("computed lock poisoned");
        state.cached = Value::Nil;
        state.dirty = true;
    }

    /// Run the getter with this computed as the current tracking frame.
    fn recompute(&self) {
        let previous = self
            .inner
            .state
            .read()
            .expect("computed lock poisoned")
            .cached
            .clone();

        tracing::trace!(id = self.inner.id.raw(), "computed recompute");

        // The frame is popped on every exit path, including a panicking
        // getter.
        let result = {
            let _frame = ComputedFrame::enter(self.clone());
            (self.inner.getter)(previous)
        };

        let mut state = self.inner.state.write().expect("computed lock poisoned");
        state.cached = result;
        state.dirty = false;
    }

    /// Invalidate the cache. Called by dirty propagation.
    pub(crate) fn mark_dirty(&self) {
        self.inner.state.write().expect("computed lock poisoned").dirty = true;
    }

    /// Handle identity: do both handles share the same computed?
    pub fn same(&self, other: &Computed) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> ComputedWeak {
        ComputedWeak {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Clone for Computed {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Watchable for Computed {
    fn target_id(&self) -> TargetId {
        self.inner.id
    }
}

impl std::fmt::Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// Weak handle stored in the dependents table, so the graph never keeps a
/// released-and-dropped computed alive. Dead entries are pruned during
/// propagation.
#[derive(Clone)]
pub(crate) struct ComputedWeak {
    id: TargetId,
    inner: Weak<ComputedInner>,
}

impl ComputedWeak {
    pub(crate) fn target_id(&self) -> TargetId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<Computed> {
        self.inner.upgrade().map(|inner| Computed { inner })
    }
}
