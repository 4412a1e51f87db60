//! Trellis Core
//!
//! This crate provides the core of the Trellis fine-grained reactivity
//! engine. It implements:
//!
//! - Reactive primitives (observables, refs, computeds)
//! - Automatic dependency tracking with lazy invalidation
//! - A watch API for registering synchronous effects
//!
//! The crate is designed to be used both as a native Rust library and as a
//! Python extension module via PyO3 (behind the `python` feature).
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - `value`: the dynamic value model shared by all primitives
//! - `reactive`: observables, refs, computeds, and the watch API
//! - `graph`: the dependency and subscriber tables behind them
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_core::reactive::{watch, Computed, Ref};
//! use trellis_core::value::Value;
//!
//! // Create a ref
//! let count = Ref::new(Value::Int(0));
//!
//! // Create a derived value
//! let count_for_doubled = count.clone();
//! let doubled = Computed::new(move |_| {
//!     Value::Int(count_for_doubled.get().as_int().unwrap_or(0) * 2)
//! });
//!
//! // Register an effect
//! let count_for_effect = count.clone();
//! let doubled_for_effect = doubled.clone();
//! watch(move |_| {
//!     println!(
//!         "Count: {:?}, Doubled: {:?}",
//!         count_for_effect.get(),
//!         doubled_for_effect.get()
//!     );
//! });
//!
//! // Update the ref
//! count.set(Value::Int(5));
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//! ```

pub mod graph;
pub mod reactive;
pub mod value;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Python module definition.
///
/// This function is called by Python when importing the module.
/// It registers all Python-exposed types and functions.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Register reactive primitives
    m.add_class::<reactive::PyRefValue>()?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
