//! Dependency Graph
//!
//! This module owns the bidirectional bookkeeping between tracked keys and
//! the computations that read them.
//!
//! # Overview
//!
//! The graph is bipartite: `(target, key)` pairs on one side, dependents on
//! the other. Dependents come in two kinds, stored in two tables:
//!
//! - Computeds, which a write dirty-marks (transitively) so their next read
//!   recomputes.
//! - Effects, which a write invokes synchronously once dirty-marking has
//!   completed.
//!
//! # Design Decisions
//!
//! 1. Both tables are process-wide state owned by this module; external
//!    code only reaches them through the intercepted read/write paths and
//!    the watch API.
//!
//! 2. Targets are keyed by wrapper identity (`TargetId`), never by the
//!    wrapped storage, so re-wrapping or sharing a record cannot alias two
//!    graph nodes.
//!
//! 3. Dirty-marking always finishes before notification starts, which is
//!    what lets an effect read a computed mid-cascade and observe a value
//!    derived from the new upstream state.

mod tables;
mod target;

pub use target::{TargetId, Watchable};

pub(crate) use tables::{
    clear_link, notify, propagate, remove_effect, subscribe, track, unsubscribe,
};
