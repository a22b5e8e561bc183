// src/dag/mod.rs

//! Dependency graph representation.
//!
//! - [`graph`] holds the adjacency built fresh from each snapshot: typed
//!   predecessor edges, their reverse (successors), and the parent/child
//!   hierarchy. It also computes the order tasks are reconciled and
//!   written in.
//! - [`cycle`] validates proposed edits (new predecessor sets, new parents)
//!   before anything is written.

pub mod cycle;
pub mod graph;

pub use cycle::{find_cycle_with, would_create_hierarchy_cycle};
pub use graph::{DependencyGraph, ScheduleOrder};
