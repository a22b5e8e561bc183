// src/analysis/mod.rs

//! Read-only, advisory analyses over a snapshot.
//!
//! - [`critical_path`]: forward/backward pass over leaf tasks, float per
//!   task and the zero-float set.
//! - [`leveling`]: greedy per-owner over-allocation resolver that proposes
//!   shifts within each task's float.
//!
//! Neither ever writes to the store.

pub mod critical_path;
pub mod leveling;

pub use critical_path::{compute_critical_path, CriticalPathReport, TaskTiming};
pub use leveling::{compute_leveling_proposals, LevelingOptions, LevelingProposal};
