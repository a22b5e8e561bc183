// src/schedule/mod.rs

//! Date derivation passes.
//!
//! - [`link`]: one predecessor + one link type -> candidate dates.
//! - [`reconcile`]: per-task "most restrictive wins" + constraint handling,
//!   and the full-snapshot reconciliation pass.
//! - [`exclusion`]: mutual-exclusion overlap resolution.
//! - [`cascade`]: propagation of one task's change through its successors.
//! - [`anomaly`]: non-fatal per-task problems reported by all of the above.
//!
//! Every pass works on a [`crate::model::WorkingSet`] and a
//! [`crate::dag::DependencyGraph`] built from it; none of them touches the
//! store.

pub mod anomaly;
pub mod cascade;
pub mod exclusion;
pub mod link;
pub mod reconcile;

pub use anomaly::Anomaly;
pub use cascade::{cascade_from, CascadeOutcome};
pub use exclusion::{resolve_exclusions, ExclusionShift};
pub use link::{candidate_dates, effective_dates};
pub use reconcile::{reconcile, reconcile_task, ReconcileOutcome, TaskDecision};
