// src/schedule/anomaly.rs

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::model::TaskId;
use crate::types::ConstraintType;

/// A per-task problem found during a run.
///
/// Anomalies isolate the offending task (or edge) and let the run carry on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A dependency edge points at a task that is not in the snapshot. The
    /// edge is skipped.
    UnknownPredecessor { task: TaskId, predecessor: TaskId },
    /// A StartNoLaterThan / FinishNoLaterThan constraint is breached. Never
    /// corrected automatically.
    ConstraintViolationAdvisory {
        task: TaskId,
        constraint: ConstraintType,
        constraint_date: NaiveDate,
        actual: NaiveDate,
    },
    /// Computed (or stored) dates end before they start. The task keeps its
    /// previous dates.
    InvalidDateRange {
        task: TaskId,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// The task sits on a dependency cycle already present in the store. Its
    /// dates are left unchanged.
    ResidualCycle { task: TaskId },
    /// An exclusion link points at a task that is not in the snapshot.
    UnknownExclusionPeer { task: TaskId, peer: TaskId },
    /// A cascade hit its step bound and stopped early.
    CascadeLimitReached { origin: TaskId, limit: usize },
}

impl Anomaly {
    /// Task the anomaly is attached to.
    pub fn task(&self) -> &str {
        match self {
            Anomaly::UnknownPredecessor { task, .. }
            | Anomaly::ConstraintViolationAdvisory { task, .. }
            | Anomaly::InvalidDateRange { task, .. }
            | Anomaly::ResidualCycle { task }
            | Anomaly::UnknownExclusionPeer { task, .. } => task,
            Anomaly::CascadeLimitReached { origin, .. } => origin,
        }
    }

    pub fn is_advisory_violation(&self) -> bool {
        matches!(self, Anomaly::ConstraintViolationAdvisory { .. })
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::UnknownPredecessor { task, predecessor } => {
                write!(f, "task '{task}' depends on unknown task '{predecessor}'")
            }
            Anomaly::ConstraintViolationAdvisory {
                task,
                constraint,
                constraint_date,
                actual,
            } => write!(
                f,
                "task '{task}' breaches {constraint} {constraint_date} (scheduled {actual})"
            ),
            Anomaly::InvalidDateRange { task, start, end } => {
                write!(f, "task '{task}' would end ({end}) before it starts ({start})")
            }
            Anomaly::ResidualCycle { task } => {
                write!(f, "task '{task}' is part of a dependency cycle")
            }
            Anomaly::UnknownExclusionPeer { task, peer } => {
                write!(f, "task '{task}' excludes unknown task '{peer}'")
            }
            Anomaly::CascadeLimitReached { origin, limit } => {
                write!(f, "cascade from '{origin}' stopped after {limit} steps")
            }
        }
    }
}

/// Log and collect an anomaly, ignoring exact repeats within one run.
pub(crate) fn record(out: &mut Vec<Anomaly>, anomaly: Anomaly) {
    if out.contains(&anomaly) {
        return;
    }
    warn!(task = %anomaly.task(), "{anomaly}");
    out.push(anomaly);
}
