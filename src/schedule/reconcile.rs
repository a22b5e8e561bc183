// src/schedule/reconcile.rs

//! Reconciler: per-task "most restrictive wins" with violation-only overrides.
//!
//! For one task:
//! 1. `latest_start` is the maximum candidate start over all known
//!    predecessors (see [`super::link::candidate_dates`]).
//! 2. The stored start is replaced only when it is earlier than
//!    `latest_start`, or when the task is ASAP and starts later than
//!    `latest_start`. Otherwise stored dates stay exactly as they are.
//! 3. The task's own fixed-date constraint is applied on actual violation
//!    only; SNLT / FNLT are reported, never enforced.
//!
//! Duration is carried over unchanged by every move. Summary tasks are never
//! shifted by predecessors; their dates are the roll-up of their children,
//! and their own predecessors bound every task beneath them.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::calendar::Calendar;
use crate::dag::DependencyGraph;
use crate::model::{Task, TaskId, WorkingSet};
use crate::schedule::anomaly::{record, Anomaly};
use crate::schedule::exclusion::resolve_exclusions;
use crate::schedule::link::{candidate_dates, effective_dates};
use crate::types::ConstraintType;

/// What the reconciler decided for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDecision {
    pub id: TaskId,
    pub before: (NaiveDate, NaiveDate),
    pub after: (NaiveDate, NaiveDate),
    /// Most restrictive predecessor start, when the task has any usable
    /// predecessor.
    pub latest_start: Option<NaiveDate>,
}

impl TaskDecision {
    fn unchanged(task: &Task, latest_start: Option<NaiveDate>) -> Self {
        Self {
            id: task.id.clone(),
            before: task.dates(),
            after: task.dates(),
            latest_start,
        }
    }

    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Result of a full reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileOutcome {
    /// Tasks whose dates moved, in topological order (exclusion shifts last).
    pub changed: Vec<TaskId>,
    /// Topological order used for the pass (cyclic tasks excluded).
    pub order: Vec<TaskId>,
    pub anomalies: Vec<Anomaly>,
}

fn report_unknown_predecessors(ws: &WorkingSet, task: &Task, anomalies: &mut Vec<Anomaly>) {
    for dep in &task.dependencies {
        if dep.predecessor != task.id && !ws.contains(&dep.predecessor) {
            record(
                anomalies,
                Anomaly::UnknownPredecessor {
                    task: task.id.clone(),
                    predecessor: dep.predecessor.clone(),
                },
            );
        }
    }
}

/// Most restrictive start over all of `task`'s predecessors, including the
/// ones inherited from its ancestors.
pub(crate) fn latest_start(
    ws: &WorkingSet,
    graph: &DependencyGraph,
    task: &Task,
    anomalies: &mut Vec<Anomaly>,
) -> Option<NaiveDate> {
    let calendar = ws.calendar();
    let duration = task.duration(&calendar);
    report_unknown_predecessors(ws, task, anomalies);

    let mut latest: Option<NaiveDate> = None;
    let deps = task.dependencies.iter().chain(graph.inherited_dependencies_of(&task.id));
    for dep in deps {
        if dep.predecessor == task.id {
            continue;
        }
        let Some(pred_dates) = effective_dates(ws, graph, &dep.predecessor) else {
            continue;
        };

        let (start, _) = candidate_dates(dep.link, pred_dates, duration, &calendar);
        latest = Some(latest.map_or(start, |l| l.max(start)));
    }
    latest
}

/// Decide the dates of a single task against the current working set.
///
/// Returns `None` for unknown ids. Does not mutate anything; callers apply
/// `after` when [`TaskDecision::changed`] is true.
pub fn reconcile_task(
    ws: &WorkingSet,
    graph: &DependencyGraph,
    id: &str,
    anomalies: &mut Vec<Anomaly>,
) -> Option<TaskDecision> {
    let task = ws.get(id)?;

    if graph.is_summary(id) {
        // Its own predecessors are enforced on the children it rolls up.
        report_unknown_predecessors(ws, task, anomalies);
        let rolled = effective_dates(ws, graph, id)?;
        return Some(TaskDecision {
            id: task.id.clone(),
            before: task.dates(),
            after: rolled,
            latest_start: None,
        });
    }

    let calendar = ws.calendar();
    let duration = task.duration(&calendar);
    if duration < 0 {
        record(
            anomalies,
            Anomaly::InvalidDateRange {
                task: task.id.clone(),
                start: task.start_date,
                end: task.end_date,
            },
        );
        return Some(TaskDecision::unchanged(task, None));
    }

    let latest = latest_start(ws, graph, task, anomalies);
    let (mut start, mut end) = task.dates();

    if let Some(latest) = latest {
        let violated = start < latest;
        let pull_forward = task.constraint.is_asap() && start > latest;
        if violated || pull_forward {
            debug!(
                task = %task.id,
                from = %start,
                to = %latest,
                violated,
                "moving task to most restrictive predecessor start"
            );
            start = latest;
            end = calendar.add_days(latest, duration);
        }
    }

    (start, end) = apply_constraint(task, (start, end), duration, &calendar, anomalies);

    if end < start {
        record(
            anomalies,
            Anomaly::InvalidDateRange {
                task: task.id.clone(),
                start,
                end,
            },
        );
        return Some(TaskDecision::unchanged(task, latest));
    }

    Some(TaskDecision {
        id: task.id.clone(),
        before: task.dates(),
        after: (start, end),
        latest_start: latest,
    })
}

fn apply_constraint(
    task: &Task,
    (start, end): (NaiveDate, NaiveDate),
    duration: i64,
    calendar: &Calendar,
    anomalies: &mut Vec<Anomaly>,
) -> (NaiveDate, NaiveDate) {
    let Some(date) = task.constraint.date else {
        return (start, end);
    };
    let kind = task.constraint.kind;

    match kind {
        ConstraintType::AsSoonAsPossible => (start, end),
        ConstraintType::StartNoEarlierThan if date > start => {
            let start = calendar.next_valid_day(date);
            (start, calendar.add_days(start, duration))
        }
        ConstraintType::MustStartOn => {
            let start = calendar.next_valid_day(date);
            (start, calendar.add_days(start, duration))
        }
        // A finish that must land on a non-working day moves to the working
        // day before it; a lower bound on the finish moves to the one after.
        ConstraintType::MustFinishOn => {
            let end = calendar.prev_valid_day(date);
            (calendar.add_days(end, -duration), end)
        }
        ConstraintType::FinishNoEarlierThan if date > end => {
            let end = calendar.next_valid_day(date);
            (calendar.add_days(end, -duration), end)
        }
        ConstraintType::StartNoLaterThan if start > date => {
            record(
                anomalies,
                Anomaly::ConstraintViolationAdvisory {
                    task: task.id.clone(),
                    constraint: kind,
                    constraint_date: date,
                    actual: start,
                },
            );
            (start, end)
        }
        ConstraintType::FinishNoLaterThan if end > date => {
            record(
                anomalies,
                Anomaly::ConstraintViolationAdvisory {
                    task: task.id.clone(),
                    constraint: kind,
                    constraint_date: date,
                    actual: end,
                },
            );
            (start, end)
        }
        _ => (start, end),
    }
}

/// Full-snapshot reconciliation: every task in topological order, then the
/// exclusion pass.
///
/// Tasks on residual cycles keep their dates and are reported.
pub fn reconcile(ws: &mut WorkingSet, graph: &DependencyGraph) -> ReconcileOutcome {
    let schedule = graph.schedule_order();
    let mut anomalies = Vec::new();
    let mut changed = Vec::new();

    for id in &schedule.cyclic {
        record(&mut anomalies, Anomaly::ResidualCycle { task: id.clone() });
    }

    for id in &schedule.order {
        let Some(decision) = reconcile_task(ws, graph, id, &mut anomalies) else {
            continue;
        };
        if decision.changed() {
            let (start, end) = decision.after;
            ws.set_dates(id, start, end);
            changed.push(id.clone());
        }
    }

    for shift in resolve_exclusions(ws, graph, &mut anomalies) {
        if !changed.contains(&shift.task) {
            changed.push(shift.task);
        }
    }

    info!(
        tasks = ws.len(),
        changed = changed.len(),
        anomalies = anomalies.len(),
        "reconciliation pass complete"
    );

    ReconcileOutcome {
        changed,
        order: schedule.order,
        anomalies,
    }
}
