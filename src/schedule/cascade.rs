// src/schedule/cascade.rs

//! Cascade Propagator: push one task's date change through its successors.
//!
//! Starting from a seed task:
//! - breadth-first discovery of every task downstream of the seed,
//! - each of those re-decided by the reconciler (all of its predecessors, not
//!   just the one that triggered the cascade) in topological order, so a task
//!   is visited once and only after every affected predecessor,
//! - if a moved task (or the seed) has a parent, the parent is rolled up and,
//!   when its dates change, becomes a new seed so that dependents of the
//!   parent see the new range,
//! - exclusion peers of moved tasks are resolved and, when shifted, become
//!   new seeds too.
//!
//! The total number of task decisions is bounded by `max_steps`.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info};

use crate::dag::DependencyGraph;
use crate::model::{TaskId, WorkingSet};
use crate::schedule::anomaly::{record, Anomaly};
use crate::schedule::exclusion::resolve_pair;
use crate::schedule::reconcile::reconcile_task;

/// Result of one cascade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeOutcome {
    /// Tasks whose dates moved, in the order they were first written.
    pub changed: Vec<TaskId>,
    pub anomalies: Vec<Anomaly>,
    /// Number of task decisions made.
    pub steps: usize,
    /// Whether the step bound cut the cascade short.
    pub truncated: bool,
}

impl CascadeOutcome {
    fn mark_changed(&mut self, id: &str) {
        if !self.changed.iter().any(|c| c == id) {
            self.changed.push(id.to_string());
        }
    }
}

/// Propagate the current dates of `origin` through the working set.
///
/// `origin` itself is not re-decided; callers reconcile it first when that is
/// wanted.
pub fn cascade_from(
    ws: &mut WorkingSet,
    graph: &DependencyGraph,
    origin: &str,
    max_steps: usize,
) -> CascadeOutcome {
    let mut outcome = CascadeOutcome::default();
    if !ws.contains(origin) {
        return outcome;
    }

    let schedule = graph.schedule_order();
    for id in graph.downstream_of(origin) {
        if schedule.cyclic.contains(&id) {
            record(&mut outcome.anomalies, Anomaly::ResidualCycle { task: id });
        }
    }

    let mut seeds: VecDeque<TaskId> = VecDeque::from([origin.to_string()]);
    let mut queued: HashSet<TaskId> = HashSet::from([origin.to_string()]);

    while let Some(seed) = seeds.pop_front() {
        queued.remove(&seed);
        debug!(seed = %seed, "cascading from task");

        let downstream: HashSet<TaskId> = graph.downstream_of(&seed).into_iter().collect();
        let mut moved: Vec<TaskId> = vec![seed.clone()];

        for id in schedule.order.iter().filter(|id| downstream.contains(*id)) {
            if outcome.steps >= max_steps {
                return truncate(outcome, origin, max_steps);
            }
            outcome.steps += 1;

            let Some(decision) = reconcile_task(ws, graph, id, &mut outcome.anomalies) else {
                continue;
            };
            if decision.changed() {
                let (start, end) = decision.after;
                ws.set_dates(id, start, end);
                outcome.mark_changed(id);
                moved.push(id.clone());
            }
        }

        let mut new_seeds: Vec<TaskId> = Vec::new();

        // Roll up parents of everything that moved in this wave.
        for id in &moved {
            let Some(parent) = graph.parent_of(id) else {
                continue;
            };
            if outcome.steps >= max_steps {
                return truncate(outcome, origin, max_steps);
            }
            outcome.steps += 1;

            let Some(decision) = reconcile_task(ws, graph, parent, &mut outcome.anomalies) else {
                continue;
            };
            if decision.changed() {
                let (start, end) = decision.after;
                ws.set_dates(parent, start, end);
                outcome.mark_changed(parent);
                new_seeds.push(parent.clone());
            }
        }

        // Exclusion peers of everything that moved.
        for id in &moved {
            let peers: Vec<TaskId> = ws
                .get(id)
                .map(|t| t.exclusion_links.iter().cloned().collect())
                .unwrap_or_default();
            for peer in peers {
                if !ws.contains(&peer) {
                    record(
                        &mut outcome.anomalies,
                        Anomaly::UnknownExclusionPeer {
                            task: id.clone(),
                            peer,
                        },
                    );
                    continue;
                }
                if outcome.steps >= max_steps {
                    return truncate(outcome, origin, max_steps);
                }
                outcome.steps += 1;

                if let Some(shift) = resolve_pair(ws, graph, id, &peer, &mut outcome.anomalies) {
                    outcome.mark_changed(&shift.task);
                    new_seeds.push(shift.task);
                }
            }
        }

        for next in new_seeds {
            if queued.insert(next.clone()) {
                seeds.push_back(next);
            }
        }
    }

    info!(
        origin = %origin,
        changed = outcome.changed.len(),
        steps = outcome.steps,
        "cascade complete"
    );
    outcome
}

fn truncate(mut outcome: CascadeOutcome, origin: &str, limit: usize) -> CascadeOutcome {
    outcome.truncated = true;
    record(
        &mut outcome.anomalies,
        Anomaly::CascadeLimitReached {
            origin: origin.to_string(),
            limit,
        },
    );
    outcome
}
