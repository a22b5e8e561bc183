// src/schedule/exclusion.rs

//! Exclusion Resolver: mutually exclusive tasks must not overlap.
//!
//! Overlap uses effective (buffer-extended) end dates:
//! `start_a <= eff_end_b && eff_end_a >= start_b`. On overlap, the task that
//! starts later (the second of the pair on a tie) moves to the valid day after
//! the other's effective end, keeping its duration.
//!
//! A sweep visits each unordered pair once. Shifts only ever move tasks
//! later, but a shift can reopen a pair visited earlier in the same sweep
//! (A/B pushes B into C), so sweeps repeat until nothing moves, bounded by
//! the number of pairs.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::calendar::Calendar;
use crate::dag::DependencyGraph;
use crate::model::{Task, TaskId, WorkingSet};
use crate::schedule::anomaly::{record, Anomaly};

/// One move made by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExclusionShift {
    pub task: TaskId,
    /// The task it was moved clear of.
    pub cleared: TaskId,
    pub from: (NaiveDate, NaiveDate),
    pub to: (NaiveDate, NaiveDate),
}

/// Whether two tasks overlap once their end buffers are taken into account.
pub fn overlaps(a: &Task, b: &Task, calendar: &Calendar) -> bool {
    a.start_date <= b.effective_end(calendar) && a.effective_end(calendar) >= b.start_date
}

/// All unordered exclusion pairs, in first-seen order.
pub fn exclusion_pairs(ws: &WorkingSet, anomalies: &mut Vec<Anomaly>) -> Vec<(TaskId, TaskId)> {
    let mut seen: HashSet<(TaskId, TaskId)> = HashSet::new();
    let mut pairs = Vec::new();

    for task in ws.iter() {
        for peer in &task.exclusion_links {
            if *peer == task.id {
                continue;
            }
            if !ws.contains(peer) {
                record(
                    anomalies,
                    Anomaly::UnknownExclusionPeer {
                        task: task.id.clone(),
                        peer: peer.clone(),
                    },
                );
                continue;
            }
            let key = if task.id < *peer {
                (task.id.clone(), peer.clone())
            } else {
                (peer.clone(), task.id.clone())
            };
            if seen.insert(key) {
                pairs.push((task.id.clone(), peer.clone()));
            }
        }
    }
    pairs
}

/// Resolve one pair. Returns the shift made, if any.
pub fn resolve_pair(
    ws: &mut WorkingSet,
    graph: &DependencyGraph,
    a: &str,
    b: &str,
    anomalies: &mut Vec<Anomaly>,
) -> Option<ExclusionShift> {
    if graph.is_summary(a) || graph.is_summary(b) {
        debug!(a, b, "exclusion between summary tasks ignored");
        return None;
    }

    let calendar = ws.calendar();
    let (ta, tb) = (ws.get(a)?, ws.get(b)?);
    if !overlaps(ta, tb, &calendar) {
        return None;
    }

    let (earlier, later) = if ta.start_date <= tb.start_date {
        (ta, tb)
    } else {
        (tb, ta)
    };

    let duration = later.duration(&calendar);
    if duration < 0 {
        record(
            anomalies,
            Anomaly::InvalidDateRange {
                task: later.id.clone(),
                start: later.start_date,
                end: later.end_date,
            },
        );
        return None;
    }

    let start = calendar.add_days(earlier.effective_end(&calendar), 1);
    let end = calendar.add_days(start, duration);
    let shift = ExclusionShift {
        task: later.id.clone(),
        cleared: earlier.id.clone(),
        from: later.dates(),
        to: (start, end),
    };

    debug!(
        task = %shift.task,
        cleared = %shift.cleared,
        to = %start,
        "shifting task clear of exclusive peer"
    );
    ws.set_dates(&shift.task, start, end);
    Some(shift)
}

/// Run the exclusion pass over the whole working set.
///
/// Pairs are swept again until a sweep moves nothing, so a shift that lands
/// on a later peer in a chain (A-B, B-C) is itself resolved and no pair is
/// left overlapping.
pub fn resolve_exclusions(
    ws: &mut WorkingSet,
    graph: &DependencyGraph,
    anomalies: &mut Vec<Anomaly>,
) -> Vec<ExclusionShift> {
    let pairs = exclusion_pairs(ws, anomalies);
    let mut shifts = Vec::new();

    for sweep in 0..=pairs.len() {
        let mut moved = false;
        for (a, b) in &pairs {
            if let Some(shift) = resolve_pair(ws, graph, a, b, anomalies) {
                shifts.push(shift);
                moved = true;
            }
        }
        if !moved {
            return shifts;
        }
        debug!(sweep, "exclusion sweep moved tasks; sweeping again");
    }

    warn!(pairs = pairs.len(), "exclusion pass did not settle");
    shifts
}
