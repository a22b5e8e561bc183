// src/analysis/leveling.rs

//! Resource Leveler.
//!
//! Greedy and per owner. For each owner a per-day load map is built by
//! spreading each task's effort evenly over the valid days of its span.
//! Then, repeatedly, the earliest over-allocated day is taken and, among the
//! tasks covering it that are off the critical path, have positive float and
//! have not been moved yet, the one with the largest float is shifted forward
//! by `max(1, ceil(excess / hours_per_day))` days, capped at its float. When
//! no candidate is left for a day, the search moves past it.
//!
//! The result is a list of proposals; nothing is applied.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::analysis::critical_path::CriticalPathReport;
use crate::calendar::Calendar;
use crate::dag::DependencyGraph;
use crate::model::{Task, TaskId, WorkingSet};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelingOptions {
    /// Hours one owner can work on a single day.
    pub daily_capacity_hours: f64,
    /// Hours that make up one day of shift, and the default daily effort of a
    /// task without `effort_hours`.
    pub hours_per_day: f64,
}

impl Default for LevelingOptions {
    fn default() -> Self {
        Self {
            daily_capacity_hours: 8.0,
            hours_per_day: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelingProposal {
    pub task: TaskId,
    pub owner: String,
    pub old_dates: (NaiveDate, NaiveDate),
    pub new_dates: (NaiveDate, NaiveDate),
    pub shift_days: i64,
    /// Float of the task when the proposal was made.
    pub float_days: i64,
    /// The over-allocated day that triggered the shift.
    pub overloaded_day: NaiveDate,
}

/// Per-task effort spread over the valid days of a span.
fn daily_hours(task: &Task, span: (NaiveDate, NaiveDate), calendar: &Calendar, options: &LevelingOptions) -> f64 {
    let days = calendar.valid_days(span.0, span.1).count();
    if days == 0 {
        return 0.0;
    }
    let effort = task
        .effort_hours
        .unwrap_or(options.hours_per_day * days as f64);
    effort / days as f64
}

fn spread(
    load: &mut BTreeMap<NaiveDate, f64>,
    span: (NaiveDate, NaiveDate),
    hours: f64,
    calendar: &Calendar,
) {
    for day in calendar.valid_days(span.0, span.1) {
        *load.entry(day).or_insert(0.0) += hours;
    }
}

/// Propose forward shifts that relieve per-owner over-allocation.
pub fn compute_leveling_proposals(
    ws: &WorkingSet,
    graph: &DependencyGraph,
    critical: &CriticalPathReport,
    options: &LevelingOptions,
) -> Vec<LevelingProposal> {
    let calendar = ws.calendar();

    let mut by_owner: BTreeMap<&str, Vec<&Task>> = BTreeMap::new();
    for task in ws.iter() {
        if graph.is_summary(&task.id) {
            continue;
        }
        if let Some(owner) = task.owner.as_deref() {
            by_owner.entry(owner).or_default().push(task);
        }
    }

    let mut proposals = Vec::new();
    for (owner, tasks) in by_owner {
        proposals.extend(level_owner(owner, &tasks, critical, options, &calendar));
    }
    proposals
}

fn level_owner(
    owner: &str,
    tasks: &[&Task],
    critical: &CriticalPathReport,
    options: &LevelingOptions,
    calendar: &Calendar,
) -> Vec<LevelingProposal> {
    let mut spans: HashMap<&str, (NaiveDate, NaiveDate)> = HashMap::new();
    let mut rates: HashMap<&str, f64> = HashMap::new();
    let mut load: BTreeMap<NaiveDate, f64> = BTreeMap::new();

    for task in tasks {
        if task.end_date < task.start_date {
            continue;
        }
        let span = task.dates();
        let rate = daily_hours(task, span, calendar, options);
        spread(&mut load, span, rate, calendar);
        spans.insert(task.id.as_str(), span);
        rates.insert(task.id.as_str(), rate);
    }

    let mut shifted: HashSet<&str> = HashSet::new();
    let mut proposals = Vec::new();
    let mut cursor: Option<NaiveDate> = None;

    loop {
        let over = load
            .iter()
            .filter(|(day, _)| cursor.is_none_or(|c| **day >= c))
            .find(|(_, hours)| **hours > options.daily_capacity_hours + EPSILON)
            .map(|(day, hours)| (*day, *hours));
        let Some((day, hours)) = over else {
            break;
        };
        let excess = hours - options.daily_capacity_hours;

        let mut pick: Option<(&Task, i64)> = None;
        for task in tasks {
            let id = task.id.as_str();
            let Some(&(start, end)) = spans.get(id) else {
                continue;
            };
            if shifted.contains(id) || critical.is_critical(id) || start > day || end < day {
                continue;
            }
            let float = critical.float_of(id).unwrap_or(0);
            if float <= 0 {
                continue;
            }
            if pick.is_none_or(|(_, best)| float > best) {
                pick = Some((*task, float));
            }
        }

        let Some((task, float)) = pick else {
            cursor = day.succ_opt();
            if cursor.is_none() {
                break;
            }
            continue;
        };

        let id = task.id.as_str();
        let wanted = ((excess / options.hours_per_day).ceil() as i64).max(1);
        let shift = wanted.min(float);
        let old = spans[id];
        let new = (
            calendar.add_days(old.0, shift),
            calendar.add_days(old.1, shift),
        );
        let rate = rates[id];

        spread(&mut load, old, -rate, calendar);
        spread(&mut load, new, rate, calendar);
        spans.insert(id, new);
        shifted.insert(id);

        debug!(
            owner,
            task = %id,
            day = %day,
            excess,
            shift,
            "proposing leveling shift"
        );
        proposals.push(LevelingProposal {
            task: task.id.clone(),
            owner: owner.to_string(),
            old_dates: old,
            new_dates: new,
            shift_days: shift,
            float_days: float,
            overloaded_day: day,
        });
    }

    proposals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::critical_path::compute_critical_path;
    use crate::model::Dependency;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn owned(id: &str, start: u32, end: u32, owner: &str) -> Task {
        let mut t = Task::new(id, d(start), d(end));
        t.owner = Some(owner.to_string());
        t
    }

    fn level(tasks: Vec<Task>) -> (CriticalPathReport, Vec<LevelingProposal>) {
        let ws = WorkingSet::new(tasks, Calendar::calendar_days());
        let graph = DependencyGraph::from_working_set(&ws);
        let cp = compute_critical_path(&ws, &graph);
        let proposals = compute_leveling_proposals(&ws, &graph, &cp, &LevelingOptions::default());
        (cp, proposals)
    }

    #[test]
    fn non_critical_overlap_is_shifted_within_float() {
        // Long critical task L and short task S owned by the same person.
        let (cp, proposals) = level(vec![
            owned("L", 1, 10, "ann"),
            owned("S", 1, 2, "ann"),
        ]);
        assert_eq!(cp.float_of("S"), Some(8));
        assert_eq!(proposals.len(), 1);
        let p = &proposals[0];
        assert_eq!(p.task, "S");
        assert_eq!(p.overloaded_day, d(1));
        assert_eq!(p.shift_days, 1);
        assert_eq!(p.new_dates, (d(2), d(3)));
    }

    #[test]
    fn critical_tasks_are_never_moved() {
        let (_, proposals) = level(vec![owned("A", 1, 5, "bob"), owned("B", 1, 5, "bob")]);
        assert!(proposals.is_empty());
    }

    #[test]
    fn largest_float_is_picked_and_bounded() {
        let mut a = owned("A", 1, 1, "cy");
        a.effort_hours = Some(8.0);
        let mut b = owned("B", 1, 1, "cy");
        b.effort_hours = Some(8.0);
        // C pins the project end to the 4th; B is chained before a critical
        // task so its float is smaller than A's.
        let c = owned("C", 1, 4, "other");
        let mut e = Task::new("E", d(3), d(4));
        e.dependencies = vec![Dependency::finish_start("B")];
        let (cp, proposals) = level(vec![a, b, c, e]);

        assert_eq!(cp.float_of("A"), Some(3));
        assert_eq!(cp.float_of("B"), Some(1));
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].task, "A");
        assert!(proposals.iter().all(|p| p.shift_days <= p.float_days));
    }

    #[test]
    fn owners_are_levelled_independently() {
        let (_, proposals) = level(vec![
            owned("L", 1, 10, "ann"),
            owned("S", 1, 2, "bob"),
        ]);
        assert!(proposals.is_empty());
    }
}
