// src/analysis/critical_path.rs

//! Critical Path Analyzer.
//!
//! Only leaf tasks take part; summary tasks and edges to them are ignored.
//! Every link is treated as finish-to-start for float purposes.
//!
//! Forward:  `ES = max(stored start, max(EF(pred) + 1))`, `EF = ES + duration`.
//! Backward: `LF = project end` without successors, else
//!           `min(LS(succ) - 1)`; `LS = LF - duration`.
//! Float:    `LS - ES`, floored at zero. Critical iff float is zero.
//!
//! Both passes are memoised per task id, so diamonds are evaluated once.
//! A task met again while it is still being evaluated (a residual cycle)
//! contributes nothing to the other task's bound.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::calendar::Calendar;
use crate::dag::DependencyGraph;
use crate::model::{TaskId, WorkingSet};

/// Early/late dates for one leaf task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskTiming {
    pub earliest_start: NaiveDate,
    pub earliest_finish: NaiveDate,
    pub latest_start: NaiveDate,
    pub latest_finish: NaiveDate,
    pub total_float: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CriticalPathReport {
    /// Zero-float leaf tasks, in snapshot order.
    pub critical_ids: Vec<TaskId>,
    pub float_by_task: BTreeMap<TaskId, i64>,
    pub timings: BTreeMap<TaskId, TaskTiming>,
    /// Latest earliest-finish over all leaf tasks.
    pub project_end: Option<NaiveDate>,
}

impl CriticalPathReport {
    pub fn is_critical(&self, id: &str) -> bool {
        self.float_by_task.get(id) == Some(&0)
    }

    pub fn float_of(&self, id: &str) -> Option<i64> {
        self.float_by_task.get(id).copied()
    }
}

struct Pass<'a> {
    ws: &'a WorkingSet,
    graph: &'a DependencyGraph,
    calendar: Calendar,
    leaves: HashSet<&'a str>,
    early: HashMap<&'a str, (NaiveDate, NaiveDate)>,
    late: HashMap<&'a str, (NaiveDate, NaiveDate)>,
    in_progress: HashSet<&'a str>,
}

impl<'a> Pass<'a> {
    fn duration(&self, id: &str) -> i64 {
        self.ws
            .get(id)
            .map(|t| t.duration(&self.calendar).max(0))
            .unwrap_or(0)
    }

    fn leaf_predecessors(&self, id: &'a str) -> Vec<&'a str> {
        let graph: &'a DependencyGraph = self.graph;
        graph
            .all_dependencies_of(id)
            .map(|d| d.predecessor.as_str())
            .filter(|p| *p != id && self.leaves.contains(p))
            .collect()
    }

    fn leaf_successors(&self, id: &'a str) -> Vec<&'a str> {
        let graph: &'a DependencyGraph = self.graph;
        graph
            .dependents_of(id)
            .iter()
            .map(|s| s.as_str())
            .filter(|s| *s != id && self.leaves.contains(s))
            .collect()
    }

    /// (earliest start, earliest finish)
    fn forward(&mut self, id: &'a str) -> Option<(NaiveDate, NaiveDate)> {
        if let Some(found) = self.early.get(id) {
            return Some(*found);
        }
        if !self.in_progress.insert(id) {
            warn!(task = %id, "cycle met during forward pass; ignoring edge");
            return None;
        }

        let Some(task) = self.ws.get(id) else {
            self.in_progress.remove(id);
            return None;
        };
        let mut start = task.start_date;
        for pred in self.leaf_predecessors(id) {
            if let Some((_, pred_finish)) = self.forward(pred) {
                start = start.max(self.calendar.add_days(pred_finish, 1));
            }
        }
        let finish = self.calendar.add_days(start, self.duration(id));

        self.in_progress.remove(id);
        self.early.insert(id, (start, finish));
        Some((start, finish))
    }

    /// (latest start, latest finish)
    fn backward(&mut self, id: &'a str, project_end: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        if let Some(found) = self.late.get(id) {
            return Some(*found);
        }
        if !self.in_progress.insert(id) {
            warn!(task = %id, "cycle met during backward pass; ignoring edge");
            return None;
        }

        let mut finish: Option<NaiveDate> = None;
        for succ in self.leaf_successors(id) {
            if let Some((succ_start, _)) = self.backward(succ, project_end) {
                let bound = self.calendar.add_days(succ_start, -1);
                finish = Some(finish.map_or(bound, |f| f.min(bound)));
            }
        }
        let finish = finish.unwrap_or(project_end);
        let start = self.calendar.add_days(finish, -self.duration(id));

        self.in_progress.remove(id);
        self.late.insert(id, (start, finish));
        Some((start, finish))
    }
}

/// Run both passes over the leaf tasks of `ws`.
pub fn compute_critical_path(ws: &WorkingSet, graph: &DependencyGraph) -> CriticalPathReport {
    let leaves: HashSet<&str> = ws
        .iter()
        .map(|t| t.id.as_str())
        .filter(|id| !graph.is_summary(id))
        .collect();

    let mut pass = Pass {
        ws,
        graph,
        calendar: ws.calendar(),
        leaves,
        early: HashMap::new(),
        late: HashMap::new(),
        in_progress: HashSet::new(),
    };

    let leaf_ids: Vec<&str> = ws
        .iter()
        .map(|t| t.id.as_str())
        .filter(|id| pass.leaves.contains(id))
        .collect();

    for &id in &leaf_ids {
        pass.forward(id);
    }
    let Some(project_end) = pass.early.values().map(|(_, f)| *f).max() else {
        return CriticalPathReport::default();
    };

    for &id in &leaf_ids {
        pass.backward(id, project_end);
    }

    let mut report = CriticalPathReport {
        project_end: Some(project_end),
        ..CriticalPathReport::default()
    };

    for id in leaf_ids {
        let (Some(&(es, ef)), Some(&(ls, lf))) = (pass.early.get(id), pass.late.get(id)) else {
            continue;
        };
        let total_float = pass.calendar.diff_days(es, ls).max(0);
        report.float_by_task.insert(id.to_string(), total_float);
        report.timings.insert(
            id.to_string(),
            TaskTiming {
                earliest_start: es,
                earliest_finish: ef,
                latest_start: ls,
                latest_finish: lf,
                total_float,
            },
        );
        if total_float == 0 {
            report.critical_ids.push(id.to_string());
        }
    }

    debug!(
        critical = report.critical_ids.len(),
        project_end = %project_end,
        "critical path computed"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, Task};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn task(id: &str, start: u32, end: u32, deps: &[&str]) -> Task {
        let mut t = Task::new(id, d(start), d(end));
        t.dependencies = deps.iter().map(|p| Dependency::finish_start(*p)).collect();
        t
    }

    fn report(tasks: Vec<Task>) -> CriticalPathReport {
        let ws = WorkingSet::new(tasks, Calendar::calendar_days());
        let graph = DependencyGraph::from_working_set(&ws);
        compute_critical_path(&ws, &graph)
    }

    #[test]
    fn diamond_with_a_short_branch() {
        // A(1-2) -> B(3-9) -> D(10-11)
        // A(1-2) -> C(3-4) -> D
        let r = report(vec![
            task("A", 1, 2, &[]),
            task("B", 3, 9, &["A"]),
            task("C", 3, 4, &["A"]),
            task("D", 10, 11, &["B", "C"]),
        ]);
        assert_eq!(r.project_end, Some(d(11)));
        assert_eq!(r.critical_ids, vec!["A", "B", "D"]);
        assert_eq!(r.float_of("C"), Some(5));
        assert!(!r.is_critical("C"));
        assert_eq!(r.timings["C"].latest_start, d(8));
    }

    #[test]
    fn parallel_chains_float_against_project_end() {
        let r = report(vec![task("A", 1, 10, &[]), task("B", 1, 3, &[])]);
        assert_eq!(r.float_of("A"), Some(0));
        assert_eq!(r.float_of("B"), Some(7));
    }

    #[test]
    fn summary_tasks_are_excluded() {
        let mut child = task("C", 1, 4, &[]);
        child.parent_task_id = Some("P".into());
        let r = report(vec![task("P", 1, 30, &[]), child]);
        assert!(r.float_of("P").is_none());
        assert_eq!(r.project_end, Some(d(4)));
    }

    #[test]
    fn residual_cycle_does_not_recurse_forever() {
        let r = report(vec![task("A", 1, 2, &["B"]), task("B", 1, 2, &["A"])]);
        assert!(r.float_by_task.values().all(|f| *f >= 0));
    }

    #[test]
    fn empty_snapshot() {
        let r = report(Vec::new());
        assert!(r.critical_ids.is_empty());
        assert_eq!(r.project_end, None);
    }
}
