// src/dag/cycle.rs

//! Edit-time cycle checks.
//!
//! Both checks look at the working set as it would be *after* the edit.
//! Nothing is written when a check fails.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::dag::graph::DependencyGraph;
use crate::model::{Task, TaskId, WorkingSet};

/// Check whether replacing (or adding) `candidate` in `ws` closes a cycle.
///
/// Cycles are looked for in the graph runs are ordered by: predecessor edges,
/// including those a task inherits from its ancestors, plus the roll-up edge
/// from a child to its parent. Cycles already present in `ws` are left to the
/// reconciler.
///
/// A new cycle is returned as an ordered id chain that starts and ends with
/// the same task and follows predecessor and roll-up edges backwards: for
/// `B after A`, `C after B` and a proposed `A after C`, the chain is
/// `[A, C, B, A]`. The chain starts at `candidate` whenever it is on the
/// cycle.
pub fn find_cycle_with(ws: &WorkingSet, candidate: &Task) -> Option<Vec<TaskId>> {
    let id = candidate.id.as_str();
    if candidate.depends_on(id) || candidate.parent_task_id.as_deref() == Some(id) {
        return Some(vec![id.to_string(), id.to_string()]);
    }

    let existing = DependencyGraph::from_working_set(ws).schedule_order().cyclic;

    let mut proposed = ws.clone();
    match proposed.get_mut(id) {
        Some(slot) => *slot = candidate.clone(),
        None => {
            proposed.insert(candidate.clone());
        }
    }
    let graph = DependencyGraph::from_working_set(&proposed);
    let cyclic = graph.schedule_order().cyclic;

    let fresh: HashSet<&str> = cyclic
        .iter()
        .map(String::as_str)
        .filter(|t| !existing.contains(*t))
        .collect();
    let start = if fresh.contains(id) {
        id
    } else {
        cyclic.iter().map(String::as_str).find(|t| fresh.contains(t))?
    };
    trace_cycle(&graph, start, &cyclic)
}

/// Shortest way back to `start` through its cycle, walking predecessors.
fn trace_cycle(graph: &DependencyGraph, start: &str, cyclic: &BTreeSet<TaskId>) -> Option<Vec<TaskId>> {
    // Maps each visited task to the task it was reached from (None = seed).
    let mut came_from: HashMap<&str, Option<&str>> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    for pred in graph.schedule_predecessors(start) {
        if pred == start {
            return Some(vec![start.to_string(), start.to_string()]);
        }
        if cyclic.contains(pred) && !came_from.contains_key(pred) {
            came_from.insert(pred, None);
            queue.push_back(pred);
        }
    }

    while let Some(current) = queue.pop_front() {
        for pred in graph.schedule_predecessors(current) {
            if pred == start {
                return Some(build_chain(start, current, &came_from));
            }
            if cyclic.contains(pred) && !came_from.contains_key(pred) {
                came_from.insert(pred, Some(current));
                queue.push_back(pred);
            }
        }
    }

    None
}

fn build_chain<'a>(start: &str, last: &'a str, came_from: &HashMap<&'a str, Option<&'a str>>) -> Vec<TaskId> {
    let mut path = vec![last.to_string()];
    let mut cursor = last;
    while let Some(Some(prev)) = came_from.get(cursor) {
        path.push(prev.to_string());
        cursor = *prev;
    }
    path.reverse();

    let mut chain = Vec::with_capacity(path.len() + 2);
    chain.push(start.to_string());
    chain.extend(path);
    chain.push(start.to_string());
    chain
}

pub fn would_create_hierarchy_cycle(graph: &DependencyGraph, task: &str, new_parent: &str) -> bool {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut cursor = Some(new_parent);

    while let Some(current) = cursor {
        if current == task {
            return true;
        }
        if !seen.insert(current) {
            // Pre-existing hierarchy loop that does not involve `task`.
            return false;
        }
        cursor = graph.parent_of(current).map(|p| p.as_str());
    }
    false
}
