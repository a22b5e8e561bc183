#![allow(dead_code)]

pub use taskcascade_test_utils::builders::{d, dates_of, ids, is_weekend, monday_of};
pub use taskcascade_test_utils::{init_tracing, with_timeout, SnapshotBuilder, TaskBuilder};

use taskcascade::dag::DependencyGraph;
use taskcascade::model::{ProjectSnapshot, WorkingSet};

/// Working set and graph for a snapshot, as every pass expects them.
pub fn prepare(snapshot: &ProjectSnapshot) -> (WorkingSet, DependencyGraph) {
    let ws = WorkingSet::from_snapshot(snapshot);
    let graph = DependencyGraph::from_working_set(&ws);
    (ws, graph)
}
