// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, warn};

use crate::model::{Dependency, TaskId, WorkingSet};

/// Internal node structure: immediate predecessors, successors and hierarchy.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Typed predecessor edges, in the task's own order.
    deps: Vec<Dependency>,
    /// Predecessor edges of every ancestor, nearest ancestor first.
    inherited: Vec<Dependency>,
    /// Tasks that list this one as a predecessor.
    dependents: Vec<TaskId>,
    children: Vec<TaskId>,
    parent: Option<TaskId>,
}

/// In-memory adjacency keyed by task id.
///
/// Built from a working set at the start of each run and never mutated
/// afterwards; edits rebuild it. Edges that point at unknown tasks are kept
/// in `dependencies_of` (so the reconciler can report them) but never show up
/// as successors.
///
/// A summary task's predecessors bound everything beneath it: each
/// descendant inherits them (`inherited_dependencies_of`) and is listed among
/// the predecessor's dependents.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: HashMap<TaskId, DagNode>,
    /// Snapshot order, for deterministic iteration.
    order: Vec<TaskId>,
}

/// Order in which a run visits tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOrder {
    /// Acyclic tasks, every predecessor (and every child of a summary task)
    /// before the task itself.
    pub order: Vec<TaskId>,
    /// Tasks caught in a dependency or roll-up cycle; left untouched.
    pub cyclic: BTreeSet<TaskId>,
}

impl DependencyGraph {
    pub fn from_working_set(ws: &WorkingSet) -> Self {
        let mut nodes: HashMap<TaskId, DagNode> = HashMap::with_capacity(ws.len());
        let mut order = Vec::with_capacity(ws.len());

        // First pass: create nodes with their dependency lists.
        for task in ws.iter() {
            order.push(task.id.clone());
            nodes.insert(
                task.id.clone(),
                DagNode {
                    deps: task.dependencies.clone(),
                    parent: task.parent_task_id.clone(),
                    ..DagNode::default()
                },
            );
        }

        // Second pass: reverse edges and children.
        for task in ws.iter() {
            for dep in &task.dependencies {
                if let Some(pred) = nodes.get_mut(&dep.predecessor) {
                    if !pred.dependents.contains(&task.id) {
                        pred.dependents.push(task.id.clone());
                    }
                }
            }
            if let Some(parent_id) = &task.parent_task_id {
                match nodes.get_mut(parent_id) {
                    Some(parent) => parent.children.push(task.id.clone()),
                    None => warn!(task = %task.id, parent = %parent_id, "parent task not in snapshot"),
                }
            }
        }

        // Third pass: predecessors inherited from ancestors.
        for task in ws.iter() {
            let mut inherited: Vec<Dependency> = Vec::new();
            let mut seen: HashSet<&str> = HashSet::from([task.id.as_str()]);
            let mut cursor = task.parent_task_id.as_deref();
            while let Some(ancestor) = cursor.filter(|a| seen.insert(*a)) {
                let Some(node) = nodes.get(ancestor) else {
                    break;
                };
                inherited.extend(node.deps.iter().filter(|d| d.predecessor != task.id).cloned());
                cursor = node.parent.as_deref();
            }
            if inherited.is_empty() {
                continue;
            }
            for dep in &inherited {
                if let Some(pred) = nodes.get_mut(&dep.predecessor) {
                    if !pred.dependents.contains(&task.id) {
                        pred.dependents.push(task.id.clone());
                    }
                }
            }
            if let Some(node) = nodes.get_mut(&task.id) {
                node.inherited = inherited;
            }
        }

        Self { nodes, order }
    }

    /// All task ids in snapshot order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Immediate predecessor edges of a task.
    pub fn dependencies_of(&self, id: &str) -> &[Dependency] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Predecessor edges a task inherits from its ancestors.
    pub fn inherited_dependencies_of(&self, id: &str) -> &[Dependency] {
        self.nodes
            .get(id)
            .map(|n| n.inherited.as_slice())
            .unwrap_or(&[])
    }

    /// Own and inherited predecessor edges.
    pub fn all_dependencies_of(&self, id: &str) -> impl Iterator<Item = &Dependency> {
        self.dependencies_of(id)
            .iter()
            .chain(self.inherited_dependencies_of(id))
    }

    /// Tasks that must be settled before `id` in a run: known predecessors
    /// (own and inherited) and, for a summary, its children.
    pub fn schedule_predecessors(&self, id: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let preds = self
            .all_dependencies_of(id)
            .map(|d| d.predecessor.as_str())
            .filter(|p| self.contains(p));
        let children = self.children_of(id).iter().map(|c| c.as_str());
        for pred in preds.chain(children) {
            if !out.contains(&pred) {
                out.push(pred);
            }
        }
        out
    }

    /// Immediate successors of a task (tasks that list it as a predecessor,
    /// directly or through an ancestor).
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn children_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, id: &str) -> Option<&TaskId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    /// A summary task has at least one child.
    pub fn is_summary(&self, id: &str) -> bool {
        !self.children_of(id).is_empty()
    }

    /// All descendants of `id` (children, grandchildren, ...), breadth first.
    pub fn descendants_of(&self, id: &str) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = self.children_of(id).iter().map(|s| s.as_str()).collect();

        while let Some(child) = queue.pop_front() {
            if child == id || !seen.insert(child) {
                continue;
            }
            out.push(child.to_string());
            queue.extend(self.children_of(child).iter().map(|s| s.as_str()));
        }
        out
    }

    /// Every task reachable from `id` through successor edges (excluding `id`).
    pub fn downstream_of(&self, id: &str) -> Vec<TaskId> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(id);
        let mut queue: VecDeque<&str> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            for next in self.dependents_of(current) {
                if seen.insert(next.as_str()) {
                    out.push(next.clone());
                    queue.push_back(next.as_str());
                }
            }
        }
        out
    }

    /// Compute the reconciliation / write order.
    ///
    /// Edge direction: predecessor -> successor (inherited edges included),
    /// plus child -> parent so that a summary task is rolled up after all of
    /// its children. Strongly
    /// connected components (and self loops) are reported as cyclic and
    /// excluded from the order.
    pub fn schedule_order(&self) -> ScheduleOrder {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for id in &self.order {
            graph.add_node(id.as_str());
        }
        for id in &self.order {
            for pred in self.schedule_predecessors(id) {
                graph.add_edge(pred, id.as_str(), ());
            }
        }

        let mut looped_nodes: Vec<&str> = Vec::new();
        for component in tarjan_scc(&graph) {
            let looped = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&n| graph.contains_edge(n, n));
            if looped {
                looped_nodes.extend(component);
            }
        }
        for &node in &looped_nodes {
            graph.remove_node(node);
        }
        let cyclic: BTreeSet<TaskId> = looped_nodes.iter().map(|s| s.to_string()).collect();

        let order = match toposort(&graph, None) {
            Ok(sorted) => sorted.into_iter().map(|s| s.to_string()).collect(),
            Err(cycle) => {
                // Unreachable once SCCs are removed; fall back to snapshot order.
                warn!(task = %cycle.node_id(), "toposort failed after cycle removal");
                self.order
                    .iter()
                    .filter(|id| !cyclic.contains(*id))
                    .cloned()
                    .collect()
            }
        };

        if !cyclic.is_empty() {
            debug!(?cyclic, "residual cycles found in snapshot");
        }

        ScheduleOrder { order, cyclic }
    }
}
