// src/engine/core.rs

//! Pure schedule core.
//!
//! This module contains the synchronous, deterministic half of the engine.
//! Every entry point takes a [`ProjectSnapshot`] and produces:
//! - the recomputed tasks
//! - the anomalies found along the way
//! - for the persisting entry points, an ordered list of [`StoreCommand`]s
//!   describing what the IO shell should write
//!
//! The async shell (`engine::runtime`) is responsible for loading snapshots,
//! executing the commands against a task store and serializing requests per
//! project. The core is unit tested without Tokio or any store.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{
    compute_critical_path, compute_leveling_proposals, CriticalPathReport, LevelingOptions,
    LevelingProposal,
};
use crate::dag::{find_cycle_with, would_create_hierarchy_cycle, DependencyGraph};
use crate::engine::StoreCommand;
use crate::errors::{CascadeError, Result};
use crate::model::{Constraint, Dependency, ProjectSnapshot, Task, TaskId, WorkingSet};
use crate::schedule::anomaly::record;
use crate::schedule::{cascade_from, reconcile, reconcile_task, Anomaly, ReconcileOutcome};
use crate::types::BufferPosition;

/// Knobs shared by the core and the runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Upper bound on task decisions made by a single cascade.
    pub max_cascade_steps: usize,
    /// Span of a newly created task, in valid days, both ends included.
    pub default_span_days: u32,
    pub leveling: LevelingOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_cascade_steps: 10_000,
            default_span_days: 7,
            leveling: LevelingOptions::default(),
        }
    }
}

/// Field changes for one task. `None` leaves a field alone.
///
/// The doubly optional fields distinguish "leave alone" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskEdit {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub dependencies: Option<Vec<Dependency>>,
    pub buffer_days: Option<u32>,
    pub buffer_position: Option<BufferPosition>,
    pub constraint: Option<Constraint>,
    pub exclusion_links: Option<BTreeSet<TaskId>>,
    pub parent_task_id: Option<Option<TaskId>>,
    pub owner: Option<Option<String>>,
    pub effort_hours: Option<Option<f64>>,
}

impl TaskEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_start(mut self, start: NaiveDate) -> Self {
        self.start_date = Some(start);
        self
    }

    pub fn with_end(mut self, end: NaiveDate) -> Self {
        self.end_date = Some(end);
        self
    }

    pub fn with_dates(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.with_start(start).with_end(end)
    }

    pub fn with_dependencies(mut self, deps: Vec<Dependency>) -> Self {
        self.dependencies = Some(deps);
        self
    }

    pub fn with_buffer(mut self, days: u32, position: BufferPosition) -> Self {
        self.buffer_days = Some(days);
        self.buffer_position = Some(position);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_exclusions<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.exclusion_links = Some(peers.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_parent(mut self, parent: Option<TaskId>) -> Self {
        self.parent_task_id = Some(parent);
        self
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_effort(mut self, hours: Option<f64>) -> Self {
        self.effort_hours = Some(hours);
        self
    }

    /// Copy every non-date, non-link field onto `task`.
    fn apply_fields(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = name.clone();
        }
        if let Some(deps) = &self.dependencies {
            task.dependencies = deps.clone();
        }
        if let Some(days) = self.buffer_days {
            task.buffer_days = days;
        }
        if let Some(position) = self.buffer_position {
            task.buffer_position = position;
        }
        if let Some(constraint) = self.constraint {
            task.constraint = constraint;
        }
        if let Some(parent) = &self.parent_task_id {
            task.parent_task_id = parent.clone();
        }
        if let Some(owner) = &self.owner {
            task.owner = owner.clone();
        }
        if let Some(effort) = self.effort_hours {
            task.effort_hours = effort;
        }
    }
}

/// Input of [`ScheduleCore::create_task`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub id: TaskId,
    pub name: String,
    /// Defaults to today; moved to the next valid day either way.
    pub start: Option<NaiveDate>,
    pub parent_task_id: Option<TaskId>,
    pub dependencies: Vec<Dependency>,
    pub owner: Option<String>,
    pub effort_hours: Option<f64>,
}

impl NewTask {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Display-only reconciliation result.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileView {
    pub tasks: Vec<Task>,
    pub outcome: ReconcileOutcome,
}

/// Result of a full refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshPlan {
    /// Date writes in topological order.
    pub commands: Vec<StoreCommand>,
    pub changed_count: usize,
    pub final_tasks: Vec<Task>,
    pub anomalies: Vec<Anomaly>,
}

/// Result of an edit, a creation or a removal.
#[derive(Debug, Clone, Serialize)]
pub struct EditPlan {
    pub commands: Vec<StoreCommand>,
    /// Final state of every task the plan writes.
    pub updated_tasks: Vec<Task>,
    pub removed: Vec<TaskId>,
    pub violations: Vec<Anomaly>,
    pub final_tasks: Vec<Task>,
}

impl EditPlan {
    fn build(
        original: &ProjectSnapshot,
        ws: WorkingSet,
        graph: &DependencyGraph,
        mut commands: Vec<StoreCommand>,
        removed: Vec<TaskId>,
        violations: Vec<Anomaly>,
    ) -> Self {
        let skip: HashSet<&str> = commands.iter().filter_map(StoreCommand::written_id).collect();
        let writes = plan_writes(original, &ws, graph, &skip);
        commands.extend(writes);

        let written: HashSet<&str> = commands.iter().filter_map(StoreCommand::written_id).collect();
        let updated_tasks = ws
            .iter()
            .filter(|t| written.contains(t.id.as_str()))
            .cloned()
            .collect();

        Self {
            commands,
            updated_tasks,
            removed,
            violations,
            final_tasks: ws.into_tasks(),
        }
    }
}

/// Date writes for every task whose dates differ from `original`, in
/// topological order (tasks on residual cycles last, in snapshot order).
///
/// Tasks absent from `original` and ids in `skip` are left to the caller.
fn plan_writes(
    original: &ProjectSnapshot,
    ws: &WorkingSet,
    graph: &DependencyGraph,
    skip: &HashSet<&str>,
) -> Vec<StoreCommand> {
    let before: HashMap<&str, (NaiveDate, NaiveDate)> = original
        .tasks
        .iter()
        .map(|t| (t.id.as_str(), t.dates()))
        .collect();

    let schedule = graph.schedule_order();
    let in_order: HashSet<&str> = schedule.order.iter().map(String::as_str).collect();
    let ordered = schedule
        .order
        .iter()
        .map(String::as_str)
        .chain(ws.ids().map(String::as_str).filter(|id| !in_order.contains(id)));

    let mut commands = Vec::new();
    for id in ordered {
        if skip.contains(id) {
            continue;
        }
        let (Some(task), Some(old)) = (ws.get(id), before.get(id)) else {
            continue;
        };
        if task.dates() != *old {
            commands.push(StoreCommand::WriteDates {
                task: task.id.clone(),
                start: task.start_date,
                end: task.end_date,
            });
        }
    }
    commands
}

fn merge(into: &mut Vec<Anomaly>, from: Vec<Anomaly>) {
    for anomaly in from {
        if !into.contains(&anomaly) {
            into.push(anomaly);
        }
    }
}

/// The single implementation of every engine operation.
#[derive(Debug, Clone, Default)]
pub struct ScheduleCore {
    options: EngineOptions,
}

impl ScheduleCore {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Re-decide `id` against its predecessors, then cascade from it.
    fn settle(
        &self,
        ws: &mut WorkingSet,
        graph: &DependencyGraph,
        id: &str,
        anomalies: &mut Vec<Anomaly>,
    ) {
        if let Some(decision) = reconcile_task(ws, graph, id, anomalies) {
            if decision.changed() {
                let (start, end) = decision.after;
                ws.set_dates(id, start, end);
            }
        }
        let outcome = cascade_from(ws, graph, id, self.options.max_cascade_steps);
        if outcome.truncated {
            warn!(origin = %id, steps = outcome.steps, "cascade truncated");
        }
        merge(anomalies, outcome.anomalies);
    }

    /// Full reconciliation without persisting anything.
    pub fn reconcile_snapshot(&self, snapshot: &ProjectSnapshot) -> ReconcileView {
        let mut ws = WorkingSet::from_snapshot(snapshot);
        let graph = DependencyGraph::from_working_set(&ws);
        let outcome = reconcile(&mut ws, &graph);
        ReconcileView {
            tasks: ws.into_tasks(),
            outcome,
        }
    }

    /// Full reconciliation plus exclusion pass, cascaded from every changed
    /// task, planned as date writes in topological order.
    pub fn refresh_schedule(&self, snapshot: &ProjectSnapshot) -> RefreshPlan {
        let mut ws = WorkingSet::from_snapshot(snapshot);
        let graph = DependencyGraph::from_working_set(&ws);

        let outcome = reconcile(&mut ws, &graph);
        let mut anomalies = outcome.anomalies;
        for id in &outcome.changed {
            let cascade = cascade_from(&mut ws, &graph, id, self.options.max_cascade_steps);
            merge(&mut anomalies, cascade.anomalies);
        }

        let commands = plan_writes(snapshot, &ws, &graph, &HashSet::new());
        info!(
            project = %snapshot.project,
            changed = commands.len(),
            anomalies = anomalies.len(),
            "refresh planned"
        );

        RefreshPlan {
            changed_count: commands.len(),
            commands,
            final_tasks: ws.into_tasks(),
            anomalies,
        }
    }

    /// Validate and apply `edit` to task `id`, then reconcile and cascade.
    ///
    /// Rejected edits (`TaskNotFound`, `CycleDetected`, `HierarchyCycle`)
    /// produce no commands at all.
    pub fn apply_edit(&self, snapshot: &ProjectSnapshot, id: &str, edit: &TaskEdit) -> Result<EditPlan> {
        let mut ws = WorkingSet::from_snapshot(snapshot);
        let before = ws
            .get(id)
            .cloned()
            .ok_or_else(|| CascadeError::TaskNotFound(id.to_string()))?;
        let graph = DependencyGraph::from_working_set(&ws);

        if let Some(Some(parent)) = &edit.parent_task_id {
            if !ws.contains(parent) {
                return Err(CascadeError::TaskNotFound(parent.clone()));
            }
            if would_create_hierarchy_cycle(&graph, id, parent) {
                warn!(task = %id, parent = %parent, "rejecting reparent that closes a hierarchy loop");
                return Err(CascadeError::HierarchyCycle {
                    task: id.to_string(),
                    parent: parent.clone(),
                });
            }
        }
        if edit.dependencies.is_some() || edit.parent_task_id.is_some() {
            let mut candidate = before.clone();
            edit.apply_fields(&mut candidate);
            if let Some(chain) = find_cycle_with(&ws, &candidate) {
                warn!(task = %id, ?chain, "rejecting edit that closes a dependency cycle");
                return Err(CascadeError::CycleDetected { chain });
            }
        }
        if let Some(peers) = &edit.exclusion_links {
            if let Some(missing) = peers.iter().find(|p| !ws.contains(p)) {
                return Err(CascadeError::TaskNotFound(missing.clone()));
            }
        }

        let calendar = ws.calendar();
        let mut violations = Vec::new();
        let mut edited = before.clone();
        edit.apply_fields(&mut edited);

        let start = edit.start_date.unwrap_or(before.start_date);
        let end = match (edit.start_date, edit.end_date) {
            (_, Some(end)) => end,
            (Some(start), None) => calendar.add_days(start, before.duration(&calendar).max(0)),
            (None, None) => before.end_date,
        };
        if end < start {
            record(
                &mut violations,
                Anomaly::InvalidDateRange {
                    task: id.to_string(),
                    start,
                    end,
                },
            );
        } else {
            edited.start_date = start;
            edited.end_date = end;
        }

        // Keep exclusion links symmetric.
        let mut relinked: Vec<TaskId> = Vec::new();
        if let Some(peers) = &edit.exclusion_links {
            let peers: BTreeSet<TaskId> = peers.iter().filter(|p| *p != id).cloned().collect();
            for gone in before.exclusion_links.difference(&peers) {
                if let Some(peer) = ws.get_mut(gone) {
                    if peer.exclusion_links.remove(id) {
                        relinked.push(gone.clone());
                    }
                }
            }
            for added in peers.difference(&before.exclusion_links) {
                if let Some(peer) = ws.get_mut(added) {
                    if peer.exclusion_links.insert(id.to_string()) {
                        relinked.push(added.clone());
                    }
                }
            }
            edited.exclusion_links = peers;
        }

        let old_parent = before
            .parent_task_id
            .clone()
            .filter(|p| edited.parent_task_id.as_ref() != Some(p));
        if let Some(slot) = ws.get_mut(id) {
            *slot = edited;
        }

        debug!(task = %id, ?edit, "applying edit");
        let graph = DependencyGraph::from_working_set(&ws);
        self.settle(&mut ws, &graph, id, &mut violations);
        if let Some(parent) = old_parent.filter(|p| ws.contains(p)) {
            self.settle(&mut ws, &graph, &parent, &mut violations);
        }

        let mut commands = Vec::new();
        for put in std::iter::once(id).chain(relinked.iter().map(String::as_str)) {
            if let Some(task) = ws.get(put) {
                commands.push(StoreCommand::PutTask(task.clone()));
            }
        }

        let plan = EditPlan::build(snapshot, ws, &graph, commands, Vec::new(), violations);
        info!(
            task = %id,
            writes = plan.commands.len(),
            violations = plan.violations.len(),
            "edit planned"
        );
        Ok(plan)
    }

    /// Create a task spanning `default_span_days` valid days.
    pub fn create_task(&self, snapshot: &ProjectSnapshot, new: NewTask, today: NaiveDate) -> Result<EditPlan> {
        let mut ws = WorkingSet::from_snapshot(snapshot);
        if ws.contains(&new.id) {
            return Err(CascadeError::DuplicateTask(new.id));
        }
        if let Some(parent) = &new.parent_task_id {
            if !ws.contains(parent) {
                return Err(CascadeError::TaskNotFound(parent.clone()));
            }
        }
        let calendar = ws.calendar();
        let start = calendar.next_valid_day(new.start.unwrap_or(today));
        let span = i64::from(self.options.default_span_days.max(1));
        let end = calendar.add_days(start, span - 1);

        let mut task = Task::new(new.id, start, end);
        task.name = new.name;
        task.parent_task_id = new.parent_task_id;
        task.dependencies = new.dependencies;
        task.owner = new.owner;
        task.effort_hours = new.effort_hours;
        if let Some(chain) = find_cycle_with(&ws, &task) {
            warn!(task = %task.id, ?chain, "rejecting new task that closes a dependency cycle");
            return Err(CascadeError::CycleDetected { chain });
        }
        let id = task.id.clone();
        ws.insert(task);

        let mut violations = Vec::new();
        let graph = DependencyGraph::from_working_set(&ws);
        self.settle(&mut ws, &graph, &id, &mut violations);

        let commands = ws
            .get(&id)
            .map(|t| vec![StoreCommand::PutTask(t.clone())])
            .unwrap_or_default();
        info!(task = %id, start = %start, end = %end, "task created");
        Ok(EditPlan::build(snapshot, ws, &graph, commands, Vec::new(), violations))
    }

    /// Remove `id` and its descendants, strip every link to them, and
    /// cascade from the former parent and successors.
    pub fn remove_task(&self, snapshot: &ProjectSnapshot, id: &str) -> Result<EditPlan> {
        let mut ws = WorkingSet::from_snapshot(snapshot);
        if !ws.contains(id) {
            return Err(CascadeError::TaskNotFound(id.to_string()));
        }
        let graph = DependencyGraph::from_working_set(&ws);

        let mut removed = vec![id.to_string()];
        removed.extend(graph.descendants_of(id));
        let gone: HashSet<&str> = removed.iter().map(String::as_str).collect();

        let mut seeds: Vec<TaskId> = Vec::new();
        if let Some(parent) = graph.parent_of(id).filter(|p| !gone.contains(p.as_str())) {
            seeds.push(parent.clone());
        }
        for r in &removed {
            for succ in graph.dependents_of(r) {
                if !gone.contains(succ.as_str()) && !seeds.contains(succ) {
                    seeds.push(succ.clone());
                }
            }
        }

        let survivors: Vec<TaskId> = ws.ids().filter(|t| !gone.contains(t.as_str())).cloned().collect();
        let mut stripped: Vec<TaskId> = Vec::new();
        for sid in survivors {
            let Some(task) = ws.get_mut(&sid) else {
                continue;
            };
            let links = (task.dependencies.len(), task.exclusion_links.len());
            task.dependencies.retain(|d| !gone.contains(d.predecessor.as_str()));
            task.exclusion_links.retain(|p| !gone.contains(p.as_str()));
            if (task.dependencies.len(), task.exclusion_links.len()) != links {
                stripped.push(sid);
            }
        }

        ws.remove_all(&removed);
        let mut violations = Vec::new();
        let graph = DependencyGraph::from_working_set(&ws);
        for seed in &seeds {
            self.settle(&mut ws, &graph, seed, &mut violations);
        }

        let mut commands = vec![StoreCommand::RemoveTasks { ids: removed.clone() }];
        for sid in &stripped {
            if let Some(task) = ws.get(sid) {
                commands.push(StoreCommand::PutTask(task.clone()));
            }
        }

        info!(task = %id, removed = removed.len(), relinked = stripped.len(), "task removed");
        Ok(EditPlan::build(snapshot, ws, &graph, commands, removed, violations))
    }

    pub fn compute_critical_path(&self, snapshot: &ProjectSnapshot) -> CriticalPathReport {
        let ws = WorkingSet::from_snapshot(snapshot);
        let graph = DependencyGraph::from_working_set(&ws);
        compute_critical_path(&ws, &graph)
    }

    pub fn compute_leveling_proposals(
        &self,
        snapshot: &ProjectSnapshot,
        critical: &CriticalPathReport,
    ) -> Vec<LevelingProposal> {
        let ws = WorkingSet::from_snapshot(snapshot);
        let graph = DependencyGraph::from_working_set(&ws);
        compute_leveling_proposals(&ws, &graph, critical, &self.options.leveling)
    }
}
