// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::NaiveDate;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analysis::CriticalPathReport;
use crate::errors::{CascadeError, Result};
use crate::model::{ProjectSnapshot, TaskId};
use crate::store::TaskStore;

use super::core::{EditPlan, NewTask, ReconcileView, RefreshPlan, ScheduleCore, TaskEdit};
use super::{ChangeEvent, EngineRequest, LevelingView, Reply, StoreCommand};

/// Pending requests a project queue holds before senders wait.
pub const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Single writer for one project.
///
/// Owns the request queue and processes requests strictly one at a time:
/// load the snapshot, ask the pure [`ScheduleCore`] for a plan, persist its
/// commands in order, publish a [`ChangeEvent`], reply. All semantics live in
/// the core; this struct only does IO.
pub struct ProjectRuntime {
    project: String,
    core: ScheduleCore,
    store: Arc<dyn TaskStore>,
    requests: mpsc::Receiver<EngineRequest>,
    notify: Option<mpsc::Sender<ChangeEvent>>,
}

impl fmt::Debug for ProjectRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectRuntime")
            .field("project", &self.project)
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl ProjectRuntime {
    pub fn new(
        project: impl Into<String>,
        core: ScheduleCore,
        store: Arc<dyn TaskStore>,
        requests: mpsc::Receiver<EngineRequest>,
        notify: Option<mpsc::Sender<ChangeEvent>>,
    ) -> Self {
        Self {
            project: project.into(),
            core,
            store,
            requests,
            notify,
        }
    }

    /// Main request loop. Returns once every handle has been dropped.
    pub async fn run(mut self) -> Result<()> {
        info!(project = %self.project, "project runtime started");

        while let Some(request) = self.requests.recv().await {
            debug!(project = %self.project, ?request, "runtime received request");
            self.handle(request).await;
        }

        info!(project = %self.project, "request channel closed; runtime exiting");
        Ok(())
    }

    async fn handle(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::Snapshot { reply } => {
                let result = self.load().await;
                respond(reply, result);
            }
            EngineRequest::ReconcileSnapshot { reply } => {
                let result = self
                    .load()
                    .await
                    .map(|snapshot| self.core.reconcile_snapshot(&snapshot));
                respond(reply, result);
            }
            EngineRequest::RefreshSchedule { reply } => {
                let result = self.refresh().await;
                respond(reply, result);
            }
            EngineRequest::ApplyEdit { task, edit, reply } => {
                let result = self
                    .plan_and_persist(|core, snapshot| core.apply_edit(snapshot, &task, &edit))
                    .await;
                respond(reply, result);
            }
            EngineRequest::CreateTask { task, today, reply } => {
                let result = self
                    .plan_and_persist(move |core, snapshot| core.create_task(snapshot, task, today))
                    .await;
                respond(reply, result);
            }
            EngineRequest::RemoveTask { task, reply } => {
                let result = self
                    .plan_and_persist(|core, snapshot| core.remove_task(snapshot, &task))
                    .await;
                respond(reply, result);
            }
            EngineRequest::CriticalPath { reply } => {
                let result = self
                    .load()
                    .await
                    .map(|snapshot| self.core.compute_critical_path(&snapshot));
                respond(reply, result);
            }
            EngineRequest::LevelingProposals { reply } => {
                let result = self.load().await.map(|snapshot| {
                    let critical_path = self.core.compute_critical_path(&snapshot);
                    let proposals = self.core.compute_leveling_proposals(&snapshot, &critical_path);
                    LevelingView {
                        critical_path,
                        proposals,
                    }
                });
                respond(reply, result);
            }
        }
    }

    async fn refresh(&mut self) -> Result<RefreshPlan> {
        let snapshot = self.load().await?;
        let plan = self.core.refresh_schedule(&snapshot);
        self.persist(plan.commands.clone()).await?;
        Ok(plan)
    }

    async fn plan_and_persist<F>(&mut self, plan: F) -> Result<EditPlan>
    where
        F: FnOnce(&ScheduleCore, &ProjectSnapshot) -> Result<EditPlan>,
    {
        let snapshot = self.load().await?;
        let plan = plan(&self.core, &snapshot)?;
        self.persist(plan.commands.clone()).await?;
        Ok(plan)
    }

    async fn load(&self) -> Result<ProjectSnapshot> {
        let store = Arc::clone(&self.store);
        let project = self.project.clone();
        tokio::task::spawn_blocking(move || store.load_project(&project))
            .await
            .map_err(|e| CascadeError::Other(anyhow!("store task panicked: {e}")))?
            .map_err(|e| CascadeError::StoreError(format!("{e:#}")))
    }

    /// Execute `commands` in order. Stops at the first failure; writes and
    /// removals made before it are kept and still announced.
    async fn persist(&mut self, commands: Vec<StoreCommand>) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let project = self.project.clone();
        let (written, removed, failure) = tokio::task::spawn_blocking(move || {
            let mut written: Vec<TaskId> = Vec::new();
            let mut removed: Vec<TaskId> = Vec::new();
            for command in &commands {
                if let Err(e) = store.apply(&project, command) {
                    return (written, removed, Some(e));
                }
                match command {
                    StoreCommand::RemoveTasks { ids } => removed.extend(ids.iter().cloned()),
                    other => {
                        if let Some(id) = other.written_id() {
                            if !written.iter().any(|w| w == id) {
                                written.push(id.to_string());
                            }
                        }
                    }
                }
            }
            (written, removed, None)
        })
        .await
        .map_err(|e| CascadeError::Other(anyhow!("store task panicked: {e}")))?;

        info!(
            project = %self.project,
            written = written.len(),
            removed = removed.len(),
            "persisted plan"
        );
        self.publish(written, removed).await;

        match failure {
            Some(e) => {
                error!(project = %self.project, error = %format!("{e:#}"), "store write failed; rest of plan abandoned");
                Err(CascadeError::StoreError(format!("{e:#}")))
            }
            None => Ok(()),
        }
    }

    async fn publish(&self, changed: Vec<TaskId>, removed: Vec<TaskId>) {
        let Some(tx) = &self.notify else {
            return;
        };
        if changed.is_empty() && removed.is_empty() {
            return;
        }
        let event = ChangeEvent {
            project: self.project.clone(),
            changed,
            removed,
        };
        if tx.send(event).await.is_err() {
            debug!(project = %self.project, "change listener gone; dropping event");
        }
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T>) {
    if reply.send(result).is_err() {
        warn!("requester went away before the reply was sent");
    }
}

/// Cloneable front door to a [`ProjectRuntime`].
#[derive(Debug, Clone)]
pub struct EngineHandle {
    project: String,
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> EngineRequest) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CascadeError::EngineStopped(self.project.clone()))?;
        rx.await
            .map_err(|_| CascadeError::EngineStopped(self.project.clone()))?
    }

    pub async fn snapshot(&self) -> Result<ProjectSnapshot> {
        self.request(|reply| EngineRequest::Snapshot { reply }).await
    }

    pub async fn reconcile_snapshot(&self) -> Result<ReconcileView> {
        self.request(|reply| EngineRequest::ReconcileSnapshot { reply }).await
    }

    pub async fn refresh_schedule(&self) -> Result<RefreshPlan> {
        self.request(|reply| EngineRequest::RefreshSchedule { reply }).await
    }

    pub async fn apply_edit(&self, task: impl Into<TaskId>, edit: TaskEdit) -> Result<EditPlan> {
        let task = task.into();
        self.request(|reply| EngineRequest::ApplyEdit { task, edit, reply })
            .await
    }

    pub async fn create_task(&self, task: NewTask, today: NaiveDate) -> Result<EditPlan> {
        self.request(|reply| EngineRequest::CreateTask { task, today, reply })
            .await
    }

    pub async fn remove_task(&self, task: impl Into<TaskId>) -> Result<EditPlan> {
        let task = task.into();
        self.request(|reply| EngineRequest::RemoveTask { task, reply }).await
    }

    pub async fn compute_critical_path(&self) -> Result<CriticalPathReport> {
        self.request(|reply| EngineRequest::CriticalPath { reply }).await
    }

    pub async fn compute_leveling_proposals(&self) -> Result<LevelingView> {
        self.request(|reply| EngineRequest::LevelingProposals { reply })
            .await
    }
}

/// Spawn the runtime for `project` on the current Tokio runtime.
pub fn spawn_project_runtime(
    project: impl Into<String>,
    core: ScheduleCore,
    store: Arc<dyn TaskStore>,
    notify: Option<mpsc::Sender<ChangeEvent>>,
) -> (EngineHandle, JoinHandle<Result<()>>) {
    let project = project.into();
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_CAPACITY);
    let runtime = ProjectRuntime::new(project.clone(), core, store, rx, notify);
    let join = tokio::spawn(runtime.run());
    (EngineHandle { project, tx }, join)
}

/// Lazily spawns one runtime per project. Projects run independently.
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    core: ScheduleCore,
    store: Arc<dyn TaskStore>,
    notify: Option<mpsc::Sender<ChangeEvent>>,
    handles: Arc<Mutex<HashMap<String, EngineHandle>>>,
}

impl EngineRegistry {
    pub fn new(core: ScheduleCore, store: Arc<dyn TaskStore>) -> Self {
        Self {
            core,
            store,
            notify: None,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Publish every persisted batch, from all projects, on `tx`.
    pub fn with_notifier(mut self, tx: mpsc::Sender<ChangeEvent>) -> Self {
        self.notify = Some(tx);
        self
    }

    /// Handle for `project`, spawning its runtime on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn handle(&self, project: &str) -> EngineHandle {
        let mut handles = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = handles.get(project).filter(|h| !h.is_closed()) {
            return handle.clone();
        }

        debug!(project, "spawning project runtime");
        let (handle, _join) = spawn_project_runtime(
            project,
            self.core.clone(),
            Arc::clone(&self.store),
            self.notify.clone(),
        );
        handles.insert(project.to_string(), handle.clone());
        handle
    }

    pub fn projects(&self) -> Vec<String> {
        let handles = self
            .handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = handles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, Task};
    use crate::store::memory::{MemoryStore, RecordedWrite};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn chain_store() -> MemoryStore {
        let mut snapshot = ProjectSnapshot::new("p", true);
        let mut b = Task::new("B", d(4), d(6));
        b.dependencies = vec![Dependency::finish_start("A")];
        let mut c = Task::new("C", d(7), d(9));
        c.dependencies = vec![Dependency::finish_start("B")];
        snapshot.tasks = vec![Task::new("A", d(1), d(3)), b, c];
        MemoryStore::with_project(snapshot)
    }

    fn spawn(store: &MemoryStore) -> (EngineHandle, JoinHandle<Result<()>>) {
        spawn_project_runtime("p", ScheduleCore::default(), Arc::new(store.clone()), None)
    }

    #[tokio::test]
    async fn edit_is_persisted_in_plan_order() {
        let store = chain_store();
        let (handle, _join) = spawn(&store);

        handle
            .apply_edit("A", TaskEdit::new().with_start(d(5)))
            .await
            .unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 3);
        assert!(matches!(&writes[0], RecordedWrite::Put { task, .. } if task == "A"));
        assert!(matches!(&writes[1], RecordedWrite::Dates { task, .. } if task == "B"));
        assert!(matches!(&writes[2], RecordedWrite::Dates { task, .. } if task == "C"));
        assert_eq!(store.snapshot("p").unwrap().task("C").unwrap().dates(), (d(11), d(13)));
    }

    #[tokio::test]
    async fn rejected_edit_writes_nothing() {
        let store = chain_store();
        let (handle, _join) = spawn(&store);

        let err = handle
            .apply_edit(
                "A",
                TaskEdit::new().with_dependencies(vec![Dependency::finish_start("C")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::CycleDetected { .. }));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_write_keeps_earlier_writes() {
        let store = chain_store();
        store.fail_writes_after(2);
        let (handle, _join) = spawn(&store);

        let err = handle
            .apply_edit("A", TaskEdit::new().with_start(d(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, CascadeError::StoreError(_)));

        let snapshot = store.snapshot("p").unwrap();
        assert_eq!(snapshot.task("A").unwrap().dates(), (d(5), d(7)));
        assert_eq!(snapshot.task("B").unwrap().dates(), (d(8), d(10)));
        assert_eq!(snapshot.task("C").unwrap().dates(), (d(7), d(9)));
    }

    #[tokio::test]
    async fn concurrent_requests_are_serialized() {
        let store = chain_store();
        let (handle, _join) = spawn(&store);

        let first = handle.clone();
        let second = handle.clone();
        let (a, b) = tokio::join!(
            first.apply_edit("A", TaskEdit::new().with_start(d(5))),
            second.apply_edit("A", TaskEdit::new().with_start(d(10))),
        );
        a.unwrap();
        b.unwrap();

        let snapshot = store.snapshot("p").unwrap();
        let a_start = snapshot.task("A").unwrap().start_date;
        let c = snapshot.task("C").unwrap();
        // Whatever order won, C follows the final A.
        assert_eq!(c.start_date, a_start + chrono::Duration::days(6));
        assert_eq!(c.end_date, c.start_date + chrono::Duration::days(2));
    }

    #[tokio::test]
    async fn change_events_are_published() {
        let store = chain_store();
        let (tx, mut rx) = mpsc::channel(8);
        let (handle, _join) =
            spawn_project_runtime("p", ScheduleCore::default(), Arc::new(store.clone()), Some(tx));

        handle
            .apply_edit("A", TaskEdit::new().with_start(d(5)))
            .await
            .unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.project, "p");
        assert_eq!(event.changed, vec!["A".to_string(), "B".into(), "C".into()]);
    }

    #[tokio::test]
    async fn dropping_every_handle_stops_the_runtime() {
        let store = chain_store();
        let (handle, join) = spawn(&store);
        drop(handle);
        join.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn registry_reuses_handles_per_project() {
        let store = chain_store();
        let registry = EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone()));

        let one = registry.handle("p");
        let two = registry.handle("p");
        assert_eq!(one.project(), two.project());
        assert_eq!(registry.projects(), vec!["p".to_string()]);

        let err = registry.handle("missing").snapshot().await.unwrap_err();
        assert!(matches!(err, CascadeError::StoreError(_)));
        assert_eq!(one.snapshot().await.unwrap().tasks.len(), 3);
    }
}
