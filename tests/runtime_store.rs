// tests/runtime_store.rs
mod common;
use crate::common::{d, init_tracing, with_timeout, SnapshotBuilder, TaskBuilder};

use std::error::Error;
use std::sync::Arc;

use tokio::sync::mpsc;

use taskcascade::engine::{EngineRegistry, NewTask, ScheduleCore, TaskEdit};
use taskcascade::errors::CascadeError;
use taskcascade::model::{Dependency, ProjectSnapshot};
use taskcascade::store::{JsonFileStore, MemoryStore, TaskStore};

type TestResult = Result<(), Box<dyn Error>>;

fn plan_snapshot(project: &str) -> ProjectSnapshot {
    SnapshotBuilder::new(project)
        .task(TaskBuilder::new("design", d(1), d(3)))
        .task(TaskBuilder::new("build", d(4), d(8)).after("design"))
        .task(TaskBuilder::new("ship", d(9), d(9)).after("build"))
        .build()
}

#[tokio::test]
async fn edits_are_persisted_to_json_files() -> TestResult {
    with_timeout(async {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let store = JsonFileStore::new(dir.path());
        store.save_project(&plan_snapshot("alpha"))?;

        let registry = EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone()));
        let handle = registry.handle("alpha");

        let plan = handle
            .apply_edit("design", TaskEdit::new().with_start(d(5)))
            .await?;
        assert_eq!(plan.updated_tasks.len(), 3);

        let on_disk = store.load_project("alpha")?;
        assert_eq!(on_disk.task("design").unwrap().dates(), (d(5), d(7)));
        assert_eq!(on_disk.task("build").unwrap().dates(), (d(8), d(12)));
        assert_eq!(on_disk.task("ship").unwrap().dates(), (d(13), d(13)));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn display_reconcile_never_writes() -> TestResult {
    with_timeout(async {
        let snapshot = SnapshotBuilder::new("p")
            .task(TaskBuilder::new("P", d(1), d(10)))
            .task(TaskBuilder::new("S", d(2), d(3)).after("P"))
            .build();
        let store = MemoryStore::with_project(snapshot);
        let registry = EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone()));

        let view = registry.handle("p").reconcile_snapshot().await?;
        assert_eq!(view.outcome.changed, vec!["S".to_string()]);
        assert!(store.writes().is_empty());

        let plan = registry.handle("p").refresh_schedule().await?;
        assert_eq!(plan.changed_count, 1);
        assert_eq!(store.writes().len(), 1);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn projects_run_independently() -> TestResult {
    with_timeout(async {
        let store = MemoryStore::with_project(plan_snapshot("one"));
        store.save_project(&plan_snapshot("two"))?;
        let (tx, mut rx) = mpsc::channel(16);
        let registry =
            EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone())).with_notifier(tx);

        let one = registry.handle("one");
        let two = registry.handle("two");
        let (a, b) = tokio::join!(
            one.apply_edit("design", TaskEdit::new().with_start(d(2))),
            two.remove_task("build"),
        );
        a?;
        b?;

        let mut projects = vec![rx.recv().await.unwrap().project, rx.recv().await.unwrap().project];
        projects.sort();
        assert_eq!(projects, vec!["one", "two"]);

        let two_tasks = store.load_project("two")?.tasks;
        assert_eq!(two_tasks.len(), 2);
        let ship = two_tasks.iter().find(|t| t.id == "ship").unwrap();
        assert!(ship.dependencies.is_empty());
        assert_eq!(store.load_project("one")?.task("ship").unwrap().dates(), (d(10), d(10)));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn create_task_goes_through_the_queue() -> TestResult {
    with_timeout(async {
        let store = MemoryStore::with_project(plan_snapshot("p"));
        let registry = EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone()));
        let handle = registry.handle("p");

        let mut new = NewTask::new("docs");
        new.dependencies = vec![Dependency::finish_start("ship")];
        new.owner = Some("ann".into());
        handle.create_task(new, d(1)).await?;

        let docs = store.load_project("p")?.task("docs").cloned().unwrap();
        assert_eq!(docs.dates(), (d(10), d(16)));
        assert_eq!(docs.owner.as_deref(), Some("ann"));

        let err = handle.create_task(NewTask::new("docs"), d(1)).await.unwrap_err();
        assert!(matches!(err, CascadeError::DuplicateTask(_)));
        Ok(())
    })
    .await
}

#[tokio::test]
async fn analyses_are_read_only() -> TestResult {
    with_timeout(async {
        let store = MemoryStore::with_project(plan_snapshot("p"));
        let registry = EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone()));
        let handle = registry.handle("p");

        let report = handle.compute_critical_path().await?;
        assert_eq!(report.critical_ids.len(), 3);
        let leveling = handle.compute_leveling_proposals().await?;
        assert!(leveling.proposals.is_empty());
        assert!(store.writes().is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn loop_through_a_summary_is_rejected_before_any_write() -> TestResult {
    with_timeout(async {
        let snapshot = SnapshotBuilder::new("p")
            .task(TaskBuilder::new("P", d(1), d(3)))
            .task(TaskBuilder::new("A", d(1), d(3)).parent("P"))
            .task(TaskBuilder::new("B", d(4), d(6)).after("P"))
            .build();
        let store = MemoryStore::with_project(snapshot);
        let registry = EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone()));
        let handle = registry.handle("p");

        let edit = TaskEdit::new().with_dependencies(vec![Dependency::finish_start("B")]);
        let err = handle.apply_edit("A", edit).await.unwrap_err();
        assert_eq!(err.cycle_chain().unwrap(), &["A", "B", "P", "A"]);
        assert!(store.writes().is_empty());

        let view = handle.reconcile_snapshot().await?;
        assert!(view.outcome.anomalies.is_empty());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn committed_removal_is_announced_when_a_later_write_fails() -> TestResult {
    with_timeout(async {
        let store = MemoryStore::with_project(plan_snapshot("p"));
        store.fail_writes_after(1);
        let (tx, mut rx) = mpsc::channel(16);
        let registry =
            EngineRegistry::new(ScheduleCore::default(), Arc::new(store.clone())).with_notifier(tx);

        // Removing "design" also rewrites "build" without its dependency.
        let err = registry.handle("p").remove_task("design").await.unwrap_err();
        assert!(matches!(err, CascadeError::StoreError(_)));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.removed, vec!["design".to_string()]);
        assert!(event.changed.is_empty());

        let stored = store.load_project("p")?;
        assert!(stored.task("design").is_none());
        assert_eq!(stored.task("build").unwrap().predecessor_ids().count(), 1);
        Ok(())
    })
    .await
}
