// src/store/mod.rs

//! Task Store abstraction.
//!
//! The engine reads one [`ProjectSnapshot`] per run and writes back through
//! the narrow set of operations below. [`JsonFileStore`] keeps one pretty
//! printed JSON file per project; [`memory::MemoryStore`] is the in-memory
//! double used by tests.

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use tracing::debug;

use crate::engine::StoreCommand;
use crate::model::{ProjectSnapshot, Task, TaskId};

pub mod memory;

pub use memory::MemoryStore;

/// Abstract task storage, keyed by project name.
pub trait TaskStore: Send + Sync + Debug {
    fn load_project(&self, project: &str) -> Result<ProjectSnapshot>;
    fn save_project(&self, snapshot: &ProjectSnapshot) -> Result<()>;

    /// Overwrite the dates of a single task. Nothing else is touched.
    fn write_dates(&self, project: &str, task: &str, start: NaiveDate, end: NaiveDate) -> Result<()>;

    /// Insert `task`, or replace the stored task with the same id.
    fn put_task(&self, project: &str, task: &Task) -> Result<()>;

    fn remove_tasks(&self, project: &str, ids: &[TaskId]) -> Result<()>;

    /// Execute one command produced by the engine core.
    fn apply(&self, project: &str, command: &StoreCommand) -> Result<()> {
        match command {
            StoreCommand::WriteDates { task, start, end } => {
                self.write_dates(project, task, *start, *end)
            }
            StoreCommand::PutTask(task) => self.put_task(project, task),
            StoreCommand::RemoveTasks { ids } => self.remove_tasks(project, ids),
        }
    }
}

/// Reject project names that would escape the store directory.
pub(crate) fn check_project_name(project: &str) -> Result<()> {
    if project.is_empty()
        || project == "."
        || project == ".."
        || project.contains(['/', '\\'])
    {
        bail!("invalid project name {:?}", project);
    }
    Ok(())
}

pub(crate) fn upsert(tasks: &mut Vec<Task>, task: &Task) {
    match tasks.iter_mut().find(|t| t.id == task.id) {
        Some(existing) => *existing = task.clone(),
        None => tasks.push(task.clone()),
    }
}

pub(crate) fn set_dates(
    snapshot: &mut ProjectSnapshot,
    task: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<()> {
    let stored = snapshot
        .tasks
        .iter_mut()
        .find(|t| t.id == task)
        .ok_or_else(|| anyhow!("task {:?} not found in project {:?}", task, snapshot.project))?;
    stored.start_date = start;
    stored.end_date = end;
    Ok(())
}

/// Stores each project as `<root>/<project>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_path(&self, project: &str) -> PathBuf {
        self.root.join(format!("{project}.json"))
    }

    pub fn project_exists(&self, project: &str) -> bool {
        self.project_path(project).is_file()
    }

    fn update<F>(&self, project: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectSnapshot) -> Result<()>,
    {
        let mut snapshot = self.load_project(project)?;
        f(&mut snapshot)?;
        self.save_project(&snapshot)
    }
}

impl TaskStore for JsonFileStore {
    fn load_project(&self, project: &str) -> Result<ProjectSnapshot> {
        check_project_name(project)?;
        let path = self.project_path(project);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("reading project file {:?}", path))?;
        let snapshot: ProjectSnapshot = serde_json::from_str(&raw)
            .with_context(|| format!("parsing project file {:?}", path))?;
        debug!(project, tasks = snapshot.tasks.len(), "loaded project");
        Ok(snapshot)
    }

    fn save_project(&self, snapshot: &ProjectSnapshot) -> Result<()> {
        check_project_name(&snapshot.project)?;
        fs::create_dir_all(&self.root)
            .with_context(|| format!("creating store dir {:?}", self.root))?;

        let path = self.project_path(&snapshot.project);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(snapshot)
            .with_context(|| format!("serializing project {:?}", snapshot.project))?;
        fs::write(&tmp, body).with_context(|| format!("writing {:?}", tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("replacing {:?}", path))?;
        Ok(())
    }

    fn write_dates(&self, project: &str, task: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
        self.update(project, |snapshot| set_dates(snapshot, task, start, end))
    }

    fn put_task(&self, project: &str, task: &Task) -> Result<()> {
        self.update(project, |snapshot| {
            upsert(&mut snapshot.tasks, task);
            Ok(())
        })
    }

    fn remove_tasks(&self, project: &str, ids: &[TaskId]) -> Result<()> {
        self.update(project, |snapshot| {
            snapshot.tasks.retain(|t| !ids.contains(&t.id));
            Ok(())
        })
    }
}
