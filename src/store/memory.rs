// src/store/memory.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;

use super::{check_project_name, set_dates, upsert, TaskStore};
use crate::model::{ProjectSnapshot, Task, TaskId};

/// A write observed by [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedWrite {
    Save { project: String },
    Dates { project: String, task: TaskId, start: NaiveDate, end: NaiveDate },
    Put { project: String, task: TaskId },
    Remove { project: String, ids: Vec<TaskId> },
}

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashMap<String, ProjectSnapshot>,
    writes: Vec<RecordedWrite>,
    /// Writes still allowed before every further write fails.
    fail_after: Option<usize>,
}

/// In-memory task store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(snapshot: ProjectSnapshot) -> Self {
        let store = Self::new();
        store
            .lock()
            .projects
            .insert(snapshot.project.clone(), snapshot);
        store
    }

    /// Let `n` more writes succeed, then fail every write after that.
    pub fn fail_writes_after(&self, n: usize) {
        self.lock().fail_after = Some(n);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    pub fn snapshot(&self, project: &str) -> Option<ProjectSnapshot> {
        self.lock().projects.get(project).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<F>(&self, project: &str, record: RecordedWrite, f: F) -> Result<()>
    where
        F: FnOnce(&mut ProjectSnapshot) -> Result<()>,
    {
        check_project_name(project)?;
        let mut state = self.lock();
        let remaining = state.fail_after;
        match remaining {
            Some(0) => bail!("injected write failure for project {:?}", project),
            Some(n) => state.fail_after = Some(n - 1),
            None => {}
        }
        let snapshot = state
            .projects
            .get_mut(project)
            .ok_or_else(|| anyhow!("project {:?} not found", project))?;
        f(snapshot)?;
        state.writes.push(record);
        Ok(())
    }
}

impl TaskStore for MemoryStore {
    fn load_project(&self, project: &str) -> Result<ProjectSnapshot> {
        self.lock()
            .projects
            .get(project)
            .cloned()
            .ok_or_else(|| anyhow!("project {:?} not found", project))
    }

    fn save_project(&self, snapshot: &ProjectSnapshot) -> Result<()> {
        check_project_name(&snapshot.project)?;
        let mut state = self.lock();
        state
            .projects
            .insert(snapshot.project.clone(), snapshot.clone());
        state.writes.push(RecordedWrite::Save {
            project: snapshot.project.clone(),
        });
        Ok(())
    }

    fn write_dates(&self, project: &str, task: &str, start: NaiveDate, end: NaiveDate) -> Result<()> {
        let record = RecordedWrite::Dates {
            project: project.to_string(),
            task: task.to_string(),
            start,
            end,
        };
        self.write(project, record, |snapshot| set_dates(snapshot, task, start, end))
    }

    fn put_task(&self, project: &str, task: &Task) -> Result<()> {
        let record = RecordedWrite::Put {
            project: project.to_string(),
            task: task.id.clone(),
        };
        self.write(project, record, |snapshot| {
            upsert(&mut snapshot.tasks, task);
            Ok(())
        })
    }

    fn remove_tasks(&self, project: &str, ids: &[TaskId]) -> Result<()> {
        let record = RecordedWrite::Remove {
            project: project.to_string(),
            ids: ids.to_vec(),
        };
        self.write(project, record, |snapshot| {
            snapshot.tasks.retain(|t| !ids.contains(&t.id));
            Ok(())
        })
    }
}
