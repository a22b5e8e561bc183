// src/model/working_set.rs

//! Owned arena of tasks for one run.
//!
//! Each pass takes the working set by `&mut` (or by value) and hands it on;
//! nothing else holds task state during a run.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::calendar::Calendar;
use crate::model::project::ProjectSnapshot;
use crate::model::task::{Task, TaskId};

#[derive(Debug, Clone)]
pub struct WorkingSet {
    calendar: Calendar,
    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
}

impl WorkingSet {
    /// Build an arena over `tasks`. Later duplicates of an id are dropped.
    pub fn new(tasks: Vec<Task>, calendar: Calendar) -> Self {
        let mut set = Self {
            calendar,
            tasks: Vec::with_capacity(tasks.len()),
            index: HashMap::with_capacity(tasks.len()),
        };
        for task in tasks {
            if set.index.contains_key(&task.id) {
                tracing::warn!(task = %task.id, "duplicate task id in snapshot; keeping first");
                continue;
            }
            set.push(task);
        }
        set
    }

    pub fn from_snapshot(snapshot: &ProjectSnapshot) -> Self {
        Self::new(snapshot.tasks.clone(), snapshot.calendar())
    }

    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        let i = *self.index.get(id)?;
        Some(&mut self.tasks[i])
    }

    /// Tasks in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|t| &t.id)
    }

    /// Append a task. Returns `false` (and leaves the set unchanged) when the
    /// id is already present.
    pub fn insert(&mut self, task: Task) -> bool {
        if self.index.contains_key(&task.id) {
            return false;
        }
        self.push(task);
        true
    }

    /// Drop the given ids, keeping the relative order of the survivors.
    pub fn remove_all(&mut self, ids: &[TaskId]) -> Vec<Task> {
        let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| ids.contains(&t.id));
        self.index.clear();
        for task in kept {
            self.push(task);
        }
        removed
    }

    /// Overwrite a task's stored dates. Returns `true` when they changed.
    pub fn set_dates(&mut self, id: &str, start: NaiveDate, end: NaiveDate) -> bool {
        match self.get_mut(id) {
            Some(task) if task.start_date != start || task.end_date != end => {
                task.start_date = start;
                task.end_date = end;
                true
            }
            _ => false,
        }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    pub fn to_tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    fn push(&mut self, task: Task) {
        self.index.insert(task.id.clone(), self.tasks.len());
        self.tasks.push(task);
    }
}
