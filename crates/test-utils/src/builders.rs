#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use taskcascade::model::{Constraint, Dependency, ProjectSnapshot, Task, TaskId};
use taskcascade::types::{BufferPosition, ConstraintType, LinkType};

/// Day `n` of June 2024. June 3rd 2024 is a Monday.
pub fn d(n: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, n).expect("valid June 2024 day")
}

/// The Monday of the week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Builder for `Task` to simplify test setup.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(id: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            task: Task::new(id, start, end),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    /// Finish-to-start predecessor.
    pub fn after(self, pred: &str) -> Self {
        self.link(pred, LinkType::FinishStart)
    }

    pub fn link(mut self, pred: &str, link: LinkType) -> Self {
        self.task.dependencies.push(Dependency::new(pred, link));
        self
    }

    pub fn buffer(mut self, days: u32, position: BufferPosition) -> Self {
        self.task.buffer_days = days;
        self.task.buffer_position = position;
        self
    }

    pub fn constraint(mut self, kind: ConstraintType, date: NaiveDate) -> Self {
        self.task.constraint = Constraint::new(kind, date);
        self
    }

    pub fn exclusive_with(mut self, peer: &str) -> Self {
        self.task.exclusion_links.insert(peer.to_string());
        self
    }

    pub fn parent(mut self, parent: &str) -> Self {
        self.task.parent_task_id = Some(parent.to_string());
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.task.owner = Some(owner.to_string());
        self
    }

    pub fn effort(mut self, hours: f64) -> Self {
        self.task.effort_hours = Some(hours);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Builder for `ProjectSnapshot`.
pub struct SnapshotBuilder {
    snapshot: ProjectSnapshot,
}

impl SnapshotBuilder {
    pub fn new(project: &str) -> Self {
        Self {
            snapshot: ProjectSnapshot::new(project, true),
        }
    }

    pub fn working_days(mut self) -> Self {
        self.snapshot.include_weekends = false;
        self
    }

    pub fn calendar_days(mut self) -> Self {
        self.snapshot.include_weekends = true;
        self
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.snapshot.tasks.push(task.build());
        self
    }

    pub fn raw_task(mut self, task: Task) -> Self {
        self.snapshot.tasks.push(task);
        self
    }

    pub fn build(self) -> ProjectSnapshot {
        self.snapshot
    }
}

/// Look up a task's dates in a task list, panicking when absent.
pub fn dates_of(tasks: &[Task], id: &str) -> (NaiveDate, NaiveDate) {
    tasks
        .iter()
        .find(|t| t.id == id)
        .unwrap_or_else(|| panic!("task {id} missing"))
        .dates()
}

pub fn ids(list: &[&str]) -> Vec<TaskId> {
    list.iter().map(|s| s.to_string()).collect()
}
