// src/model/task.rs

//! The `Task` record.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::types::{BufferPosition, ConstraintType, LinkType};

/// Canonical task identifier type used throughout the engine.
pub type TaskId = String;

/// One typed precedence edge: `predecessor` must be honoured by the owning task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub predecessor: TaskId,
    #[serde(default)]
    pub link: LinkType,
}

impl Dependency {
    pub fn new(predecessor: impl Into<TaskId>, link: LinkType) -> Self {
        Self {
            predecessor: predecessor.into(),
            link,
        }
    }

    pub fn finish_start(predecessor: impl Into<TaskId>) -> Self {
        Self::new(predecessor, LinkType::FinishStart)
    }
}

/// Fixed-date constraint attached to a task.
///
/// A non-ASAP kind without a date has no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(default)]
    pub kind: ConstraintType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl Constraint {
    pub fn asap() -> Self {
        Self::default()
    }

    pub fn new(kind: ConstraintType, date: NaiveDate) -> Self {
        Self {
            kind,
            date: Some(date),
        }
    }

    pub fn is_asap(&self) -> bool {
        self.kind == ConstraintType::AsSoonAsPossible
    }
}

/// A scheduling unit.
///
/// Duration is never stored: it is always `calendar.diff_days(start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskRecord")]
pub struct Task {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Ordered predecessor set. The only stored form of dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub buffer_days: u32,
    #[serde(default)]
    pub buffer_position: BufferPosition,
    #[serde(default)]
    pub constraint: Constraint,
    /// Tasks that must never overlap this one. Kept symmetric by the engine.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub exclusion_links: BTreeSet<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort_hours: Option<f64>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            start_date,
            end_date,
            dependencies: Vec::new(),
            buffer_days: 0,
            buffer_position: BufferPosition::End,
            constraint: Constraint::asap(),
            exclusion_links: BTreeSet::new(),
            parent_task_id: None,
            owner: None,
            effort_hours: None,
        }
    }

    /// Duration in valid days under `calendar`.
    pub fn duration(&self, calendar: &Calendar) -> i64 {
        calendar.diff_days(self.start_date, self.end_date)
    }

    pub fn dates(&self) -> (NaiveDate, NaiveDate) {
        (self.start_date, self.end_date)
    }

    /// Legacy single-predecessor view: the first entry of `dependencies`.
    pub fn primary_predecessor(&self) -> Option<&TaskId> {
        self.dependencies.first().map(|d| &d.predecessor)
    }

    pub fn predecessor_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.dependencies.iter().map(|d| &d.predecessor)
    }

    pub fn depends_on(&self, id: &str) -> bool {
        self.dependencies.iter().any(|d| d.predecessor == id)
    }

    /// Start as seen by successors: pulled earlier by a start-side buffer.
    pub fn effective_start(&self, calendar: &Calendar) -> NaiveDate {
        match self.buffer_position {
            BufferPosition::Start => calendar.add_days(self.start_date, -i64::from(self.buffer_days)),
            BufferPosition::End => self.start_date,
        }
    }

    /// End as seen by successors: pushed later by an end-side buffer.
    pub fn effective_end(&self, calendar: &Calendar) -> NaiveDate {
        match self.buffer_position {
            BufferPosition::End => calendar.add_days(self.end_date, i64::from(self.buffer_days)),
            BufferPosition::Start => self.end_date,
        }
    }
}

/// Storage shape of a task, accepting the legacy `predecessor` field.
#[derive(Deserialize)]
struct TaskRecord {
    id: TaskId,
    #[serde(default)]
    name: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(default)]
    dependencies: Vec<Dependency>,
    #[serde(default)]
    predecessor: Option<TaskId>,
    #[serde(default)]
    buffer_days: u32,
    #[serde(default)]
    buffer_position: BufferPosition,
    #[serde(default)]
    constraint: Constraint,
    #[serde(default)]
    exclusion_links: BTreeSet<TaskId>,
    #[serde(default)]
    parent_task_id: Option<TaskId>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    effort_hours: Option<f64>,
}

impl From<TaskRecord> for Task {
    fn from(rec: TaskRecord) -> Self {
        let mut dependencies = rec.dependencies;
        if let Some(legacy) = rec.predecessor {
            if !dependencies.iter().any(|d| d.predecessor == legacy) {
                dependencies.insert(0, Dependency::finish_start(legacy));
            }
        }

        Self {
            id: rec.id,
            name: rec.name,
            start_date: rec.start_date,
            end_date: rec.end_date,
            dependencies,
            buffer_days: rec.buffer_days,
            buffer_position: rec.buffer_position,
            constraint: rec.constraint,
            exclusion_links: rec.exclusion_links,
            parent_task_id: rec.parent_task_id,
            owner: rec.owner,
            effort_hours: rec.effort_hours,
        }
    }
}
