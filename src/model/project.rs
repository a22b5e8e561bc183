// src/model/project.rs

use serde::{Deserialize, Serialize};

use crate::calendar::Calendar;
use crate::model::task::Task;

/// Read-only snapshot of one project as held by the task store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project: String,
    /// Whether Saturdays and Sundays count as schedulable days.
    #[serde(default)]
    pub include_weekends: bool,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ProjectSnapshot {
    pub fn new(project: impl Into<String>, include_weekends: bool) -> Self {
        Self {
            project: project.into(),
            include_weekends,
            tasks: Vec::new(),
        }
    }

    /// The calendar every computation of a run over this snapshot must use.
    pub fn calendar(&self) -> Calendar {
        Calendar::new(self.include_weekends)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }
}
