// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Only conditions that block an operation outright live here. Per-task
//! problems found during a run (missing predecessors, advisory constraint
//! breaches, ...) are reported as [`crate::schedule::Anomaly`] values and
//! never abort the run.

use thiserror::Error;

use crate::model::TaskId;

#[derive(Error, Debug)]
pub enum CascadeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task already exists: {0}")]
    DuplicateTask(TaskId),

    #[error("Cycle detected in dependencies: {}", chain.join(" -> "))]
    CycleDetected { chain: Vec<TaskId> },

    #[error("Task '{task}' cannot be placed under '{parent}': it would become its own ancestor")]
    HierarchyCycle { task: TaskId, parent: TaskId },

    #[error("Task store error: {0}")]
    StoreError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Schedule engine for project '{0}' has stopped")]
    EngineStopped(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CascadeError {
    /// The offending id chain when this is a [`CascadeError::CycleDetected`].
    pub fn cycle_chain(&self) -> Option<&[TaskId]> {
        match self {
            CascadeError::CycleDetected { chain } => Some(chain),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, CascadeError>;
