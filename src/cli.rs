// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::engine::{NewTask, TaskEdit};
use crate::model::{Constraint, Dependency, TaskId};
use crate::types::{BufferPosition, ConstraintType, LinkType};

/// Command-line arguments for `taskcascade`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskcascade",
    version,
    about = "Dependency-driven task scheduling: reconcile, cascade and analyse project plans.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Taskcascade.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the project files. Overrides `[store].dir`.
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Project to operate on.
    #[arg(long, short, value_name = "NAME")]
    pub project: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKCASCADE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an empty project file.
    Init {
        /// Count Saturdays and Sundays as working days.
        #[arg(long)]
        include_weekends: bool,
    },
    /// Print the stored project.
    Show,
    /// Reconcile in memory and print the result without writing anything.
    Reconcile,
    /// Reconcile, resolve exclusions, cascade and persist changed dates.
    Refresh,
    /// Create a task.
    Add(AddArgs),
    /// Edit a task and cascade the change.
    Edit(EditArgs),
    /// Remove a task and all of its descendants.
    Remove {
        id: TaskId,
    },
    /// Print float per task and the critical set.
    CriticalPath,
    /// Print advisory leveling proposals.
    Level,
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    pub id: TaskId,

    #[arg(long, default_value = "")]
    pub name: String,

    /// First day of the task. Defaults to today.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    #[arg(long, value_name = "ID")]
    pub parent: Option<TaskId>,

    /// Predecessor as `ID` or `ID:LINK` (LINK one of FS, FF, SS, SF).
    #[arg(long = "after", value_name = "ID[:LINK]", value_parser = parse_dependency)]
    pub after: Vec<Dependency>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long, value_name = "HOURS")]
    pub effort: Option<f64>,
}

impl AddArgs {
    pub fn into_new_task(self) -> NewTask {
        NewTask {
            id: self.id,
            name: self.name,
            start: self.start,
            parent_task_id: self.parent,
            dependencies: self.after,
            owner: self.owner,
            effort_hours: self.effort,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    pub id: TaskId,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start: Option<NaiveDate>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end: Option<NaiveDate>,

    /// Replace the predecessor set. Repeat for several predecessors.
    #[arg(long = "after", value_name = "ID[:LINK]", value_parser = parse_dependency)]
    pub after: Vec<Dependency>,

    /// Remove every predecessor.
    #[arg(long, conflicts_with = "after")]
    pub clear_deps: bool,

    #[arg(long, value_name = "DAYS")]
    pub buffer: Option<u32>,

    #[arg(long, value_name = "start|end")]
    pub buffer_position: Option<BufferPosition>,

    /// `ASAP`, or `KIND:YYYY-MM-DD` with KIND one of SNET, SNLT, MSO, MFO,
    /// FNET, FNLT.
    #[arg(long, value_parser = parse_constraint)]
    pub constraint: Option<Constraint>,

    /// Replace the exclusion set. Repeat for several peers.
    #[arg(long = "exclusive", value_name = "ID")]
    pub exclusive: Vec<TaskId>,

    #[arg(long, conflicts_with = "exclusive")]
    pub clear_exclusions: bool,

    #[arg(long, value_name = "ID")]
    pub parent: Option<TaskId>,

    #[arg(long, conflicts_with = "parent")]
    pub no_parent: bool,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long, conflicts_with = "owner")]
    pub no_owner: bool,

    #[arg(long, value_name = "HOURS")]
    pub effort: Option<f64>,
}

impl EditArgs {
    pub fn to_edit(&self) -> TaskEdit {
        let mut edit = TaskEdit {
            name: self.name.clone(),
            start_date: self.start,
            end_date: self.end,
            buffer_days: self.buffer,
            buffer_position: self.buffer_position,
            constraint: self.constraint,
            effort_hours: self.effort.map(Some),
            ..TaskEdit::default()
        };
        if !self.after.is_empty() || self.clear_deps {
            edit.dependencies = Some(self.after.clone());
        }
        if !self.exclusive.is_empty() || self.clear_exclusions {
            edit.exclusion_links = Some(self.exclusive.iter().cloned().collect());
        }
        if self.no_parent {
            edit.parent_task_id = Some(None);
        } else if let Some(parent) = &self.parent {
            edit.parent_task_id = Some(Some(parent.clone()));
        }
        if self.no_owner {
            edit.owner = Some(None);
        } else if let Some(owner) = &self.owner {
            edit.owner = Some(Some(owner.clone()));
        }
        edit
    }
}

/// `ID` (finish-to-start) or `ID:LINK`.
pub fn parse_dependency(s: &str) -> Result<Dependency, String> {
    let (id, link) = match s.split_once(':') {
        Some((id, link)) => (id, link.parse::<LinkType>()?),
        None => (s, LinkType::FinishStart),
    };
    if id.trim().is_empty() {
        return Err(format!("missing predecessor id in {s:?}"));
    }
    Ok(Dependency::new(id.trim(), link))
}

/// `ASAP` or `KIND:YYYY-MM-DD`.
pub fn parse_constraint(s: &str) -> Result<Constraint, String> {
    let Some((kind, date)) = s.split_once(':') else {
        return match s.parse::<ConstraintType>()? {
            ConstraintType::AsSoonAsPossible => Ok(Constraint::asap()),
            other => Err(format!("constraint {other} needs a date, e.g. {other}:2024-06-03")),
        };
    };
    let kind = kind.parse::<ConstraintType>()?;
    let date = date
        .trim()
        .parse::<NaiveDate>()
        .map_err(|e| format!("invalid constraint date {date:?}: {e}"))?;
    Ok(Constraint::new(kind, date))
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
