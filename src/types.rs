// src/types.rs

//! Small enums shared by the model, the scheduling passes and the CLI.
//!
//! Each enum accepts both its short code (`"FS"`, `"SNET"`, ...) and its
//! long form (`"finish_start"`, `"start_no_earlier_than"`, ...) when
//! deserialized or parsed from the command line, and always writes the short
//! code back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Precedence link semantics between a predecessor and its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkType {
    /// Successor starts after the predecessor finishes.
    #[default]
    #[serde(rename = "FS", alias = "finish_start", alias = "FinishStart")]
    FinishStart,
    /// Successor finishes when the predecessor finishes.
    #[serde(rename = "FF", alias = "finish_finish", alias = "FinishFinish")]
    FinishFinish,
    /// Successor starts when the predecessor starts.
    #[serde(rename = "SS", alias = "start_start", alias = "StartStart")]
    StartStart,
    /// Successor finishes before the predecessor starts.
    #[serde(rename = "SF", alias = "start_finish", alias = "StartFinish")]
    StartFinish,
}

impl LinkType {
    pub fn code(self) -> &'static str {
        match self {
            LinkType::FinishStart => "FS",
            LinkType::FinishFinish => "FF",
            LinkType::StartStart => "SS",
            LinkType::StartFinish => "SF",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fs" | "finish_start" | "finishstart" => Ok(LinkType::FinishStart),
            "ff" | "finish_finish" | "finishfinish" => Ok(LinkType::FinishFinish),
            "ss" | "start_start" | "startstart" => Ok(LinkType::StartStart),
            "sf" | "start_finish" | "startfinish" => Ok(LinkType::StartFinish),
            other => Err(format!(
                "invalid link type: {other} (expected FS, FF, SS or SF)"
            )),
        }
    }
}

/// Which boundary a task's buffer extends when it acts as a predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferPosition {
    Start,
    #[default]
    End,
}

impl FromStr for BufferPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(BufferPosition::Start),
            "end" => Ok(BufferPosition::End),
            other => Err(format!(
                "invalid buffer position: {other} (expected \"start\" or \"end\")"
            )),
        }
    }
}

/// Fixed-date constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConstraintType {
    /// As soon as possible: no fixed date.
    #[default]
    #[serde(rename = "ASAP", alias = "as_soon_as_possible")]
    AsSoonAsPossible,
    #[serde(rename = "SNET", alias = "start_no_earlier_than")]
    StartNoEarlierThan,
    #[serde(rename = "SNLT", alias = "start_no_later_than")]
    StartNoLaterThan,
    #[serde(rename = "MSO", alias = "must_start_on")]
    MustStartOn,
    #[serde(rename = "MFO", alias = "must_finish_on")]
    MustFinishOn,
    #[serde(rename = "FNET", alias = "finish_no_earlier_than")]
    FinishNoEarlierThan,
    #[serde(rename = "FNLT", alias = "finish_no_later_than")]
    FinishNoLaterThan,
}

impl ConstraintType {
    pub fn code(self) -> &'static str {
        match self {
            ConstraintType::AsSoonAsPossible => "ASAP",
            ConstraintType::StartNoEarlierThan => "SNET",
            ConstraintType::StartNoLaterThan => "SNLT",
            ConstraintType::MustStartOn => "MSO",
            ConstraintType::MustFinishOn => "MFO",
            ConstraintType::FinishNoEarlierThan => "FNET",
            ConstraintType::FinishNoLaterThan => "FNLT",
        }
    }

    /// Advisory constraints are reported when breached but never move a task.
    pub fn is_advisory(self) -> bool {
        matches!(
            self,
            ConstraintType::StartNoLaterThan | ConstraintType::FinishNoLaterThan
        )
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ConstraintType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "asap" | "as_soon_as_possible" => Ok(ConstraintType::AsSoonAsPossible),
            "snet" | "start_no_earlier_than" => Ok(ConstraintType::StartNoEarlierThan),
            "snlt" | "start_no_later_than" => Ok(ConstraintType::StartNoLaterThan),
            "mso" | "must_start_on" => Ok(ConstraintType::MustStartOn),
            "mfo" | "must_finish_on" => Ok(ConstraintType::MustFinishOn),
            "fnet" | "finish_no_earlier_than" => Ok(ConstraintType::FinishNoEarlierThan),
            "fnlt" | "finish_no_later_than" => Ok(ConstraintType::FinishNoLaterThan),
            other => Err(format!("invalid constraint type: {other}")),
        }
    }
}
