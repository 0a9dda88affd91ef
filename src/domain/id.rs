//! Task identifiers
//!
//! Tasks are identified by a positive integer that is unique within a scope
//! (one project). IDs display and parse as plain decimal numbers, optionally
//! prefixed with `#` on input (`#12` and `12` name the same task).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid task ID '{0}': expected a positive integer")]
    InvalidTaskId(String),

    #[error("Task ID must be greater than zero")]
    Zero,
}

/// Identifier of a task within its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u32);

impl TaskId {
    /// Creates a task ID from its numeric value
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the numeric value
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns the ID that follows this one, or `None` at `u32::MAX`
    pub fn next(&self) -> Option<TaskId> {
        self.0.checked_add(1).map(TaskId)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate so width and alignment flags apply in tables
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);

        let value: u32 = digits
            .parse()
            .map_err(|_| IdError::InvalidTaskId(s.to_string()))?;

        if value == 0 {
            return Err(IdError::Zero);
        }

        Ok(TaskId(value))
    }
}

impl From<u32> for TaskId {
    fn from(value: u32) -> Self {
        TaskId(value)
    }
}
