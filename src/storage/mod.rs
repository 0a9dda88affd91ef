//! # Storage Layer
//!
//! Persistence for taskpilot projects.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Tasks | JSONL (one JSON per line) | `.taskpilot/tasks.jsonl` |
//! | Config | TOML | `.taskpilot/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlTaskStore`] uses file locking (`fs2`) for concurrent access
//! - All writes are atomic (temp file + rename)
//!
//! ## Key Types
//!
//! - [`TaskStore`] - What the engine needs from persistence
//! - [`Project`] - Entry point for accessing a taskpilot project
//! - [`JsonlTaskStore`] - Read/write tasks as JSONL
//! - [`MemoryTaskStore`] - In-process store for tests and embedding
//! - [`Config`] - Project and global configuration

mod config;
mod jsonl;
mod memory;
mod project;

use std::collections::BTreeMap;

use anyhow::Result;

use crate::domain::{Task, TaskId};

pub use config::{
    Config, ConfigError, GlobalConfig, OutputFormat, ProjectConfig, RepairConfig, ReportConfig,
    SelectionConfig,
};
pub use jsonl::JsonlTaskStore;
pub use memory::MemoryTaskStore;
pub use project::{Project, ProjectError};

/// Task persistence used by the engine
///
/// The engine reads the whole scope on every call and writes back only the
/// tasks whose dependency lists it changed.
pub trait TaskStore {
    /// Reads every task in scope, keyed by id
    fn read_all(&self) -> Result<BTreeMap<TaskId, Task>>;

    /// Inserts or replaces one task
    fn update(&self, task: &Task) -> Result<()> {
        self.update_many(std::slice::from_ref(task))
    }

    /// Inserts or replaces several tasks in one write
    fn update_many(&self, tasks: &[Task]) -> Result<()>;
}
