//! taskpilot - dependency-aware task prioritization
//!
//! Validates and repairs the dependency graph between tasks, picks the next
//! task to work on, and scores task complexity. Tasks live in a JSONL file
//! under `.taskpilot/`; the [`engine::Engine`] works over any
//! [`storage::TaskStore`].

pub mod cli;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod storage;

pub use domain::{DependencyGraph, GraphError, Task, TaskId, TaskStatus};
pub use engine::{Engine, EngineError};
