//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Task | Work item management | `task add`, `task status`, `task subtask` |
//! | Dependencies | Graph edits and repair | `dep add`, `dep rm`, `validate --fix` |
//! | Analysis | Prioritization and scoring | `next`, `complexity`, `report` |
//! | Query | Task state queries | `ready`, `blocked`, `order` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logs on stderr, or set `TASKPILOT_LOG`
//! to any `tracing` filter:
//! ```bash
//! TASKPILOT_LOG=taskpilot=trace taskpilot next
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod analyze;
mod app;
mod dep;
mod output;
mod query;
mod task;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
