//! Domain models for taskpilot
//!
//! Contains the dependency graph, next-task selection and complexity scoring
//! without any I/O concerns.

mod complexity;
mod graph;
mod id;
mod repair;
mod report;
mod selector;
mod task;

pub use complexity::{assess, ComplexityAssessment, ComplexityFactors};
pub use graph::{format_path, DependencyEdge, DependencyGraph, GraphError, Issue, IssueKind};
pub use id::{IdError, TaskId};
pub use repair::{cycle_edges, CycleBreakPolicy, CycleBreaker, RemovedEdge};
pub use report::{ComplexityDistribution, ComplexityReport, ComplexitySummary, ReportFilter};
pub use selector::{NextTask, NextTaskSelector, NoTaskReason, TieBreak};
pub use task::{ParseError, Priority, Subtask, Task, TaskStatus};
