//! Task domain model
//!
//! Tasks are the units of work the engine reasons about. They are created and
//! deleted by the task store; the engine only reads their attributes and
//! proposes changes to their dependency lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::TaskId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown status '{0}' (expected one of: pending, in-progress, done, completed, blocked, review, deferred, cancelled)")]
    Status(String),

    #[error("Unknown priority '{0}' (expected one of: low, medium, high, critical)")]
    Priority(String),
}

/// Status of a task
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Completed,
    Blocked,
    Review,
    Deferred,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Completed,
        TaskStatus::Blocked,
        TaskStatus::Review,
        TaskStatus::Deferred,
        TaskStatus::Cancelled,
    ];

    /// Returns true if this status satisfies dependents (`done` or `completed`)
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Completed)
    }

    /// Returns true if this task is waiting to be started
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    /// Returns true if this task is currently being worked on
    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::InProgress | TaskStatus::Review)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskStatus::Cancelled)
    }

    /// Returns true if the task will never need doing again
    pub fn is_closed(&self) -> bool {
        self.is_complete() || self.is_cancelled()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Completed => "completed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Review => "review",
            TaskStatus::Deferred => "deferred",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| ParseError::Status(s.to_string()))
    }
}

/// Priority of a task, ordered from lowest to highest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Critical,
    ];

    /// Returns true for `high` and `critical`
    pub fn is_elevated(&self) -> bool {
        matches!(self, Priority::High | Priority::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == normalized)
            .ok_or_else(|| ParseError::Priority(s.to_string()))
    }
}

/// A subtask owned by a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Sequence number within the parent task
    pub id: u32,

    pub title: String,

    #[serde(default)]
    pub status: TaskStatus,
}

/// A task within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier within the project
    pub id: TaskId,

    /// Human-readable title
    pub title: String,

    /// Current status
    #[serde(default)]
    pub status: TaskStatus,

    #[serde(default)]
    pub priority: Priority,

    /// IDs of tasks that must complete before this one can start
    ///
    /// Kept as a list rather than a set so that corrupted data (duplicates,
    /// self references) survives loading and can be reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<TaskId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<Subtask>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Implementation notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new pending task with the given ID and title
    pub fn new(id: TaskId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: title.into(),
            status: TaskStatus::Pending,
            priority: Priority::default(),
            dependencies: Vec::new(),
            subtasks: Vec::new(),
            description: None,
            details: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the priority (builder style)
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the status (builder style)
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a dependency without validation (builder style)
    pub fn with_dependency(mut self, depends_on: TaskId) -> Self {
        self.dependencies.push(depends_on);
        self
    }

    /// Sets the description (builder style)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Number of owned subtasks
    pub fn subtask_count(&self) -> usize {
        self.subtasks.len()
    }

    /// Number of dependency entries as stored
    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Combined length of description and details, in characters
    pub fn description_length(&self) -> usize {
        let description = self.description.as_deref().map_or(0, |d| d.chars().count());
        let details = self.details.as_deref().map_or(0, |d| d.chars().count());
        description + details
    }

    /// Returns true if this task has no incomplete or unknown dependencies
    pub fn is_ready(&self, task_statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        if self.status.is_closed() {
            return false;
        }

        self.dependencies.iter().all(|dep_id| {
            task_statuses
                .get(dep_id)
                .map(|s| s.is_complete())
                .unwrap_or(false)
        })
    }

    /// Returns true if this task is waiting on incomplete or unknown dependencies
    pub fn is_blocked(&self, task_statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        if self.status.is_closed() {
            return false;
        }

        self.dependencies.iter().any(|dep_id| {
            task_statuses
                .get(dep_id)
                .map(|s| !s.is_complete())
                .unwrap_or(true) // Unknown dependency = blocked
        })
    }

    /// Sets the status
    pub fn set_status(&mut self, status: TaskStatus) {
        if self.status != status {
            self.status = status;
            self.updated_at = Utc::now();
        }
    }

    /// Appends a dependency if not already present
    pub fn add_dependency(&mut self, depends_on: TaskId) -> bool {
        if self.dependencies.contains(&depends_on) {
            return false;
        }
        self.dependencies.push(depends_on);
        self.updated_at = Utc::now();
        true
    }

    /// Removes every occurrence of a dependency
    pub fn remove_dependency(&mut self, depends_on: &TaskId) -> bool {
        let len_before = self.dependencies.len();
        self.dependencies.retain(|d| d != depends_on);
        let removed = self.dependencies.len() != len_before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Removes one surplus copy of a dependency, keeping the first occurrence
    pub fn remove_duplicate_dependency(&mut self, depends_on: &TaskId) -> bool {
        let Some(pos) = self
            .dependencies
            .iter()
            .enumerate()
            .filter(|(_, d)| *d == depends_on)
            .map(|(i, _)| i)
            .nth(1)
        else {
            return false;
        };

        self.dependencies.remove(pos);
        self.updated_at = Utc::now();
        true
    }

    /// Appends a subtask with the next free sequence number
    pub fn add_subtask(&mut self, title: impl Into<String>) -> &Subtask {
        let id = self.subtasks.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.subtasks.push(Subtask {
            id,
            title: title.into(),
            status: TaskStatus::Pending,
        });
        self.updated_at = Utc::now();
        &self.subtasks[self.subtasks.len() - 1]
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
        self.updated_at = Utc::now();
    }

    pub fn set_details(&mut self, details: impl Into<String>) {
        self.details = Some(details.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: u32) -> Task {
        Task::new(TaskId::new(id), format!("Task {}", id))
    }

    #[test]
    fn new_task_is_pending_medium() {
        let task = make_task(1);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.status.is_pending());
    }

    #[test]
    fn done_and_completed_are_both_complete() {
        assert!(TaskStatus::Done.is_complete());
        assert!(TaskStatus::Completed.is_complete());
        assert!(!TaskStatus::Review.is_complete());
        assert!(!TaskStatus::Cancelled.is_complete());
        assert!(TaskStatus::Cancelled.is_closed());
    }

    #[test]
    fn status_parses_with_separators() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("DONE".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert!("finished".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
        assert!(Priority::High.is_elevated());
        assert!(Priority::Critical.is_elevated());
        assert!(!Priority::Medium.is_elevated());
    }

    #[test]
    fn priority_parses() {
        assert_eq!("Critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!(matches!("urgent".parse::<Priority>(), Err(ParseError::Priority(_))));
    }

    #[test]
    fn task_dependencies() {
        let task1 = make_task(1);
        let task2 = make_task(2);
        let mut task3 = make_task(3);

        task3.add_dependency(task1.id);
        task3.add_dependency(task2.id);

        let mut statuses = HashMap::new();
        statuses.insert(task1.id, TaskStatus::Pending);
        statuses.insert(task2.id, TaskStatus::Pending);

        assert!(task3.is_blocked(&statuses));
        assert!(!task3.is_ready(&statuses));

        statuses.insert(task1.id, TaskStatus::Done);
        assert!(task3.is_blocked(&statuses));

        statuses.insert(task2.id, TaskStatus::Completed);
        assert!(task3.is_ready(&statuses));
        assert!(!task3.is_blocked(&statuses));
    }

    #[test]
    fn unknown_dependency_blocks() {
        let task = make_task(1).with_dependency(TaskId::new(99));
        let statuses = HashMap::new();

        assert!(task.is_blocked(&statuses));
        assert!(!task.is_ready(&statuses));
    }

    #[test]
    fn closed_task_is_neither_ready_nor_blocked() {
        let task = make_task(1).with_status(TaskStatus::Cancelled);
        let statuses = HashMap::new();

        assert!(!task.is_ready(&statuses));
        assert!(!task.is_blocked(&statuses));
    }

    #[test]
    fn add_dependency_ignores_existing() {
        let mut task = make_task(2);
        assert!(task.add_dependency(TaskId::new(1)));
        assert!(!task.add_dependency(TaskId::new(1)));
        assert_eq!(task.dependencies, vec![TaskId::new(1)]);
    }

    #[test]
    fn remove_dependency_removes_all_copies() {
        let mut task = make_task(3)
            .with_dependency(TaskId::new(1))
            .with_dependency(TaskId::new(2))
            .with_dependency(TaskId::new(1));

        assert!(task.remove_dependency(&TaskId::new(1)));
        assert_eq!(task.dependencies, vec![TaskId::new(2)]);
        assert!(!task.remove_dependency(&TaskId::new(1)));
    }

    #[test]
    fn remove_duplicate_keeps_first_occurrence() {
        let mut task = make_task(4)
            .with_dependency(TaskId::new(1))
            .with_dependency(TaskId::new(2))
            .with_dependency(TaskId::new(1))
            .with_dependency(TaskId::new(1));

        assert!(task.remove_duplicate_dependency(&TaskId::new(1)));
        assert_eq!(
            task.dependencies,
            vec![TaskId::new(1), TaskId::new(2), TaskId::new(1)]
        );
        assert!(task.remove_duplicate_dependency(&TaskId::new(1)));
        assert!(!task.remove_duplicate_dependency(&TaskId::new(1)));
        assert_eq!(task.dependencies, vec![TaskId::new(1), TaskId::new(2)]);
    }

    #[test]
    fn description_length_counts_both_fields() {
        let mut task = make_task(1);
        assert_eq!(task.description_length(), 0);

        task.set_description("abcde");
        task.set_details("héllo");
        assert_eq!(task.description_length(), 10);
    }

    #[test]
    fn subtasks_get_sequential_ids() {
        let mut task = make_task(1);
        task.add_subtask("one");
        let second = task.add_subtask("two").id;

        assert_eq!(second, 2);
        assert_eq!(task.subtask_count(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let mut task = make_task(2)
            .with_priority(Priority::High)
            .with_dependency(TaskId::new(1));
        task.set_description("A test task");
        task.add_subtask("step");

        let json = serde_json::to_string(&task).unwrap();
        let parsed: Task = serde_json::from_str(&json).unwrap();

        assert_eq!(task, parsed);
    }

    #[test]
    fn minimal_record_deserializes_with_defaults() {
        let json = r#"{"id":5,"title":"Imported","created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.id, TaskId::new(5));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.dependencies.is_empty());
    }
}
