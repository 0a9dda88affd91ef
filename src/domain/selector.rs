//! Next-task selection
//!
//! Picks the single task to work on next from the pending tasks whose
//! dependencies are all complete. Candidates are ranked by priority, then by
//! a configurable tie-break, then by lowest id.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::graph::DependencyGraph;
use super::id::TaskId;
use super::task::Task;

/// Second ranking key among eligible tasks of equal priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreak {
    /// More open tasks waiting on it first
    #[default]
    MostDependents,

    /// Fewer direct dependencies first
    FewestDependencies,
}

impl TieBreak {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreak::MostDependents => "most-dependents",
            TieBreak::FewestDependencies => "fewest-dependencies",
        }
    }
}

/// Why no task was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoTaskReason {
    /// The scope has no tasks at all
    NoTasks,

    /// Tasks exist but none is pending with complete dependencies
    NoneEligible,
}

/// Result of a next-task selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextTask {
    pub task: Option<Task>,

    pub reasoning: String,

    /// Dependents that become ready once the selected task completes
    pub unblocks: Vec<TaskId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoTaskReason>,
}

struct Candidate<'a> {
    task: &'a Task,
    waiting_dependents: usize,
    dependency_count: usize,
}

/// Selects the next task to work on
#[derive(Debug, Clone, Copy, Default)]
pub struct NextTaskSelector {
    tie_break: TieBreak,
}

impl NextTaskSelector {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    /// Pending tasks whose dependencies all resolve to completed tasks
    ///
    /// Tasks owning an invalid edge (dangling, self, duplicate, or part of a
    /// cycle) are never eligible.
    pub fn eligible<'a>(
        &self,
        tasks: &'a BTreeMap<TaskId, Task>,
        graph: &DependencyGraph,
    ) -> Vec<&'a Task> {
        let invalid = graph.tasks_with_invalid_edges();
        tasks
            .values()
            .filter(|task| is_eligible(task, tasks, &invalid))
            .collect()
    }

    /// Picks one task, or explains why there is none
    pub fn select(&self, tasks: &BTreeMap<TaskId, Task>, graph: &DependencyGraph) -> NextTask {
        if tasks.is_empty() {
            return NextTask {
                task: None,
                reasoning: "No tasks found".to_string(),
                unblocks: Vec::new(),
                reason: Some(NoTaskReason::NoTasks),
            };
        }

        let eligible = self.eligible(tasks, graph);
        let eligible_count = eligible.len();

        let best = eligible
            .into_iter()
            .map(|task| Candidate {
                task,
                waiting_dependents: waiting_dependents(task.id, tasks, graph).len(),
                dependency_count: task.dependencies.len(),
            })
            .min_by(|a, b| {
                b.task
                    .priority
                    .cmp(&a.task.priority)
                    .then_with(|| match self.tie_break {
                        TieBreak::MostDependents => b.waiting_dependents.cmp(&a.waiting_dependents),
                        TieBreak::FewestDependencies => a.dependency_count.cmp(&b.dependency_count),
                    })
                    .then_with(|| a.task.id.cmp(&b.task.id))
            });

        let Some(best) = best else {
            return NextTask {
                task: None,
                reasoning: describe_no_eligible(tasks),
                unblocks: Vec::new(),
                reason: Some(NoTaskReason::NoneEligible),
            };
        };

        let unblocks = newly_unblocked(best.task.id, tasks, graph);
        let reasoning = describe_choice(best.task, best.dependency_count, unblocks.len(), eligible_count);

        tracing::debug!(
            task = %best.task.id,
            priority = %best.task.priority,
            eligible = eligible_count,
            unblocks = unblocks.len(),
            "selected next task"
        );

        NextTask {
            task: Some(best.task.clone()),
            reasoning,
            unblocks,
            reason: None,
        }
    }
}

fn is_complete(id: &TaskId, tasks: &BTreeMap<TaskId, Task>) -> bool {
    tasks
        .get(id)
        .map(|task| task.status.is_complete())
        .unwrap_or(false)
}

fn is_eligible(task: &Task, tasks: &BTreeMap<TaskId, Task>, invalid: &BTreeSet<TaskId>) -> bool {
    task.status.is_pending()
        && !invalid.contains(&task.id)
        && task.dependencies.iter().all(|dep| is_complete(dep, tasks))
}

/// Dependents that are neither complete nor cancelled
fn waiting_dependents(
    task_id: TaskId,
    tasks: &BTreeMap<TaskId, Task>,
    graph: &DependencyGraph,
) -> Vec<TaskId> {
    graph
        .dependents(task_id)
        .into_iter()
        .filter(|dep| {
            tasks
                .get(dep)
                .map(|t| !t.status.is_closed())
                .unwrap_or(false)
        })
        .collect()
}

/// Waiting dependents whose only incomplete dependency is `task_id`
fn newly_unblocked(
    task_id: TaskId,
    tasks: &BTreeMap<TaskId, Task>,
    graph: &DependencyGraph,
) -> Vec<TaskId> {
    waiting_dependents(task_id, tasks, graph)
        .into_iter()
        .filter(|dep| {
            tasks.get(dep).is_some_and(|dependent| {
                dependent
                    .dependencies
                    .iter()
                    .filter(|d| **d != task_id)
                    .all(|d| is_complete(d, tasks))
            })
        })
        .collect()
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

fn describe_choice(task: &Task, dependency_count: usize, unblocks: usize, eligible: usize) -> String {
    let dependencies = if dependency_count == 0 {
        "it has no dependencies".to_string()
    } else {
        format!(
            "all {} complete",
            plural(dependency_count, "dependency is", "dependencies are")
        )
    };

    format!(
        "Task {} has {} priority and {}; completing it unblocks {} (chosen from {})",
        task.id,
        task.priority,
        dependencies,
        plural(unblocks, "dependent task", "dependent tasks"),
        plural(eligible, "eligible task", "eligible tasks"),
    )
}

fn describe_no_eligible(tasks: &BTreeMap<TaskId, Task>) -> String {
    let mut waiting = 0;
    let mut active = 0;
    let mut finished = 0;
    let mut held = 0;

    for task in tasks.values() {
        let status = task.status;
        if status.is_pending() {
            waiting += 1;
        } else if status.is_active() {
            active += 1;
        } else if status.is_closed() {
            finished += 1;
        } else {
            held += 1;
        }
    }

    format!(
        "No eligible tasks among {}: {} waiting on dependencies, {} in progress, {} done or cancelled, {} blocked or deferred",
        plural(tasks.len(), "task", "tasks"),
        waiting,
        active,
        finished,
        held
    )
}
