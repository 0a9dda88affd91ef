//! # Engine
//!
//! The operations callers use: dependency mutation, validation and repair,
//! next-task selection and complexity analysis.
//!
//! Every call reads the current task set from a [`TaskStore`], builds a fresh
//! [`DependencyGraph`], and writes back only the tasks whose dependency lists
//! changed. Nothing is cached between calls.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;

use crate::domain::{
    assess, ComplexityAssessment, ComplexityReport, CycleBreakPolicy, CycleBreaker,
    DependencyGraph, GraphError, Issue, IssueKind, NextTask, NextTaskSelector, RemovedEdge,
    ReportFilter, Task, TaskId, TaskStatus, TieBreak,
};
use crate::storage::{ProjectConfig, TaskStore};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Outcome of `validate_dependencies`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<Issue>,

    /// Edges removed by auto-fix; absent when fixing was not requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_issues: Option<Vec<RemovedEdge>>,
}

/// Dependency engine over a task store
pub struct Engine<S: TaskStore> {
    store: S,
    selector: NextTaskSelector,
    breaker: Box<dyn CycleBreaker>,
}

impl<S: TaskStore> Engine<S> {
    /// Creates an engine with the default policies
    pub fn new(store: S) -> Self {
        Self {
            store,
            selector: NextTaskSelector::default(),
            breaker: Box::new(CycleBreakPolicy::default()),
        }
    }

    /// Creates an engine with the policies named in a project config
    pub fn with_config(store: S, config: &ProjectConfig) -> Self {
        Self::new(store)
            .with_tie_break(config.selection.tie_break)
            .with_cycle_breaker(config.repair.cycle_breaker)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.selector = NextTaskSelector::new(tie_break);
        self
    }

    pub fn with_cycle_breaker(mut self, breaker: impl CycleBreaker + 'static) -> Self {
        self.breaker = Box::new(breaker);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load(&self) -> EngineResult<(BTreeMap<TaskId, Task>, DependencyGraph)> {
        let tasks = self.store.read_all()?;
        let graph = DependencyGraph::from_tasks(tasks.values());
        Ok((tasks, graph))
    }

    /// Makes `task` depend on `depends_on`
    ///
    /// Rejected edges leave the store untouched.
    pub fn add_dependency(&self, task: TaskId, depends_on: TaskId) -> EngineResult<Task> {
        let (mut tasks, mut graph) = self.load()?;

        graph.add_dependency(task, depends_on)?;

        let record = tasks
            .get_mut(&task)
            .ok_or(GraphError::TaskNotFound(task))?;
        record.add_dependency(depends_on);
        self.store.update(record)?;

        tracing::info!(%task, %depends_on, "added dependency");
        Ok(record.clone())
    }

    /// Removes every copy of the edge `task -> depends_on`
    pub fn remove_dependency(&self, task: TaskId, depends_on: TaskId) -> EngineResult<Task> {
        let (mut tasks, mut graph) = self.load()?;

        graph.remove_dependency(task, depends_on)?;

        let record = tasks
            .get_mut(&task)
            .ok_or(GraphError::TaskNotFound(task))?;
        record.remove_dependency(&depends_on);
        self.store.update(record)?;

        tracing::info!(%task, %depends_on, "removed dependency");
        Ok(record.clone())
    }

    /// Reports every dependency defect; with `auto_fix`, removes the
    /// offending edges and persists the result
    ///
    /// `issues` always describes the state before fixing.
    pub fn validate_dependencies(&self, auto_fix: bool) -> EngineResult<ValidationReport> {
        let (mut tasks, mut graph) = self.load()?;
        let issues = graph.validate();

        for issue in &issues {
            tracing::warn!(kind = issue.kind().label(), "{}", issue);
        }

        if !auto_fix {
            return Ok(ValidationReport {
                valid: issues.is_empty(),
                issues,
                fixed_issues: None,
            });
        }

        let removed = graph.fix(&issues, self.breaker.as_ref());
        let changed = apply_removals(&mut tasks, &removed);

        if !changed.is_empty() {
            let updated: Vec<Task> = changed
                .iter()
                .filter_map(|id| tasks.get(id).cloned())
                .collect();
            self.store.update_many(&updated)?;
        }

        for edge in &removed {
            tracing::info!(task = %edge.task, depends_on = %edge.depends_on, reason = edge.reason.label(), "removed invalid dependency");
        }

        Ok(ValidationReport {
            valid: issues.is_empty(),
            issues,
            fixed_issues: Some(removed),
        })
    }

    /// Picks the next task to work on
    pub fn next_task(&self) -> EngineResult<NextTask> {
        let (tasks, graph) = self.load()?;
        Ok(self.selector.select(&tasks, &graph))
    }

    /// Scores one task
    pub fn analyze_complexity(&self, task_id: TaskId) -> EngineResult<ComplexityAssessment> {
        let tasks = self.store.read_all()?;
        let task = tasks
            .get(&task_id)
            .ok_or(GraphError::TaskNotFound(task_id))?;
        Ok(assess(task))
    }

    /// Scores every task the filter admits
    pub fn complexity_report(&self, filter: &ReportFilter) -> EngineResult<ComplexityReport> {
        let tasks = self.store.read_all()?;
        Ok(ComplexityReport::build(tasks.values(), filter))
    }

    /// All tasks with dependencies before dependents
    pub fn topological_order(&self) -> EngineResult<Vec<Task>> {
        let (tasks, graph) = self.load()?;
        let order = graph.topological_order()?;
        Ok(lookup(&tasks, order))
    }

    /// Open tasks whose dependencies are all complete
    pub fn ready_tasks(&self) -> EngineResult<Vec<Task>> {
        let (tasks, graph) = self.load()?;
        let ready = graph.ready_tasks(&statuses(&tasks));
        Ok(lookup(&tasks, ready))
    }

    /// Open tasks waiting on an incomplete or missing dependency
    pub fn blocked_tasks(&self) -> EngineResult<Vec<Task>> {
        let (tasks, graph) = self.load()?;
        let blocked = graph.blocked_tasks(&statuses(&tasks));
        Ok(lookup(&tasks, blocked))
    }
}

fn statuses(tasks: &BTreeMap<TaskId, Task>) -> HashMap<TaskId, TaskStatus> {
    tasks.iter().map(|(id, task)| (*id, task.status)).collect()
}

fn lookup(tasks: &BTreeMap<TaskId, Task>, ids: Vec<TaskId>) -> Vec<Task> {
    ids.into_iter()
        .filter_map(|id| tasks.get(&id).cloned())
        .collect()
}

/// Mirrors graph removals onto the task records; returns the touched ids
fn apply_removals(tasks: &mut BTreeMap<TaskId, Task>, removed: &[RemovedEdge]) -> BTreeSet<TaskId> {
    let mut changed = BTreeSet::new();

    for edge in removed {
        let Some(task) = tasks.get_mut(&edge.task) else {
            continue;
        };

        let touched = match edge.reason {
            IssueKind::DuplicateEdge => task.remove_duplicate_dependency(&edge.depends_on),
            _ => task.remove_dependency(&edge.depends_on),
        };

        if touched {
            changed.insert(edge.task);
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DependencyEdge, NoTaskReason, Priority};
    use crate::storage::MemoryTaskStore;

    fn id(n: u32) -> TaskId {
        TaskId::new(n)
    }

    fn task(n: u32, deps: &[u32]) -> Task {
        let mut task = Task::new(id(n), format!("Task {}", n));
        task.dependencies = deps.iter().map(|d| id(*d)).collect();
        task
    }

    fn engine(tasks: Vec<Task>) -> Engine<MemoryTaskStore> {
        Engine::new(MemoryTaskStore::with_tasks(tasks))
    }

    fn deps_of(engine: &Engine<MemoryTaskStore>, n: u32) -> Vec<TaskId> {
        engine.store().get(id(n)).unwrap().dependencies
    }

    #[test]
    fn add_dependency_persists_edge() {
        let engine = engine(vec![task(1, &[]), task(2, &[])]);

        let updated = engine.add_dependency(id(2), id(1)).unwrap();

        assert_eq!(updated.dependencies, vec![id(1)]);
        assert_eq!(deps_of(&engine, 2), vec![id(1)]);
    }

    #[test]
    fn cycle_is_rejected_with_path_and_store_unchanged() {
        let engine = engine(vec![task(1, &[]), task(2, &[1]), task(3, &[2])]);

        let err = engine.add_dependency(id(1), id(3)).unwrap_err();

        match err {
            EngineError::Graph(GraphError::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec![id(1), id(3), id(2), id(1)]);
            }
            other => panic!("expected circular dependency, got {:?}", other),
        }
        assert!(deps_of(&engine, 1).is_empty());
    }

    #[test]
    fn add_dependency_error_kinds() {
        let engine = engine(vec![task(1, &[]), task(2, &[1])]);

        assert!(matches!(
            engine.add_dependency(id(9), id(1)),
            Err(EngineError::Graph(GraphError::TaskNotFound(t))) if t == id(9)
        ));
        assert!(matches!(
            engine.add_dependency(id(1), id(9)),
            Err(EngineError::Graph(GraphError::TaskNotFound(t))) if t == id(9)
        ));
        assert!(matches!(
            engine.add_dependency(id(1), id(1)),
            Err(EngineError::Graph(GraphError::SelfDependency(t))) if t == id(1)
        ));
        assert!(matches!(
            engine.add_dependency(id(2), id(1)),
            Err(EngineError::Graph(GraphError::DependencyExists { .. }))
        ));
    }

    #[test]
    fn remove_dependency_removes_all_copies() {
        let engine = engine(vec![task(1, &[]), task(2, &[1, 1])]);

        let updated = engine.remove_dependency(id(2), id(1)).unwrap();

        assert!(updated.dependencies.is_empty());
        assert!(deps_of(&engine, 2).is_empty());
    }

    #[test]
    fn remove_missing_dependency_fails() {
        let engine = engine(vec![task(1, &[]), task(2, &[])]);

        assert!(matches!(
            engine.remove_dependency(id(2), id(1)),
            Err(EngineError::Graph(GraphError::DependencyNotFound { .. }))
        ));
        assert!(matches!(
            engine.remove_dependency(id(7), id(1)),
            Err(EngineError::Graph(GraphError::TaskNotFound(_)))
        ));
    }

    #[test]
    fn remove_dangling_dependency() {
        let engine = engine(vec![task(1, &[42])]);

        engine.remove_dependency(id(1), id(42)).unwrap();
        assert!(deps_of(&engine, 1).is_empty());
    }

    #[test]
    fn validate_without_fix_changes_nothing() {
        let engine = engine(vec![task(1, &[2]), task(2, &[1])]);

        let report = engine.validate_dependencies(false).unwrap();

        assert!(!report.valid);
        assert_eq!(report.issues.len(), 1);
        assert!(report.fixed_issues.is_none());
        assert_eq!(deps_of(&engine, 1), vec![id(2)]);
    }

    #[test]
    fn validate_fix_repairs_dangling_edge_and_cycle() {
        let engine = engine(vec![
            task(1, &[2]),
            task(2, &[3]),
            task(3, &[1]),
            task(4, &[99]),
        ]);

        let report = engine.validate_dependencies(true).unwrap();
        assert!(!report.valid);
        assert_eq!(report.issues.len(), 2);

        let fixed = report.fixed_issues.unwrap();
        assert_eq!(fixed.len(), 2);
        assert_eq!(fixed[0].edge(), DependencyEdge::new(id(4), id(99)));
        assert_eq!(fixed[0].reason, IssueKind::DanglingReference);
        assert_eq!(fixed[1].reason, IssueKind::CyclicDependency);

        let again = engine.validate_dependencies(false).unwrap();
        assert!(again.valid);
        assert!(again.issues.is_empty());
    }

    #[test]
    fn fix_keeps_first_duplicate_occurrence() {
        let engine = engine(vec![task(1, &[]), task(2, &[]), task(3, &[1, 2, 1])]);

        let report = engine.validate_dependencies(true).unwrap();

        assert_eq!(report.fixed_issues.unwrap().len(), 1);
        assert_eq!(deps_of(&engine, 3), vec![id(1), id(2)]);
    }

    #[test]
    fn fix_on_valid_graph_removes_nothing() {
        let engine = engine(vec![task(1, &[]), task(2, &[1])]);

        let report = engine.validate_dependencies(true).unwrap();

        assert!(report.valid);
        assert_eq!(report.fixed_issues, Some(Vec::new()));
    }

    #[test]
    fn closing_edge_breaker_is_honoured() {
        let engine = engine(vec![task(1, &[2]), task(2, &[3]), task(3, &[1]), task(4, &[2])])
            .with_cycle_breaker(CycleBreakPolicy::ClosingEdge);

        let fixed = engine.validate_dependencies(true).unwrap().fixed_issues.unwrap();

        assert_eq!(fixed.len(), 1);
        assert_eq!(fixed[0].edge(), DependencyEdge::new(id(3), id(1)));
        assert_eq!(deps_of(&engine, 3), Vec::<TaskId>::new());
    }

    #[test]
    fn next_task_picks_ready_pending_work() {
        let engine = engine(vec![
            task(1, &[]).with_status(TaskStatus::Done),
            task(2, &[1]).with_priority(Priority::High),
            task(3, &[2]),
        ]);

        let next = engine.next_task().unwrap();

        assert_eq!(next.task.map(|t| t.id), Some(id(2)));
        assert_eq!(next.unblocks, vec![id(3)]);
    }

    #[test]
    fn next_task_on_empty_store() {
        let next = engine(vec![]).next_task().unwrap();
        assert_eq!(next.reason, Some(NoTaskReason::NoTasks));
    }

    #[test]
    fn analyze_complexity_of_unknown_task_fails() {
        let engine = engine(vec![task(1, &[])]);

        assert_eq!(engine.analyze_complexity(id(1)).unwrap().score, 2.5);
        assert!(matches!(
            engine.analyze_complexity(id(5)),
            Err(EngineError::Graph(GraphError::TaskNotFound(t))) if t == id(5)
        ));
    }

    #[test]
    fn complexity_report_covers_store() {
        let engine = engine(vec![task(2, &[]), task(1, &[])]);

        let report = engine.complexity_report(&ReportFilter::default()).unwrap();

        assert_eq!(report.summary.total_tasks, 2);
        assert_eq!(report.tasks[0].task_id, id(1));
    }

    #[test]
    fn queries_follow_statuses() {
        let engine = engine(vec![
            task(1, &[]).with_status(TaskStatus::Done),
            task(2, &[1]),
            task(3, &[2]),
            task(4, &[50]),
        ]);

        let ready: Vec<TaskId> = engine.ready_tasks().unwrap().iter().map(|t| t.id).collect();
        let blocked: Vec<TaskId> = engine.blocked_tasks().unwrap().iter().map(|t| t.id).collect();
        let order: Vec<TaskId> = engine
            .topological_order()
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();

        assert_eq!(ready, vec![id(2)]);
        assert_eq!(blocked, vec![id(3), id(4)]);
        assert_eq!(order, vec![id(1), id(2), id(3), id(4)]);
    }

    #[test]
    fn topological_order_reports_cycle() {
        let engine = engine(vec![task(1, &[2]), task(2, &[1])]);

        assert!(matches!(
            engine.topological_order(),
            Err(EngineError::Graph(GraphError::CircularDependency { .. }))
        ));
    }

    #[test]
    fn config_policies_are_applied() {
        let mut config = ProjectConfig::default();
        config.selection.tie_break = TieBreak::FewestDependencies;

        let engine = Engine::with_config(
            MemoryTaskStore::with_tasks(vec![
                task(1, &[3]).with_priority(Priority::High),
                task(2, &[]).with_priority(Priority::High),
                task(3, &[]).with_status(TaskStatus::Done),
                task(4, &[1]),
            ]),
            &config,
        );

        assert_eq!(engine.next_task().unwrap().task.map(|t| t.id), Some(id(2)));
    }
}
