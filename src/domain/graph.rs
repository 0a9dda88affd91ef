//! Dependency graph for tasks
//!
//! An index-based view of a task set: tasks are nodes, dependency ids are
//! edges pointing from a task to the task it depends on. The graph is rebuilt
//! from the task records on every operation and is never persisted itself.
//!
//! Building never fails. Self-loops, duplicate edges and cycles are kept in
//! the structure, and edges whose target is not in scope are kept on the
//! side, so that [`DependencyGraph::validate`] can report them and
//! [`DependencyGraph::fix`](super::repair) can remove them.
//!
//! Uses petgraph's stable graph so edge removal never invalidates indices.

use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{depth_first_search, DfsEvent, EdgeRef};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};
use std::fmt;
use thiserror::Error;

use super::id::TaskId;
use super::task::{Task, TaskStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Self-dependency not allowed: {0}")]
    SelfDependency(TaskId),

    #[error("Task {task} already depends on {depends_on}")]
    DependencyExists { task: TaskId, depends_on: TaskId },

    #[error("Task {task} does not depend on {depends_on}")]
    DependencyNotFound { task: TaskId, depends_on: TaskId },

    #[error("Adding dependency would create a cycle: {}", format_path(.cycle))]
    CircularDependency { cycle: Vec<TaskId> },
}

/// Renders a task path as `1 -> 3 -> 2 -> 1`
pub fn format_path(path: &[TaskId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// An ordered pair: `task` depends on `depends_on`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub task: TaskId,
    pub depends_on: TaskId,
}

impl DependencyEdge {
    pub fn new(task: TaskId, depends_on: TaskId) -> Self {
        Self { task, depends_on }
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.task, self.depends_on)
    }
}

/// Kind of graph invariant violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DanglingReference,
    SelfDependency,
    DuplicateEdge,
    CyclicDependency,
}

impl IssueKind {
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::DanglingReference => "dangling reference",
            IssueKind::SelfDependency => "self dependency",
            IssueKind::DuplicateEdge => "duplicate edge",
            IssueKind::CyclicDependency => "cyclic dependency",
        }
    }
}

/// A graph invariant violation found by [`DependencyGraph::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Issue {
    /// `task` depends on an id that is not in scope
    DanglingReference { task: TaskId, depends_on: TaskId },

    SelfDependency { task: TaskId },

    /// The same ordered pair appears `occurrences` times
    DuplicateEdge {
        task: TaskId,
        depends_on: TaskId,
        occurrences: usize,
    },

    /// Closed path, starting and ending at the lowest id in the cycle
    CyclicDependency { cycle: Vec<TaskId> },
}

impl Issue {
    pub fn kind(&self) -> IssueKind {
        match self {
            Issue::DanglingReference { .. } => IssueKind::DanglingReference,
            Issue::SelfDependency { .. } => IssueKind::SelfDependency,
            Issue::DuplicateEdge { .. } => IssueKind::DuplicateEdge,
            Issue::CyclicDependency { .. } => IssueKind::CyclicDependency,
        }
    }

    /// Tasks that own an edge involved in this issue
    pub fn tasks(&self) -> Vec<TaskId> {
        match self {
            Issue::DanglingReference { task, .. }
            | Issue::SelfDependency { task }
            | Issue::DuplicateEdge { task, .. } => vec![*task],
            Issue::CyclicDependency { cycle } => {
                let mut members: Vec<_> = cycle.clone();
                members.sort();
                members.dedup();
                members
            }
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::DanglingReference { task, depends_on } => {
                write!(f, "Task {} depends on missing task {}", task, depends_on)
            }
            Issue::SelfDependency { task } => write!(f, "Task {} depends on itself", task),
            Issue::DuplicateEdge {
                task,
                depends_on,
                occurrences,
            } => write!(
                f,
                "Task {} lists dependency {} {} times",
                task, depends_on, occurrences
            ),
            Issue::CyclicDependency { cycle } => {
                write!(f, "Circular dependency: {}", format_path(cycle))
            }
        }
    }
}

/// A dependency graph for tasks
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Edge direction: task -> depends_on
    graph: StableDiGraph<TaskId, ()>,

    node_map: BTreeMap<TaskId, NodeIndex>,

    /// Edges whose target is not in scope, in load order
    dangling: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a collection of tasks
    ///
    /// Tasks are inserted in ascending id order and their dependencies in
    /// list order, so the result does not depend on iteration order.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut tasks: Vec<_> = tasks.into_iter().collect();
        tasks.sort_by_key(|task| task.id);

        let mut graph = Self::new();

        // First pass: add all nodes
        for task in &tasks {
            graph.add_task(task.id);
        }

        // Second pass: add all edges, unchecked
        for task in &tasks {
            let from = graph.node_map[&task.id];
            for dep_id in &task.dependencies {
                match graph.node_map.get(dep_id) {
                    Some(&to) => {
                        graph.graph.add_edge(from, to, ());
                    }
                    None => graph.dangling.push(DependencyEdge::new(task.id, *dep_id)),
                }
            }
        }

        tracing::debug!(
            tasks = graph.len(),
            edges = graph.edge_count(),
            dangling = graph.dangling.len(),
            "built dependency graph"
        );

        graph
    }

    /// Adds a task to the graph
    pub fn add_task(&mut self, task_id: TaskId) {
        if !self.node_map.contains_key(&task_id) {
            let idx = self.graph.add_node(task_id);
            self.node_map.insert(task_id, idx);
        }
    }

    /// Adds a dependency edge: `task` depends on `depends_on`
    ///
    /// Rejects unknown ids, self-dependencies, existing edges and edges that
    /// would close a cycle. On rejection the graph is unchanged.
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) -> Result<(), GraphError> {
        let task_idx = self.index(task)?;
        let dep_idx = self.index(depends_on)?;

        if task == depends_on {
            return Err(GraphError::SelfDependency(task));
        }

        if self.graph.find_edge(task_idx, dep_idx).is_some() {
            return Err(GraphError::DependencyExists { task, depends_on });
        }

        // The new edge closes a cycle iff `task` is already reachable from
        // `depends_on`.
        if let Some(path) = self.find_path(dep_idx, task_idx) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(task);
            cycle.extend(path);
            return Err(GraphError::CircularDependency { cycle });
        }

        self.graph.add_edge(task_idx, dep_idx, ());
        Ok(())
    }

    /// Removes every copy of the edge `task -> depends_on`
    ///
    /// Dangling edges can be removed as well.
    pub fn remove_dependency(&mut self, task: TaskId, depends_on: TaskId) -> Result<(), GraphError> {
        self.index(task)?;

        if self.remove_pair(task, depends_on) == 0 {
            return Err(GraphError::DependencyNotFound { task, depends_on });
        }

        Ok(())
    }

    /// Removes all copies of an edge, dangling or not; returns how many
    pub(super) fn remove_pair(&mut self, task: TaskId, depends_on: TaskId) -> usize {
        let before = self.dangling.len();
        self.dangling
            .retain(|edge| !(edge.task == task && edge.depends_on == depends_on));
        let mut removed = before - self.dangling.len();

        if let (Some(&from), Some(&to)) = (self.node_map.get(&task), self.node_map.get(&depends_on)) {
            while let Some(edge) = self.graph.find_edge(from, to) {
                self.graph.remove_edge(edge);
                removed += 1;
            }
        }

        removed
    }

    /// Removes one copy of an edge if more than one exists
    pub(super) fn remove_surplus_copy(&mut self, task: TaskId, depends_on: TaskId) -> bool {
        if self.edge_multiplicity(task, depends_on) < 2 {
            return false;
        }

        let (from, to) = (self.node_map[&task], self.node_map[&depends_on]);
        // Copies are interchangeable; drop the most recently added one
        let last = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .filter(|edge| edge.target() == to)
            .map(|edge| edge.id())
            .max();

        match last {
            Some(edge) => self.graph.remove_edge(edge).is_some(),
            None => false,
        }
    }

    /// Number of parallel copies of an in-scope edge
    pub fn edge_multiplicity(&self, task: TaskId, depends_on: TaskId) -> usize {
        match (self.node_map.get(&task), self.node_map.get(&depends_on)) {
            (Some(&from), Some(&to)) => self
                .graph
                .edges_directed(from, Direction::Outgoing)
                .filter(|edge| edge.target() == to)
                .count(),
            _ => 0,
        }
    }

    /// Returns true if `task` depends on `depends_on` (including dangling edges)
    pub fn has_edge(&self, task: TaskId, depends_on: TaskId) -> bool {
        self.edge_multiplicity(task, depends_on) > 0
            || self
                .dangling
                .iter()
                .any(|edge| edge.task == task && edge.depends_on == depends_on)
    }

    /// Returns the direct in-scope dependencies of a task, sorted
    pub fn dependencies(&self, task_id: TaskId) -> Vec<TaskId> {
        self.neighbors(task_id, Direction::Outgoing)
    }

    /// Returns the tasks that depend on a task, sorted
    pub fn dependents(&self, task_id: TaskId) -> Vec<TaskId> {
        self.neighbors(task_id, Direction::Incoming)
    }

    /// Number of distinct tasks depending on this task
    pub fn in_degree(&self, task_id: TaskId) -> usize {
        self.dependents(task_id).len()
    }

    /// Dependency targets of a task that are not in scope
    pub fn dangling_dependencies(&self, task_id: TaskId) -> Vec<TaskId> {
        self.dangling
            .iter()
            .filter(|edge| edge.task == task_id)
            .map(|edge| edge.depends_on)
            .collect()
    }

    /// All dangling edges in load order
    pub fn dangling_edges(&self) -> &[DependencyEdge] {
        &self.dangling
    }

    /// All in-scope edges, sorted, one entry per copy
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| DependencyEdge::new(self.graph[from], self.graph[to]))
            .collect();
        edges.sort();
        edges
    }

    /// Returns tasks that are open and have every dependency complete
    pub fn ready_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        self.open_tasks(statuses)
            .filter(|task_id| !self.is_waiting(*task_id, statuses))
            .collect()
    }

    /// Returns tasks that are open and wait on an incomplete or missing dependency
    pub fn blocked_tasks(&self, statuses: &HashMap<TaskId, TaskStatus>) -> Vec<TaskId> {
        self.open_tasks(statuses)
            .filter(|task_id| self.is_waiting(*task_id, statuses))
            .collect()
    }

    fn open_tasks<'a>(
        &'a self,
        statuses: &'a HashMap<TaskId, TaskStatus>,
    ) -> impl Iterator<Item = TaskId> + 'a {
        self.node_map.keys().copied().filter(move |task_id| {
            let status = statuses.get(task_id).copied().unwrap_or_default();
            !status.is_closed()
        })
    }

    fn is_waiting(&self, task_id: TaskId, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
        if !self.dangling_dependencies(task_id).is_empty() {
            return true;
        }

        self.dependencies(task_id).iter().any(|dep_id| {
            statuses
                .get(dep_id)
                .map(|s| !s.is_complete())
                .unwrap_or(true)
        })
    }

    /// Returns all tasks in topological order (dependencies before dependents)
    ///
    /// Among tasks whose dependencies are all placed, the lowest id comes
    /// first. Fails with the first detected cycle if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<TaskId>, GraphError> {
        if let Some(task) = self.self_loops().into_iter().next() {
            return Err(GraphError::SelfDependency(task));
        }

        let mut remaining: HashMap<TaskId, usize> = self
            .node_map
            .keys()
            .map(|id| (*id, self.dependencies(*id).len()))
            .collect();

        let mut queue: BinaryHeap<Reverse<TaskId>> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| Reverse(*id))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse(task_id)) = queue.pop() {
            order.push(task_id);
            for dependent in self.dependents(task_id) {
                if let Some(count) = remaining.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push(Reverse(dependent));
                    }
                }
            }
        }

        if order.len() < self.len() {
            let cycle = self.cycles().into_iter().next().unwrap_or_default();
            return Err(GraphError::CircularDependency { cycle });
        }

        Ok(order)
    }

    /// Finds every distinct cycle reachable by a white/gray/black DFS
    ///
    /// Each back-edge to a node on the active DFS stack yields one cycle,
    /// taken from the stack between that node and the current one. Cycles
    /// are returned as closed paths rotated to start at their lowest id,
    /// deduplicated, in discovery order. Self-loops are not cycles here.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let starts: Vec<NodeIndex> = self.node_map.values().copied().collect();
        let mut stack: Vec<NodeIndex> = Vec::new();
        let mut seen: HashSet<Vec<TaskId>> = HashSet::new();
        let mut cycles = Vec::new();

        depth_first_search(&self.graph, starts, |event| match event {
            DfsEvent::Discover(node, _) => stack.push(node),
            DfsEvent::Finish(_, _) => {
                stack.pop();
            }
            DfsEvent::BackEdge(from, to) if from != to => {
                if let Some(pos) = stack.iter().rposition(|node| *node == to) {
                    let open: Vec<TaskId> = stack[pos..].iter().map(|node| self.graph[*node]).collect();
                    let cycle = canonical_cycle(&open);
                    if seen.insert(cycle.clone()) {
                        cycles.push(cycle);
                    }
                }
            }
            _ => {}
        });

        cycles
    }

    /// Tasks with an edge to themselves, sorted
    fn self_loops(&self) -> Vec<TaskId> {
        self.node_map
            .iter()
            .filter(|(_, idx)| self.graph.find_edge(**idx, **idx).is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Scans the full edge set for invariant violations
    ///
    /// Issues come grouped as dangling, self, duplicate, cyclic; each group
    /// sorted by task id.
    pub fn validate(&self) -> Vec<Issue> {
        let mut issues = Vec::new();

        let dangling: BTreeSet<_> = self.dangling.iter().copied().collect();
        issues.extend(dangling.into_iter().map(|edge| Issue::DanglingReference {
            task: edge.task,
            depends_on: edge.depends_on,
        }));

        issues.extend(
            self.self_loops()
                .into_iter()
                .map(|task| Issue::SelfDependency { task }),
        );

        let mut counts: BTreeMap<DependencyEdge, usize> = BTreeMap::new();
        for edge in self.edges() {
            if edge.task != edge.depends_on {
                *counts.entry(edge).or_default() += 1;
            }
        }
        issues.extend(
            counts
                .into_iter()
                .filter(|(_, occurrences)| *occurrences > 1)
                .map(|(edge, occurrences)| Issue::DuplicateEdge {
                    task: edge.task,
                    depends_on: edge.depends_on,
                    occurrences,
                }),
        );

        issues.extend(
            self.cycles()
                .into_iter()
                .map(|cycle| Issue::CyclicDependency { cycle }),
        );

        if !issues.is_empty() {
            tracing::debug!(count = issues.len(), "dependency graph has issues");
        }

        issues
    }

    /// Tasks owning at least one edge that violates a graph invariant
    ///
    /// Every member of a strongly connected component counts as a cycle
    /// member, not only those on the cycles `cycles()` reports.
    pub fn tasks_with_invalid_edges(&self) -> BTreeSet<TaskId> {
        let mut invalid: BTreeSet<TaskId> = self.validate().iter().flat_map(Issue::tasks).collect();
        invalid.extend(self.cycle_members());
        invalid
    }

    /// Tasks that can reach themselves through two or more distinct tasks
    pub fn cycle_members(&self) -> BTreeSet<TaskId> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .flatten()
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.node_map.contains_key(&task_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Number of in-scope edges, counting parallel copies
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns all task IDs in the graph, ascending
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.node_map.keys().copied()
    }

    fn index(&self, task_id: TaskId) -> Result<NodeIndex, GraphError> {
        self.node_map
            .get(&task_id)
            .copied()
            .ok_or(GraphError::TaskNotFound(task_id))
    }

    fn neighbors(&self, task_id: TaskId, direction: Direction) -> Vec<TaskId> {
        let Some(&idx) = self.node_map.get(&task_id) else {
            return vec![];
        };

        let mut ids: Vec<TaskId> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n])
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Depth-first path search along dependency edges, lowest ids first
    ///
    /// Returns the path `[from, ..., to]` if `to` is reachable.
    fn find_path(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<TaskId>> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut stack: Vec<(NodeIndex, Option<NodeIndex>)> = vec![(from, None)];

        while let Some((node, via)) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            if let Some(via) = via {
                parent.insert(node, via);
            }

            if node == to {
                let mut path = vec![self.graph[node]];
                let mut current = node;
                while let Some(&prev) = parent.get(&current) {
                    path.push(self.graph[prev]);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }

            let mut next: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .filter(|n| !visited.contains(n))
                .collect();
            // Highest id pushed first so the lowest is explored first
            next.sort_by_key(|n| Reverse(self.graph[*n]));
            next.dedup();
            stack.extend(next.into_iter().map(|n| (n, Some(node))));
        }

        None
    }
}

/// Rotates an open cycle to start at its lowest id and closes it
fn canonical_cycle(open: &[TaskId]) -> Vec<TaskId> {
    let start = open
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let mut cycle: Vec<TaskId> = open[start..].iter().chain(&open[..start]).copied().collect();
    if let Some(first) = cycle.first().copied() {
        cycle.push(first);
    }
    cycle
}
