//! Graph repair
//!
//! [`DependencyGraph::fix`] removes the edges named by a list of issues in a
//! fixed order (duplicates, self-loops, dangling references, cycles) and then
//! keeps breaking cycles until none are left. Which edge of a cycle goes is
//! decided by a [`CycleBreaker`].

use serde::{Deserialize, Serialize};
use std::fmt;

use super::graph::{DependencyEdge, DependencyGraph, Issue, IssueKind};
use super::id::TaskId;

/// An edge removed by a repair, with the issue that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedEdge {
    pub task: TaskId,
    pub depends_on: TaskId,
    pub reason: IssueKind,
}

impl RemovedEdge {
    pub fn new(edge: DependencyEdge, reason: IssueKind) -> Self {
        Self {
            task: edge.task,
            depends_on: edge.depends_on,
            reason,
        }
    }

    pub fn edge(&self) -> DependencyEdge {
        DependencyEdge::new(self.task, self.depends_on)
    }
}

impl fmt::Display for RemovedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "removed {} -> {} ({})",
            self.task,
            self.depends_on,
            self.reason.label()
        )
    }
}

/// Chooses which edge to remove to break a cycle
pub trait CycleBreaker {
    /// `cycle` lists the cycle's edges in path order; the last one closes it
    fn select(&self, graph: &DependencyGraph, cycle: &[DependencyEdge]) -> Option<DependencyEdge>;
}

/// Built-in cycle-breaking policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleBreakPolicy {
    /// Remove the edge whose target has the most dependents; ties go to the
    /// lowest target id, then the lowest source id
    #[default]
    HighestInDegree,

    /// Remove the last edge of the reported path, the one returning to the
    /// cycle's lowest id
    ClosingEdge,
}

impl CycleBreakPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleBreakPolicy::HighestInDegree => "highest-in-degree",
            CycleBreakPolicy::ClosingEdge => "closing-edge",
        }
    }
}

impl CycleBreaker for CycleBreakPolicy {
    fn select(&self, graph: &DependencyGraph, cycle: &[DependencyEdge]) -> Option<DependencyEdge> {
        match self {
            CycleBreakPolicy::HighestInDegree => cycle.iter().copied().max_by(|a, b| {
                graph
                    .in_degree(a.depends_on)
                    .cmp(&graph.in_degree(b.depends_on))
                    .then_with(|| b.depends_on.cmp(&a.depends_on))
                    .then_with(|| b.task.cmp(&a.task))
            }),
            CycleBreakPolicy::ClosingEdge => cycle.last().copied(),
        }
    }
}

/// Splits a closed path `[a, b, c, a]` into edges `a -> b`, `b -> c`, `c -> a`
pub fn cycle_edges(cycle: &[TaskId]) -> Vec<DependencyEdge> {
    cycle
        .windows(2)
        .map(|pair| DependencyEdge::new(pair[0], pair[1]))
        .collect()
}

impl DependencyGraph {
    /// Removes the edges responsible for `issues`, then any remaining cycles
    ///
    /// Order: surplus duplicate copies (the first occurrence stays),
    /// self-loops, dangling references, one edge per reported cycle. Cycles
    /// are then re-detected and broken until the graph is acyclic; each pass
    /// removes at least one edge, and a pass that removes nothing stops the
    /// loop. Applying this to `validate()` output twice removes nothing the
    /// second time.
    pub fn fix(&mut self, issues: &[Issue], breaker: &dyn CycleBreaker) -> Vec<RemovedEdge> {
        let mut removed = Vec::new();

        for issue in issues {
            if let Issue::DuplicateEdge {
                task, depends_on, ..
            } = *issue
            {
                while self.remove_surplus_copy(task, depends_on) {
                    removed.push(RemovedEdge::new(
                        DependencyEdge::new(task, depends_on),
                        IssueKind::DuplicateEdge,
                    ));
                }
            }
        }

        for issue in issues {
            if let Issue::SelfDependency { task } = *issue {
                if self.remove_pair(task, task) > 0 {
                    removed.push(RemovedEdge::new(
                        DependencyEdge::new(task, task),
                        IssueKind::SelfDependency,
                    ));
                }
            }
        }

        for issue in issues {
            if let Issue::DanglingReference { task, depends_on } = *issue {
                // The target may have appeared since the issue was reported
                if !self.contains(depends_on) && self.remove_pair(task, depends_on) > 0 {
                    removed.push(RemovedEdge::new(
                        DependencyEdge::new(task, depends_on),
                        IssueKind::DanglingReference,
                    ));
                }
            }
        }

        for issue in issues {
            if let Issue::CyclicDependency { cycle } = issue {
                self.break_cycle(cycle, breaker, &mut removed);
            }
        }

        loop {
            let cycles = self.cycles();
            if cycles.is_empty() {
                break;
            }

            let before = removed.len();
            for cycle in &cycles {
                self.break_cycle(cycle, breaker, &mut removed);
            }

            if removed.len() == before {
                tracing::warn!(
                    remaining = cycles.len(),
                    "cycle breaker removed nothing; leaving cycles in place"
                );
                break;
            }
        }

        tracing::debug!(removed = removed.len(), "repaired dependency graph");
        removed
    }

    fn break_cycle(
        &mut self,
        cycle: &[TaskId],
        breaker: &dyn CycleBreaker,
        removed: &mut Vec<RemovedEdge>,
    ) {
        let edges = cycle_edges(cycle);
        if edges.is_empty() {
            return;
        }

        // Already broken by an earlier removal
        if edges
            .iter()
            .any(|edge| self.edge_multiplicity(edge.task, edge.depends_on) == 0)
        {
            return;
        }

        let Some(edge) = breaker.select(self, &edges) else {
            return;
        };

        if edges.contains(&edge) && self.remove_pair(edge.task, edge.depends_on) > 0 {
            removed.push(RemovedEdge::new(edge, IssueKind::CyclicDependency));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;

    fn id(n: u32) -> TaskId {
        TaskId::new(n)
    }

    fn task(n: u32, deps: &[u32]) -> Task {
        let mut task = Task::new(id(n), format!("Task {}", n));
        task.dependencies = deps.iter().map(|d| id(*d)).collect();
        task
    }

    fn edge(task: u32, depends_on: u32) -> DependencyEdge {
        DependencyEdge::new(id(task), id(depends_on))
    }

    fn fix_all(graph: &mut DependencyGraph, policy: CycleBreakPolicy) -> Vec<RemovedEdge> {
        let issues = graph.validate();
        graph.fix(&issues, &policy)
    }

    #[test]
    fn cycle_edges_from_closed_path() {
        assert_eq!(
            cycle_edges(&[id(1), id(2), id(3), id(1)]),
            vec![edge(1, 2), edge(2, 3), edge(3, 1)]
        );
        assert!(cycle_edges(&[]).is_empty());
    }

    #[test]
    fn dangling_edge_and_three_node_cycle() {
        let mut graph = DependencyGraph::from_tasks(&[
            task(1, &[2]),
            task(2, &[3]),
            task(3, &[1]),
            task(4, &[99]),
        ]);

        let issues = graph.validate();
        assert_eq!(issues.len(), 2);

        let removed = graph.fix(&issues, &CycleBreakPolicy::default());
        assert_eq!(
            removed,
            vec![
                RemovedEdge::new(edge(4, 99), IssueKind::DanglingReference),
                RemovedEdge::new(edge(3, 1), IssueKind::CyclicDependency),
            ]
        );
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn highest_in_degree_edge_is_removed() {
        // Cycle 1 -> 2 -> 3 -> 1; tasks 4 and 5 also depend on 2
        let mut graph = DependencyGraph::from_tasks(&[
            task(1, &[2]),
            task(2, &[3]),
            task(3, &[1]),
            task(4, &[2]),
            task(5, &[2]),
        ]);

        let removed = fix_all(&mut graph, CycleBreakPolicy::HighestInDegree);
        assert_eq!(
            removed,
            vec![RemovedEdge::new(edge(1, 2), IssueKind::CyclicDependency)]
        );
    }

    #[test]
    fn in_degree_ties_go_to_lowest_target() {
        let mut graph = DependencyGraph::from_tasks(&[task(5, &[6]), task(6, &[7]), task(7, &[5])]);

        let removed = fix_all(&mut graph, CycleBreakPolicy::HighestInDegree);
        assert_eq!(
            removed,
            vec![RemovedEdge::new(edge(7, 5), IssueKind::CyclicDependency)]
        );
    }

    #[test]
    fn closing_edge_policy_removes_last_edge() {
        let mut graph = DependencyGraph::from_tasks(&[
            task(1, &[2]),
            task(2, &[3]),
            task(3, &[1]),
            task(4, &[2]),
        ]);

        let removed = fix_all(&mut graph, CycleBreakPolicy::ClosingEdge);
        assert_eq!(
            removed,
            vec![RemovedEdge::new(edge(3, 1), IssueKind::CyclicDependency)]
        );
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn duplicates_keep_one_copy() {
        let mut graph = DependencyGraph::from_tasks(&[task(1, &[]), task(2, &[1, 1, 1])]);

        let removed = fix_all(&mut graph, CycleBreakPolicy::default());
        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|r| r.reason == IssueKind::DuplicateEdge));
        assert_eq!(graph.edge_multiplicity(id(2), id(1)), 1);
    }

    #[test]
    fn self_loops_removed() {
        let mut graph = DependencyGraph::from_tasks(&[task(1, &[1, 1])]);

        let removed = fix_all(&mut graph, CycleBreakPolicy::default());
        assert_eq!(
            removed,
            vec![RemovedEdge::new(edge(1, 1), IssueKind::SelfDependency)]
        );
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn duplicated_cycle_edge_fully_removed() {
        let mut graph = DependencyGraph::from_tasks(&[task(1, &[2, 2]), task(2, &[1])]);

        fix_all(&mut graph, CycleBreakPolicy::default());
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn overlapping_cycles_converge() {
        // 1 -> 2 -> 3 -> 1 and 1 -> 2 -> 4 -> 1 share the edge 1 -> 2
        let mut graph = DependencyGraph::from_tasks(&[
            task(1, &[2]),
            task(2, &[3, 4]),
            task(3, &[1]),
            task(4, &[1]),
        ]);

        let removed = fix_all(&mut graph, CycleBreakPolicy::default());
        assert!(!removed.is_empty());
        assert!(removed
            .iter()
            .all(|r| r.reason == IssueKind::CyclicDependency));
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn cycles_missing_from_issues_are_still_broken() {
        let mut graph = DependencyGraph::from_tasks(&[task(1, &[2]), task(2, &[1])]);

        let removed = graph.fix(&[], &CycleBreakPolicy::default());
        assert_eq!(removed.len(), 1);
        assert!(graph.validate().is_empty());
    }

    #[test]
    fn fix_is_idempotent() {
        let tasks = [
            task(1, &[2, 2]),
            task(2, &[3]),
            task(3, &[1, 3]),
            task(4, &[42]),
        ];
        let mut graph = DependencyGraph::from_tasks(&tasks);

        let first = fix_all(&mut graph, CycleBreakPolicy::default());
        let edges_after_first = graph.edges();

        let second = fix_all(&mut graph, CycleBreakPolicy::default());

        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(graph.edges(), edges_after_first);
    }

    #[test]
    fn stale_dangling_issue_skipped_when_target_exists() {
        let mut graph = DependencyGraph::from_tasks(&[task(1, &[2]), task(2, &[])]);
        let stale = [Issue::DanglingReference {
            task: id(1),
            depends_on: id(2),
        }];

        assert!(graph.fix(&stale, &CycleBreakPolicy::default()).is_empty());
        assert!(graph.has_edge(id(1), id(2)));
    }

    struct NeverBreak;

    impl CycleBreaker for NeverBreak {
        fn select(&self, _: &DependencyGraph, _: &[DependencyEdge]) -> Option<DependencyEdge> {
            None
        }
    }

    #[test]
    fn breaker_that_refuses_does_not_loop() {
        let mut graph = DependencyGraph::from_tasks(&[task(1, &[2]), task(2, &[1])]);
        let issues = graph.validate();

        let removed = graph.fix(&issues, &NeverBreak);
        assert!(removed.is_empty());
        assert_eq!(graph.cycles().len(), 1);
    }

    #[test]
    fn policy_serializes_kebab_case() {
        let json = serde_json::to_string(&CycleBreakPolicy::HighestInDegree).unwrap();
        assert_eq!(json, "\"highest-in-degree\"");
    }
}
