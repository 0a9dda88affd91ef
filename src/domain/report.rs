//! Complexity report over a set of tasks

use serde::Serialize;
use std::collections::BTreeSet;

use super::complexity::{assess, ComplexityAssessment};
use super::task::{Task, TaskStatus};

/// Which tasks a report covers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    /// Only score tasks in one of these statuses; empty means all
    pub statuses: BTreeSet<TaskStatus>,

    /// Omit assessments scoring below this
    pub min_score: Option<f64>,
}

impl ReportFilter {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.insert(status);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }

    fn includes_task(&self, task: &Task) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&task.status)
    }

    fn includes_assessment(&self, assessment: &ComplexityAssessment) -> bool {
        self.min_score.map_or(true, |min| assessment.score >= min)
    }
}

/// Count of assessments per score band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplexityDistribution {
    /// score <= 2.0
    pub low: usize,
    /// 2.0 < score <= 3.5
    pub medium: usize,
    /// 3.5 < score <= 4.5
    pub high: usize,
    /// score > 4.5
    pub very_high: usize,
}

impl ComplexityDistribution {
    fn record(&mut self, score: f64) {
        if score <= 2.0 {
            self.low += 1;
        } else if score <= 3.5 {
            self.medium += 1;
        } else if score <= 4.5 {
            self.high += 1;
        } else {
            self.very_high += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplexitySummary {
    pub total_tasks: usize,
    pub average_complexity: f64,
    pub complexity_distribution: ComplexityDistribution,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComplexityReport {
    /// Assessments in ascending task id order
    pub tasks: Vec<ComplexityAssessment>,
    pub summary: ComplexitySummary,
}

impl ComplexityReport {
    /// Scores every task the filter admits
    ///
    /// The summary covers exactly the assessments returned.
    pub fn build<'a>(tasks: impl IntoIterator<Item = &'a Task>, filter: &ReportFilter) -> Self {
        let mut scoped: Vec<&Task> = tasks
            .into_iter()
            .filter(|task| filter.includes_task(task))
            .collect();
        scoped.sort_by_key(|task| task.id);

        let assessments: Vec<ComplexityAssessment> = scoped
            .into_iter()
            .map(assess)
            .filter(|assessment| filter.includes_assessment(assessment))
            .collect();

        let summary = summarize(&assessments);
        tracing::debug!(
            total = summary.total_tasks,
            average = summary.average_complexity,
            "built complexity report"
        );

        Self {
            tasks: assessments,
            summary,
        }
    }
}

fn summarize(assessments: &[ComplexityAssessment]) -> ComplexitySummary {
    if assessments.is_empty() {
        return ComplexitySummary::default();
    }

    let mut distribution = ComplexityDistribution::default();
    let mut total = 0.0;
    for assessment in assessments {
        distribution.record(assessment.score);
        total += assessment.score;
    }

    let average = total / assessments.len() as f64;
    ComplexitySummary {
        total_tasks: assessments.len(),
        average_complexity: (average * 10.0).round() / 10.0,
        complexity_distribution: distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::TaskId;
    use crate::domain::task::Priority;

    fn task(id: u32, priority: Priority, subtasks: usize) -> Task {
        let mut task = Task::new(TaskId::new(id), format!("Task {}", id)).with_priority(priority);
        for s in 0..subtasks {
            task.add_subtask(format!("Step {}", s));
        }
        task
    }

    #[test]
    fn empty_scope_is_all_zero() {
        let report = ComplexityReport::build(Vec::<&Task>::new(), &ReportFilter::default());

        assert!(report.tasks.is_empty());
        assert_eq!(report.summary.total_tasks, 0);
        assert_eq!(report.summary.average_complexity, 0.0);
        assert_eq!(report.summary.complexity_distribution, ComplexityDistribution::default());
    }

    #[test]
    fn assessments_are_in_ascending_id_order() {
        let tasks = vec![
            task(3, Priority::Low, 0),
            task(1, Priority::Low, 0),
            task(2, Priority::Low, 0),
        ];

        let report = ComplexityReport::build(&tasks, &ReportFilter::default());
        let ids: Vec<u32> = report.tasks.iter().map(|a| a.task_id.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn summary_bands_and_average() {
        let tasks = vec![
            task(1, Priority::Low, 0),       // 2.5 medium
            task(2, Priority::High, 6),      // 4.0 high
            task(3, Priority::Critical, 11), // 5.0 very high
        ];

        let report = ComplexityReport::build(&tasks, &ReportFilter::default());
        let summary = &report.summary;

        assert_eq!(summary.total_tasks, 3);
        assert_eq!(summary.average_complexity, 3.8);
        assert_eq!(
            summary.complexity_distribution,
            ComplexityDistribution {
                low: 0,
                medium: 1,
                high: 1,
                very_high: 1
            }
        );
    }

    #[test]
    fn band_boundaries_are_inclusive_above() {
        let mut distribution = ComplexityDistribution::default();
        for score in [2.0, 3.5, 4.5, 4.6] {
            distribution.record(score);
        }

        assert_eq!(
            distribution,
            ComplexityDistribution {
                low: 1,
                medium: 1,
                high: 1,
                very_high: 1
            }
        );
    }

    #[test]
    fn status_filter_limits_scope() {
        let mut done = task(2, Priority::Low, 0);
        done.set_status(TaskStatus::Done);
        let tasks = vec![task(1, Priority::Low, 0), done];

        let filter = ReportFilter::default().with_status(TaskStatus::Pending);
        let report = ComplexityReport::build(&tasks, &filter);

        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].task_id, TaskId::new(1));
        assert_eq!(report.summary.total_tasks, 1);
    }

    #[test]
    fn min_score_drops_low_assessments_from_summary() {
        let tasks = vec![task(1, Priority::Low, 0), task(2, Priority::High, 6)];

        let report = ComplexityReport::build(&tasks, &ReportFilter::default().with_min_score(3.0));

        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.summary.total_tasks, 1);
        assert_eq!(report.summary.average_complexity, 4.0);
    }
}
