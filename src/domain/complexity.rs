//! Complexity scoring for a single task
//!
//! The score is a pure function of four structural inputs: subtask count,
//! dependency count, description length and priority. It starts at a base of
//! 2.5, gains fixed increments as each input crosses a threshold, and is
//! capped at 5.0.

use serde::Serialize;

use super::id::TaskId;
use super::task::{Priority, Task};

const BASE_SCORE: f64 = 2.5;
const MAX_SCORE: f64 = 5.0;
const HOURS_PER_POINT: f64 = 4.0;

pub const RISK_MANY_DEPENDENCIES: &str = "many dependencies";
pub const RISK_NO_BREAKDOWN: &str = "complex task with no breakdown";
pub const RISK_HIGH_PRIORITY_WITH_DEPENDENCIES: &str = "high priority with dependencies";

pub const SUGGEST_DECOMPOSE: &str = "recommend decomposing into subtasks";
pub const SUGGEST_SIMPLIFY_DEPENDENCIES: &str = "simplify dependency set";
pub const SUGGEST_STAGED: &str = "use a staged implementation approach";

/// Structural inputs the score is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ComplexityFactors {
    pub subtask_count: usize,
    pub dependency_count: usize,
    pub description_length: usize,
    pub priority: Priority,
}

impl ComplexityFactors {
    pub fn from_task(task: &Task) -> Self {
        Self {
            subtask_count: task.subtask_count(),
            dependency_count: task.dependency_count(),
            description_length: task.description_length(),
            priority: task.priority,
        }
    }

    /// Score in [2.5, 5.0], rounded to one decimal
    pub fn score(&self) -> f64 {
        let mut score = BASE_SCORE;

        if self.subtask_count > 5 {
            score += 1.0;
        }
        if self.subtask_count > 10 {
            score += 1.0;
        }
        if self.dependency_count > 2 {
            score += 0.5;
        }
        if self.dependency_count > 5 {
            score += 0.5;
        }
        if self.description_length > 500 {
            score += 0.5;
        }
        if self.description_length > 1000 {
            score += 0.5;
        }
        if self.priority.is_elevated() {
            score += 0.5;
        }

        round_one_decimal(score.min(MAX_SCORE))
    }
}

/// Derived, non-persisted complexity view of one task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplexityAssessment {
    pub task_id: TaskId,
    pub title: String,
    pub score: f64,
    pub recommended_subtasks: u32,
    pub estimated_hours: u32,
    pub risk_factors: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Scores one task
pub fn assess(task: &Task) -> ComplexityAssessment {
    let factors = ComplexityFactors::from_task(task);
    let score = factors.score();

    ComplexityAssessment {
        task_id: task.id,
        title: task.title.clone(),
        score,
        recommended_subtasks: recommended_subtasks(score),
        estimated_hours: estimated_hours(score),
        risk_factors: risk_factors(&factors, score),
        suggestions: suggestions(&factors, score),
    }
}

pub fn recommended_subtasks(score: f64) -> u32 {
    if score <= 3.0 {
        3
    } else if score <= 4.0 {
        5
    } else {
        8
    }
}

pub fn estimated_hours(score: f64) -> u32 {
    (score * HOURS_PER_POINT).round() as u32
}

fn risk_factors(factors: &ComplexityFactors, score: f64) -> Vec<String> {
    let mut risks = Vec::new();

    if factors.dependency_count > 3 {
        risks.push(RISK_MANY_DEPENDENCIES.to_string());
    }
    if factors.subtask_count == 0 && score > 3.0 {
        risks.push(RISK_NO_BREAKDOWN.to_string());
    }
    // Critical is deliberately excluded here even though it raises the score
    if factors.priority == Priority::High && factors.dependency_count > 0 {
        risks.push(RISK_HIGH_PRIORITY_WITH_DEPENDENCIES.to_string());
    }

    risks
}

fn suggestions(factors: &ComplexityFactors, score: f64) -> Vec<String> {
    let mut suggestions = Vec::new();

    if factors.subtask_count == 0 && score > 2.0 {
        suggestions.push(SUGGEST_DECOMPOSE.to_string());
    }
    if factors.dependency_count > 5 {
        suggestions.push(SUGGEST_SIMPLIFY_DEPENDENCIES.to_string());
    }
    if score > 4.0 {
        suggestions.push(SUGGEST_STAGED.to_string());
    }

    suggestions
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
