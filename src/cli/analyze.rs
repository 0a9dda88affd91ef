//! Prioritization and complexity commands (next, complexity, report)

use std::collections::BTreeSet;

use anyhow::Result;

use super::app::open_engine;
use super::output::{id_list, Output};
use crate::domain::{ComplexityAssessment, ReportFilter, TaskId, TaskStatus};

/// Suggest the next task to work on
pub fn next(output: &Output) -> Result<()> {
    let (_, engine) = open_engine()?;
    let next = engine.next_task()?;

    if output.is_json() {
        output.data(&next)?;
        return Ok(());
    }

    match &next.task {
        Some(task) => {
            println!("Next task: {} - {}", task.id, task.title);
            println!("Priority: {}", task.priority);
            if !task.dependencies.is_empty() {
                println!("Depends on: {}", id_list(&task.dependencies));
            }
            if !next.unblocks.is_empty() {
                println!("Unblocks: {}", id_list(&next.unblocks));
            }
            println!();
            println!("{}", next.reasoning);
        }
        None => println!("No task to work on. {}", next.reasoning),
    }

    Ok(())
}

/// Score the complexity of one task
pub fn complexity(output: &Output, id: TaskId) -> Result<()> {
    let (_, engine) = open_engine()?;
    let assessment = engine.analyze_complexity(id)?;

    if output.is_json() {
        output.data(&assessment)?;
    } else {
        print_assessment(&assessment);
    }

    Ok(())
}

fn print_assessment(assessment: &ComplexityAssessment) {
    println!("Task: {} - {}", assessment.task_id, assessment.title);
    println!("Complexity: {:.1} / 5.0", assessment.score);
    println!("Recommended subtasks: {}", assessment.recommended_subtasks);
    println!("Estimated hours: {}", assessment.estimated_hours);

    if !assessment.risk_factors.is_empty() {
        println!("\nRisk factors:");
        for risk in &assessment.risk_factors {
            println!("  - {}", risk);
        }
    }

    if !assessment.suggestions.is_empty() {
        println!("\nSuggestions:");
        for suggestion in &assessment.suggestions {
            println!("  - {}", suggestion);
        }
    }
}

/// Score every task and summarize
///
/// `min_score` falls back to `[report] min_score` in the project config.
pub fn report(output: &Output, statuses: Vec<TaskStatus>, min_score: Option<f64>) -> Result<()> {
    let (project, engine) = open_engine()?;

    let min_score = min_score.or(project.config().project.report.min_score);
    if let Some(min) = min_score {
        if !min.is_finite() {
            anyhow::bail!("--min-score must be a number, got {}", min);
        }
    }

    let filter = ReportFilter {
        statuses: statuses.into_iter().collect::<BTreeSet<_>>(),
        min_score,
    };
    let report = engine.complexity_report(&filter)?;

    if output.is_json() {
        output.data(&report)?;
        return Ok(());
    }

    if report.tasks.is_empty() {
        println!("No tasks to report.");
        return Ok(());
    }

    println!("{:<6} {:<6} {:<6} {:<6} TITLE", "ID", "SCORE", "SUBS", "HOURS");
    println!("{}", "-".repeat(60));
    for assessment in &report.tasks {
        println!(
            "{:<6} {:<6.1} {:<6} {:<6} {}",
            assessment.task_id,
            assessment.score,
            assessment.recommended_subtasks,
            assessment.estimated_hours,
            assessment.title
        );
    }

    let summary = &report.summary;
    let bands = &summary.complexity_distribution;
    println!();
    println!("Tasks: {}", summary.total_tasks);
    println!("Average complexity: {:.1}", summary.average_complexity);
    println!(
        "Distribution: {} low, {} medium, {} high, {} very high",
        bands.low, bands.medium, bands.high, bands.very_high
    );

    Ok(())
}
