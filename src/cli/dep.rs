//! Dependency CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::app::open_engine;
use super::output::{id_list, Output};
use crate::domain::{Task, TaskId};

#[derive(Subcommand)]
pub enum DepCommands {
    /// Make a task depend on another
    ///
    /// Examples:
    ///   taskpilot dep add 5 3     # task 5 waits for task 3
    Add {
        /// Task that will wait
        task: TaskId,

        /// Task that must be completed first
        depends_on: TaskId,
    },

    /// Remove a dependency
    #[command(alias = "remove")]
    Rm {
        /// Task to unblock
        task: TaskId,

        /// Dependency to remove
        depends_on: TaskId,
    },
}

pub fn run(cmd: DepCommands, output: &Output) -> Result<()> {
    match cmd {
        DepCommands::Add { task, depends_on } => add(output, task, depends_on),
        DepCommands::Rm { task, depends_on } => remove(output, task, depends_on),
    }
}

fn add(output: &Output, task: TaskId, depends_on: TaskId) -> Result<()> {
    let (_, engine) = open_engine()?;
    let updated = engine.add_dependency(task, depends_on)?;

    report_change(
        output,
        &updated,
        &format!("Task {} now depends on {}", task, depends_on),
    )
}

fn remove(output: &Output, task: TaskId, depends_on: TaskId) -> Result<()> {
    let (_, engine) = open_engine()?;
    let updated = engine.remove_dependency(task, depends_on)?;

    report_change(
        output,
        &updated,
        &format!("Task {} no longer depends on {}", task, depends_on),
    )
}

fn report_change(output: &Output, task: &Task, message: &str) -> Result<()> {
    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "title": task.title,
            "dependencies": task.dependencies,
        }))?;
    } else {
        output.success(message);
        println!("Dependencies of {}: {}", task.id, id_list(&task.dependencies));
    }
    Ok(())
}

/// Reports dependency defects, removing them with `fix`
pub fn validate(output: &Output, fix: bool) -> Result<()> {
    let (_, engine) = open_engine()?;
    let report = engine.validate_dependencies(fix)?;

    if output.is_json() {
        output.data(&report)?;
        return Ok(());
    }

    if report.valid {
        println!("All dependencies are valid.");
        return Ok(());
    }

    println!("Found {} dependency issue(s):", report.issues.len());
    for issue in &report.issues {
        println!("  - {}", issue);
    }

    match &report.fixed_issues {
        Some(fixed) => {
            println!();
            println!("Removed {} edge(s):", fixed.len());
            for edge in fixed {
                println!("  - {}", edge);
            }
        }
        None => {
            println!();
            println!("Run 'taskpilot validate --fix' to remove the offending edges.");
        }
    }

    Ok(())
}
