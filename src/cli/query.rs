//! Query commands (ready, blocked, order)

use anyhow::Result;

use super::app::open_engine;
use super::output::{id_list, Output};
use crate::domain::{Task, TaskId};
use crate::storage::TaskStore;

/// Show tasks ready to work on
pub fn ready(output: &Output) -> Result<()> {
    let (_, engine) = open_engine()?;
    let ready_tasks = engine.ready_tasks()?;
    tracing::debug!(count = ready_tasks.len(), "found ready tasks");

    if output.is_json() {
        let items: Vec<_> = ready_tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "status": t.status,
                    "priority": t.priority,
                })
            })
            .collect();
        output.data(&items)?;
    } else if ready_tasks.is_empty() {
        println!("No tasks ready to work on.");
    } else {
        println!("Ready tasks ({}):", ready_tasks.len());
        print_table(&ready_tasks);
    }

    Ok(())
}

/// Show blocked tasks with what they wait on
pub fn blocked(output: &Output) -> Result<()> {
    let (_, engine) = open_engine()?;
    let blocked_tasks = engine.blocked_tasks()?;
    let all = engine.store().read_all()?;
    tracing::debug!(count = blocked_tasks.len(), "found blocked tasks");

    let with_blockers: Vec<(&Task, Vec<TaskId>)> = blocked_tasks
        .iter()
        .map(|task| {
            let blockers = task
                .dependencies
                .iter()
                .filter(|dep| !all.get(dep).is_some_and(|d| d.status.is_complete()))
                .copied()
                .collect();
            (task, blockers)
        })
        .collect();

    if output.is_json() {
        let items: Vec<_> = with_blockers
            .iter()
            .map(|(task, blockers)| {
                serde_json::json!({
                    "id": task.id,
                    "title": task.title,
                    "blocked_by": blockers,
                })
            })
            .collect();
        output.data(&items)?;
    } else if with_blockers.is_empty() {
        println!("No blocked tasks.");
    } else {
        println!("Blocked tasks ({}):", with_blockers.len());
        println!("{:<6} {:<30} BLOCKED BY", "ID", "TITLE");
        println!("{}", "-".repeat(60));
        for (task, blockers) in with_blockers {
            println!("{:<6} {:<30} {}", task.id, task.title, id_list(&blockers));
        }
    }

    Ok(())
}

/// Show every task with dependencies before dependents
pub fn order(output: &Output) -> Result<()> {
    let (_, engine) = open_engine()?;
    let ordered = engine.topological_order()?;

    if output.is_json() {
        let ids: Vec<TaskId> = ordered.iter().map(|t| t.id).collect();
        output.data(&ids)?;
    } else if ordered.is_empty() {
        println!("No tasks");
    } else {
        print_table(&ordered);
    }

    Ok(())
}

fn print_table(tasks: &[Task]) {
    println!("{:<6} {:<12} {:<9} TITLE", "ID", "STATUS", "PRIORITY");
    println!("{}", "-".repeat(60));
    for task in tasks {
        println!(
            "{:<6} {:<12} {:<9} {}",
            task.id, task.status, task.priority, task.title
        );
    }
}
