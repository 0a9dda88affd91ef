//! Task CLI commands

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use clap::Subcommand;

use super::output::{id_list, Output};
use crate::domain::{assess, Priority, Task, TaskId, TaskStatus};
use crate::storage::{JsonlTaskStore, Project, TaskStore};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a task
    ///
    /// Examples:
    ///   taskpilot task add "Build API"
    ///   taskpilot task add "Ship it" --priority high --description "..."
    Add {
        /// Task title
        title: String,

        /// Priority: low, medium, high, critical
        #[arg(long, short, default_value = "medium")]
        priority: Priority,

        /// Longer description
        #[arg(long, short)]
        description: Option<String>,

        /// Implementation notes
        #[arg(long)]
        details: Option<String>,
    },

    /// List tasks
    List {
        /// Only show tasks with this status
        #[arg(long, short)]
        status: Option<TaskStatus>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: TaskId,
    },

    /// Set a task's status
    Status {
        /// Task ID
        id: TaskId,

        /// New status (pending, in-progress, review, done, ...)
        status: TaskStatus,
    },

    /// Add a subtask to a task
    Subtask {
        /// Parent task ID
        id: TaskId,

        /// Subtask title
        title: String,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            title,
            priority,
            description,
            details,
        } => add_task(output, &title, priority, description, details),
        TaskCommands::List { status } => list_tasks(output, status),
        TaskCommands::Show { id } => show_task(output, id),
        TaskCommands::Status { id, status } => set_status(output, id, status),
        TaskCommands::Subtask { id, title } => add_subtask(output, id, &title),
    }
}

fn open_store() -> Result<JsonlTaskStore> {
    Ok(Project::open_current()?.task_store())
}

fn find(tasks: &mut BTreeMap<TaskId, Task>, id: TaskId) -> Result<&mut Task> {
    tasks
        .get_mut(&id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))
}

fn add_task(
    output: &Output,
    title: &str,
    priority: Priority,
    description: Option<String>,
    details: Option<String>,
) -> Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("Task title cannot be empty");
    }

    let store = open_store()?;
    let mut task = Task::new(store.next_id()?, title).with_priority(priority);
    task.description = description;
    task.details = details;

    store.append(&task)?;
    tracing::info!(task = %task.id, "created task");

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": task.id,
            "title": task.title,
            "status": task.status,
            "priority": task.priority,
        }))?;
    } else {
        output.success(&format!("Created task: {} - {}", task.id, task.title));
    }

    Ok(())
}

fn list_tasks(output: &Output, status: Option<TaskStatus>) -> Result<()> {
    let tasks = open_store()?.read_all()?;
    let listed: Vec<&Task> = tasks
        .values()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .collect();

    if output.is_json() {
        let items: Vec<_> = listed
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "status": t.status,
                    "priority": t.priority,
                    "dependencies": t.dependencies,
                    "subtasks": t.subtask_count(),
                })
            })
            .collect();
        output.data(&items)?;
    } else if listed.is_empty() {
        match status {
            Some(status) => println!("No {} tasks", status),
            None => println!("No tasks"),
        }
    } else {
        println!(
            "{:<6} {:<12} {:<9} {:<12} TITLE",
            "ID", "STATUS", "PRIORITY", "DEPENDS ON"
        );
        println!("{}", "-".repeat(70));

        for task in listed {
            println!(
                "{:<6} {:<12} {:<9} {:<12} {}",
                task.id,
                task.status,
                task.priority,
                id_list(&task.dependencies),
                task.title
            );
        }
    }

    Ok(())
}

fn show_task(output: &Output, id: TaskId) -> Result<()> {
    let mut tasks = open_store()?.read_all()?;

    let statuses: HashMap<TaskId, TaskStatus> =
        tasks.iter().map(|(id, t)| (*id, t.status)).collect();
    let task = find(&mut tasks, id)?;

    let is_ready = task.is_ready(&statuses);
    let is_blocked = task.is_blocked(&statuses);
    let assessment = assess(task);

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": task,
            "is_ready": is_ready,
            "is_blocked": is_blocked,
            "complexity": assessment.score,
        }))?;
        return Ok(());
    }

    println!("Task: {}", task.id);
    println!("Title: {}", task.title);
    println!("Status: {}", task.status);
    println!("Priority: {}", task.priority);
    println!("Complexity: {:.1}", assessment.score);
    println!("Created: {}", task.created_at.format("%Y-%m-%d %H:%M"));
    println!("Updated: {}", task.updated_at.format("%Y-%m-%d %H:%M"));

    if !task.dependencies.is_empty() {
        println!("\nDepends on:");
        for dep in &task.dependencies {
            let dep_status = statuses
                .get(dep)
                .map(|s| s.to_string())
                .unwrap_or_else(|| "missing".to_string());
            println!("  {} ({})", dep, dep_status);
        }
    }

    if !task.subtasks.is_empty() {
        println!("\nSubtasks:");
        for subtask in &task.subtasks {
            println!("  {}.{} [{}] {}", task.id, subtask.id, subtask.status, subtask.title);
        }
    }

    if let Some(desc) = &task.description {
        println!("\nDescription:");
        println!("{}", desc);
    }

    if let Some(details) = &task.details {
        println!("\nDetails:");
        println!("{}", details);
    }

    println!();
    if is_ready {
        println!("State: READY (all dependencies complete)");
    } else if is_blocked {
        println!("State: BLOCKED (waiting on dependencies)");
    }

    Ok(())
}

fn set_status(output: &Output, id: TaskId, status: TaskStatus) -> Result<()> {
    let store = open_store()?;
    let mut tasks = store.read_all()?;

    let task = find(&mut tasks, id)?;
    let previous = task.status;
    task.set_status(status);
    store.update(task)?;

    tracing::info!(task = %id, from = %previous, to = %status, "changed status");

    if output.is_json() {
        output.data(&serde_json::json!({
            "id": id,
            "status": status,
            "previous": previous,
        }))?;
    } else {
        output.success(&format!("Task {} is now {}", id, status));
    }

    Ok(())
}

fn add_subtask(output: &Output, id: TaskId, title: &str) -> Result<()> {
    let store = open_store()?;
    let mut tasks = store.read_all()?;

    let task = find(&mut tasks, id)?;
    let subtask = task.add_subtask(title).clone();
    store.update(task)?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "task": id,
            "subtask": subtask,
        }))?;
    } else {
        output.success(&format!(
            "Added subtask {}.{} - {}",
            id, subtask.id, subtask.title
        ));
    }

    Ok(())
}
