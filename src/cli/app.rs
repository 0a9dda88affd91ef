//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{analyze, dep, query, task};
use crate::domain::TaskStatus;
use crate::engine::Engine;
use crate::logging;
use crate::storage::{Config, JsonlTaskStore, Project};

#[derive(Parser)]
#[command(name = "taskpilot")]
#[command(author, version, about = "Dependency-aware task prioritization")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new taskpilot project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Manage dependencies between tasks
    #[command(subcommand)]
    Dep(dep::DepCommands),

    /// Check dependencies for dangling references, self references,
    /// duplicates and cycles
    Validate {
        /// Remove offending edges and save the result
        #[arg(long)]
        fix: bool,
    },

    /// Suggest the next task to work on
    Next,

    /// Score the complexity of one task
    Complexity {
        /// Task ID
        id: crate::domain::TaskId,
    },

    /// Score every task and summarize
    Report {
        /// Only include tasks with this status (repeatable)
        #[arg(long = "status", short = 's')]
        statuses: Vec<TaskStatus>,

        /// Omit tasks scoring below this
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Show tasks ready to work on
    Ready,

    /// Show tasks waiting on dependencies
    Blocked,

    /// Show all tasks with dependencies before dependents
    Order,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let global = Config::load_global()?;

    logging::init(global.log_filter.as_deref(), cli.verbose);

    let output = Output::new(cli.format.unwrap_or(global.default_format));
    tracing::debug!("taskpilot starting");

    match cli.command {
        Commands::Init { path } => {
            let project = Project::init(&path)?;
            output.success(&format!(
                "Initialized taskpilot project at {}",
                project.root().display()
            ));
        }

        Commands::Task(cmd) => task::run(cmd, &output)?,
        Commands::Dep(cmd) => dep::run(cmd, &output)?,
        Commands::Validate { fix } => dep::validate(&output, fix)?,

        Commands::Next => analyze::next(&output)?,
        Commands::Complexity { id } => analyze::complexity(&output, id)?,
        Commands::Report {
            statuses,
            min_score,
        } => analyze::report(&output, statuses, min_score)?,

        Commands::Ready => query::ready(&output)?,
        Commands::Blocked => query::blocked(&output)?,
        Commands::Order => query::order(&output)?,
    }

    tracing::debug!("command completed");
    Ok(())
}

/// Opens the current project and an engine configured from it
pub(super) fn open_engine() -> Result<(Project, Engine<JsonlTaskStore>)> {
    let project = Project::open_current()?;
    tracing::debug!(root = %project.root().display(), "opened project");

    let engine = Engine::with_config(project.task_store(), &project.config().project);
    Ok((project, engine))
}
