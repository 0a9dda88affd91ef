//! Project management
//!
//! Handles project initialization and provides access to stores.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::{Config, JsonlTaskStore};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a taskpilot project. Run 'taskpilot init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# taskpilot configuration

[selection]
# How `next` breaks ties between eligible tasks of equal priority:
# "most-dependents" or "fewest-dependencies"
tie_break = "most-dependents"

[repair]
# Which edge `validate --fix` removes from a cycle:
# "highest-in-degree" or "closing-edge"
cycle_breaker = "highest-in-degree"

[report]
# Omit tasks scoring below this from `report`
# min_score = 3.0
"#;

/// A taskpilot project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(".taskpilot").is_dir() {
            return Err(ProjectError::NotInProject.into());
        }

        let config = Config::for_project(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the project at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_project_root().ok_or(ProjectError::NotInProject)?;

        Self::open(root)
    }

    /// Initializes a new project at the given path
    ///
    /// Existing files are left untouched, so running it twice is harmless.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join(".taskpilot");

        fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create .taskpilot directory: {}", data_dir.display())
        })?;

        let config_path = data_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let tasks_path = data_dir.join("tasks.jsonl");
        if !tasks_path.exists() {
            fs::write(&tasks_path, "")
                .with_context(|| format!("Failed to create task store: {}", tasks_path.display()))?;
        }

        tracing::info!(root = %root.display(), "initialized project");
        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .taskpilot directory path
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(".taskpilot")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the task store
    pub fn task_store(&self) -> JsonlTaskStore {
        JsonlTaskStore::for_project(&self.root)
    }
}
