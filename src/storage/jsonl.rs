//! JSONL storage for tasks
//!
//! Tasks are stored in `.taskpilot/tasks.jsonl` with one JSON object per line.
//! Uses file locking for concurrent access safety.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use super::TaskStore;
use crate::domain::{Task, TaskId};

/// Store for task data in JSONL format
pub struct JsonlTaskStore {
    path: PathBuf,
}

impl JsonlTaskStore {
    /// Creates a new task store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the default store for a project
    pub fn for_project(project_root: &Path) -> Self {
        Self::new(project_root.join(".taskpilot").join("tasks.jsonl"))
    }

    /// Returns the path to the store file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes all tasks to the store (full rewrite)
    pub fn write_all(&self, tasks: &BTreeMap<TaskId, Task>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            file.lock_exclusive()
                .context("Failed to acquire write lock on task store")?;

            let mut writer = BufWriter::new(&file);

            // BTreeMap iteration keeps the file sorted by id
            for task in tasks.values() {
                let line = serde_json::to_string(task).context("Failed to serialize task")?;
                writeln!(writer, "{}", line).context("Failed to write task")?;
            }

            writer.flush().context("Failed to flush task store")?;
        }

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        tracing::debug!(path = %self.path.display(), count = tasks.len(), "wrote task store");
        Ok(())
    }

    /// Appends a single task (used for adds without full rewrite)
    pub fn append(&self, task: &Task) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open task store: {}", self.path.display()))?;

        file.lock_exclusive()
            .context("Failed to acquire write lock on task store")?;

        let mut writer = BufWriter::new(&file);
        let line = serde_json::to_string(task).context("Failed to serialize task")?;
        writeln!(writer, "{}", line).context("Failed to write task")?;

        writer.flush().context("Failed to flush task store")?;

        Ok(())
    }

    /// Returns the id a newly created task should get
    pub fn next_id(&self) -> Result<TaskId> {
        let tasks = self.read_all()?;
        match tasks.keys().next_back() {
            None => Ok(TaskId::new(1)),
            Some(highest) => highest
                .next()
                .ok_or_else(|| anyhow::anyhow!("No task IDs left after {}", highest)),
        }
    }
}

impl TaskStore for JsonlTaskStore {
    fn read_all(&self) -> Result<BTreeMap<TaskId, Task>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open task store: {}", self.path.display()))?;

        file.lock_shared()
            .context("Failed to acquire read lock on task store")?;

        let reader = BufReader::new(&file);
        let mut tasks = BTreeMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let task: Task = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse task at line {}", line_num + 1))?;

            // Later lines win, so appended updates replace earlier copies
            tasks.insert(task.id, task);
        }

        Ok(tasks)
    }

    fn update_many(&self, updated: &[Task]) -> Result<()> {
        if updated.is_empty() {
            return Ok(());
        }

        let mut tasks = self.read_all()?;
        for task in updated {
            tasks.insert(task.id, task.clone());
        }
        self.write_all(&tasks)
    }
}
