//! Configuration handling for taskpilot
//!
//! Configuration is stored in `.taskpilot/config.toml` (project) and
//! `~/.config/taskpilot/config.toml` (global).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CycleBreakPolicy, TieBreak};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// How `next` ranks eligible tasks of equal priority
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    pub tie_break: TieBreak,
}

/// How `validate --fix` breaks cycles
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct RepairConfig {
    pub cycle_breaker: CycleBreakPolicy,
}

/// Defaults for `report`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Omit assessments scoring below this unless overridden on the command line
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ProjectConfig {
    pub selection: SelectionConfig,
    pub repair: RepairConfig,
    pub report: ReportConfig,
}

impl ProjectConfig {
    /// Rejects values that parse but make no sense
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(min) = self.report.min_score {
            if !min.is_finite() || !(0.0..=5.0).contains(&min) {
                return Err(ConfigError::Invalid(format!(
                    "report.min_score must be between 0.0 and 5.0, got {}",
                    min
                )));
            }
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Log filter used when `TASKPILOT_LOG` is unset (e.g. "taskpilot=debug")
    pub log_filter: Option<String>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "taskpilot", "taskpilot")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads global configuration
    pub fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Loads project configuration from a specific root
    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(".taskpilot").join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .validate()
            .with_context(|| format!("Invalid project config: {}", config_path.display()))?;

        Ok(config)
    }

    /// Finds the project root by looking for `.taskpilot/` from the current directory up
    pub fn find_project_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        Self::find_project_root_from(&current)
    }

    /// Finds the project root by looking for `.taskpilot/` from `start` up
    pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            if current.join(".taskpilot").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config {
            project: ProjectConfig::default(),
            global: GlobalConfig::default(),
            project_root: None,
        };

        assert_eq!(config.project.selection.tie_break, TieBreak::MostDependents);
        assert_eq!(
            config.project.repair.cycle_breaker,
            CycleBreakPolicy::HighestInDegree
        );
        assert_eq!(config.project.report.min_score, None);
        assert_eq!(config.global.default_format, OutputFormat::Text);
    }

    #[test]
    fn parse_project_config() {
        let toml = r#"
[selection]
tie_break = "fewest-dependencies"

[repair]
cycle_breaker = "closing-edge"

[report]
min_score = 3.0
"#;

        let config: ProjectConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.selection.tie_break, TieBreak::FewestDependencies);
        assert_eq!(config.repair.cycle_breaker, CycleBreakPolicy::ClosingEdge);
        assert_eq!(config.report.min_score, Some(3.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_project_config_uses_defaults() {
        let config: ProjectConfig = toml::from_str("[report]\nmin_score = 2.5\n").unwrap();

        assert_eq!(config.selection, SelectionConfig::default());
        assert_eq!(config.repair, RepairConfig::default());
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let result: Result<ProjectConfig, _> = toml::from_str("[selection]\ntie_break = \"random\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_min_score_is_invalid() {
        let config: ProjectConfig = toml::from_str("[report]\nmin_score = 9.0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn parse_global_config() {
        let toml = r#"
default_format = "json"
log_filter = "taskpilot=debug"
"#;

        let config: GlobalConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.default_format, OutputFormat::Json);
        assert_eq!(config.log_filter.as_deref(), Some("taskpilot=debug"));
    }

    #[test]
    fn find_project_root_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".taskpilot")).unwrap();

        let sub_dir = dir.path().join("sub").join("dir");
        fs::create_dir_all(&sub_dir).unwrap();

        let root = Config::find_project_root_from(&sub_dir);
        assert_eq!(root.as_deref(), Some(dir.path()));
    }

    #[test]
    fn for_project_reads_config_file() {
        let dir = TempDir::new().unwrap();
        let taskpilot_dir = dir.path().join(".taskpilot");
        fs::create_dir_all(&taskpilot_dir).unwrap();
        fs::write(
            taskpilot_dir.join("config.toml"),
            "[repair]\ncycle_breaker = \"closing-edge\"\n",
        )
        .unwrap();

        let config = Config::for_project(dir.path()).unwrap();
        assert_eq!(config.project.repair.cycle_breaker, CycleBreakPolicy::ClosingEdge);
    }
}
