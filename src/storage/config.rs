//! Configuration handling for taskgraph
//!
//! Configuration is stored in `.taskgraph/config.toml` (project) and
//! `~/.config/taskgraph/config.toml` (global). Every value has a named
//! default, so an empty or missing file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DetectorConfig, MilestoneDetector, MilestoneRule, RuleError};

/// Name of the per-project data directory
pub const PROJECT_DIR: &str = ".taskgraph";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Snapshot persistence settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Write a snapshot after every successful mutation
    pub enabled: bool,

    /// Snapshot file location
    pub path: Option<PathBuf>,
}

/// Limits and persistence for the task store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Task-count ceiling
    pub max_tasks: usize,

    /// Maximum content length, in characters
    pub max_content_length: usize,

    pub persistence: PersistenceConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_tasks: 10_000,
            max_content_length: 500,
            persistence: PersistenceConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Default limits with persistence enabled at `path`
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            persistence: PersistenceConfig {
                enabled: true,
                path: Some(path.into()),
            },
            ..Self::default()
        }
    }

    /// Returns the snapshot path when persistence is enabled
    pub fn snapshot_path(&self) -> Option<&Path> {
        if self.persistence.enabled {
            self.persistence.path.as_deref()
        } else {
            None
        }
    }

    /// Checks the limits for nonsensical values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tasks == 0 {
            return Err(ConfigError::Invalid("max_tasks must be at least 1".into()));
        }
        if self.max_content_length == 0 {
            return Err(ConfigError::Invalid(
                "max_content_length must be at least 1".into(),
            ));
        }
        if self.persistence.enabled && self.persistence.path.is_none() {
            return Err(ConfigError::Invalid(
                "persistence is enabled but no snapshot path is set".into(),
            ));
        }
        Ok(())
    }
}

/// Milestone detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestonesConfig {
    /// Start from the built-in rule set
    pub use_default_rules: bool,

    /// Extra rules, matched after the built-in ones
    pub rules: Vec<MilestoneRule>,
}

impl Default for MilestonesConfig {
    fn default() -> Self {
        Self {
            use_default_rules: true,
            rules: Vec::new(),
        }
    }
}

impl MilestonesConfig {
    /// Builds a detector from the configured rules. Extra rules are checked
    /// the same way as rules added at runtime.
    pub fn detector(&self) -> Result<MilestoneDetector, RuleError> {
        let base = if self.use_default_rules {
            DetectorConfig::default()
        } else {
            DetectorConfig::empty()
        };

        let mut detector = MilestoneDetector::new(base)?;
        for rule in &self.rules {
            detector.add_rule(rule.clone())?;
        }
        Ok(detector)
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub store: StoreConfig,

    pub milestones: MilestonesConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
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
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let project_root = Self::find_project_root();
        let project = match &project_root {
            Some(root) => Self::load_project_config(root)?,
            None => ProjectConfig::default(),
        };

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

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
        ProjectDirs::from("dev", "taskgraph", "taskgraph")
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
        let config_path = project_root.join(PROJECT_DIR).join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config
            .store
            .validate()
            .context("Invalid project config")?;

        Ok(config)
    }

    /// Finds the project root by looking for `.taskgraph/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path> {
        self.project_root
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Not in a taskgraph project. Run 'taskgraph init' first."))
    }

    /// Returns the store configuration for the current project, with
    /// persistence pointed at the project snapshot unless configured
    /// otherwise.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let root = self.require_project_root()?;
        let mut store = self.project.store.clone();

        store.persistence.enabled = true;
        let path = match store.persistence.path.take() {
            Some(path) if path.is_relative() => root.join(path),
            Some(path) => path,
            None => root.join(PROJECT_DIR).join("snapshot.json"),
        };
        store.persistence.path = Some(path);

        Ok(store)
    }
}
