//! Project management
//!
//! Handles project initialization and opens the task store with the
//! project's configuration.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::{Config, PROJECT_DIR};
use crate::domain::MilestoneDetector;
use crate::store::TaskStore;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a taskgraph project. Run 'taskgraph init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# taskgraph project configuration

[store]
# Task-count ceiling
# max_tasks = 10000
# Maximum task content length, in characters
# max_content_length = 500

[store.persistence]
# Relative paths resolve against the project root
# path = ".taskgraph/snapshot.json"

[milestones]
# Start from the built-in phase/release/feature/checkpoint/sprint rules
# use_default_rules = true

# Extra detection rules are matched after the built-in ones:
#
# [[milestones.rules]]
# id = "epic"
# name = "Epic"
# pattern = '(?i)\bepic\s*:\s*([\w-]+)'
# type = "feature"
# priority = "high"
"#;

const DEFAULT_GITIGNORE: &str = r#"# In-flight snapshot writes
*.tmp
"#;

/// A taskgraph project
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(PROJECT_DIR).is_dir() {
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

    /// Initializes a new project at the given path. Existing files are left
    /// alone.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let data_dir = root.join(PROJECT_DIR);

        fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create {} directory: {}", PROJECT_DIR, data_dir.display())
        })?;

        let config_path = data_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = data_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, DEFAULT_GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `.taskgraph` directory path
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the project's task store, loading its snapshot if present
    pub fn open_store(&self) -> Result<TaskStore> {
        let config = self.config.store_config()?;
        let store = TaskStore::new(config).context("Failed to open task store")?;
        Ok(store)
    }

    /// Builds the milestone detector from the project's rules
    pub fn detector(&self) -> Result<MilestoneDetector> {
        self.config
            .project
            .milestones
            .detector()
            .context("Invalid milestone rules in project config")
    }
}
