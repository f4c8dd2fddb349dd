//! JSON snapshot storage for the task store
//!
//! The whole store state lives in one file:
//! `{ version, timestamp, tasks: {id: Task}, order, milestones: {id: Milestone}, config, stats }`.
//! Uses file locking and temp-file-then-rename writes, so a reader never
//! sees a half-written snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::config::StoreConfig;
use crate::domain::{Milestone, MilestoneId, ProgressStats, Task, TaskId};

/// Newest snapshot format this build understands
pub const SNAPSHOT_VERSION: u32 = 1;

/// Full store state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version: u32,

    pub timestamp: DateTime<Utc>,

    pub tasks: BTreeMap<TaskId, Task>,

    /// Store insertion order. Older files may lack it.
    #[serde(default)]
    pub order: Vec<TaskId>,

    #[serde(default)]
    pub milestones: BTreeMap<MilestoneId, Milestone>,

    #[serde(default)]
    pub config: StoreConfig,

    #[serde(default)]
    pub stats: ProgressStats,
}

impl Snapshot {
    /// Builds a snapshot from tasks in store order
    pub fn capture<'a>(
        tasks: impl IntoIterator<Item = &'a Task>,
        milestones: impl IntoIterator<Item = &'a Milestone>,
        config: &StoreConfig,
    ) -> Self {
        let tasks: Vec<&Task> = tasks.into_iter().collect();

        Self {
            version: SNAPSHOT_VERSION,
            timestamp: Utc::now(),
            order: tasks.iter().map(|t| t.id.clone()).collect(),
            stats: ProgressStats::from_tasks(tasks.iter().copied()),
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t.clone())).collect(),
            milestones: milestones
                .into_iter()
                .map(|m| (m.id.clone(), m.clone()))
                .collect(),
            config: config.clone(),
        }
    }

    /// Returns the tasks in store order.
    ///
    /// Tasks listed in `order` come first; anything else follows by creation
    /// time, then ID.
    pub fn ordered_tasks(&self) -> Vec<Task> {
        let mut remaining: HashMap<&TaskId, &Task> = self.tasks.iter().collect();
        let mut ordered = Vec::with_capacity(self.tasks.len());

        for id in &self.order {
            if let Some(task) = remaining.remove(id) {
                ordered.push(task.clone());
            }
        }

        let mut rest: Vec<&Task> = remaining.into_values().collect();
        rest.sort_by(|a, b| {
            a.metadata
                .created_at
                .cmp(&b.metadata.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        ordered.extend(rest.into_iter().cloned());

        ordered
    }
}

/// Snapshot file on disk
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the snapshot, or `None` if the file doesn't exist
    pub fn read(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open snapshot: {}", self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .context("Failed to acquire read lock on snapshot")?;

        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(&file))
            .with_context(|| format!("Failed to parse snapshot: {}", self.path.display()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            bail!(
                "Snapshot version {} is newer than supported version {}",
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }

        info!(
            path = %self.path.display(),
            tasks = snapshot.tasks.len(),
            milestones = snapshot.milestones.len(),
            "snapshot loaded"
        );

        // Lock is released when file is dropped
        Ok(Some(snapshot))
    }

    /// Writes the snapshot (full rewrite)
    pub fn write(&self, snapshot: &Snapshot) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        // Write to temp file first
        let temp_path = self.path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .context("Failed to acquire write lock on snapshot")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, snapshot)
                .context("Failed to serialize snapshot")?;
            writeln!(writer).context("Failed to write snapshot")?;
            writer.flush().context("Failed to flush snapshot")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        info!(path = %self.path.display(), tasks = snapshot.tasks.len(), "snapshot written");

        Ok(())
    }
}
