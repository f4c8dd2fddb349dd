//! # Storage Layer
//!
//! Persistence and configuration for taskgraph.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Store state | JSON snapshot | `.taskgraph/snapshot.json` |
//! | Config | TOML | `.taskgraph/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`SnapshotFile`] takes a shared lock to read and an exclusive lock to
//!   write (`fs2`)
//! - All writes are atomic (temp file + rename)
//! - Two stores must still not write the same snapshot concurrently: the
//!   last writer wins
//!
//! ## Key Types
//!
//! - [`Project`] - Project discovery and initialization
//! - [`Snapshot`] - Full store state
//! - [`SnapshotFile`] - Read/write snapshots on disk
//! - [`Config`] - Project and global configuration

mod config;
mod project;
mod snapshot;

pub use config::{
    Config, ConfigError, GlobalConfig, MilestonesConfig, OutputFormat, PersistenceConfig,
    ProjectConfig, StoreConfig, PROJECT_DIR,
};
pub use project::{Project, ProjectError};
pub use snapshot::{Snapshot, SnapshotFile, SNAPSHOT_VERSION};
