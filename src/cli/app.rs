//! Main CLI application structure

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use super::output::{Output, OutputFormat};
use super::{query, task};
use crate::storage::{Config, Project};

#[derive(Parser)]
#[command(name = "taskgraph")]
#[command(author, version, about = "Hierarchical task tracking with milestones and dependency planning")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config setting)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new taskgraph project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Show progress statistics
    Stats,

    /// Show tasks whose dependencies are all completed
    Ready,

    /// Show tasks waiting on unfinished dependencies
    Blocked,

    /// Show the dependency graph
    Graph,

    /// Show the execution plan and critical path
    Plan,

    /// List milestones
    Milestones {
        /// Detect milestones from task content first
        #[arg(long)]
        sync: bool,
    },

    /// Suggest task groupings
    Suggest,

    /// Import tasks from a JSON file
    Import {
        /// File holding a JSON array of task entries
        file: PathBuf,
    },
}

/// Runs a parsed command line
pub fn run(cli: Cli) -> Result<()> {
    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format.into(),
    };
    let output = Output::new(format);

    match cli.command {
        Commands::Init { path } => {
            debug!(path = %path, "initializing project");
            let project = Project::init(&path)?;
            output.success(&format!(
                "Initialized taskgraph project at {}",
                project.root().display()
            ));
        }

        Commands::Task(cmd) => task::run(cmd, &output)?,

        Commands::Stats => query::stats(&output)?,
        Commands::Ready => query::ready(&output)?,
        Commands::Blocked => query::blocked(&output)?,
        Commands::Graph => query::graph(&output)?,
        Commands::Plan => query::plan(&output)?,
        Commands::Milestones { sync } => query::milestones(&output, sync)?,
        Commands::Suggest => query::suggest(&output)?,

        Commands::Import { file } => import(&output, &file)?,
    }

    debug!("command completed");
    Ok(())
}

fn import(output: &Output, file: &PathBuf) -> Result<()> {
    let project = Project::open_current()?;
    let mut store = project.open_store()?;

    let payload = fs::read_to_string(file)
        .with_context(|| format!("Failed to read import file: {}", file.display()))?;
    let ids = store.import_json(&payload)?;

    if output.is_json() {
        output.data(&serde_json::json!({ "imported": ids }));
    } else {
        output.success(&format!("Imported {} task(s)", ids.len()));
    }

    Ok(())
}
