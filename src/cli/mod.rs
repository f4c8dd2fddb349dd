//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup and bulk input | `init`, `import` |
//! | Task | Work item management | `task add`, `task start`, `task done` |
//! | Query | Progress and planning | `stats`, `ready`, `blocked`, `plan`, `graph` |
//! | Milestones | Grouping | `milestones --sync`, `suggest` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Without the flag, `default_format` from the global config applies.
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug logging on stderr:
//! ```bash
//! taskgraph --verbose ready
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] with a parsed [`Cli`] to execute the command.

mod app;
mod output;
mod query;
mod task;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
