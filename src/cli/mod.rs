//! # Command-Line Interface
//!
//! User-facing commands over a project-local SQLite store.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Task | Tasks and hierarchy | `task add`, `task move`, `task tree` |
//! | Dep | Dependency edges | `dep add`, `dep rm`, `dep list` |
//! | Query | Project-wide views | `ready`, `blocked`, `graph` |
//! | Batch | Many edges at once | `bulk deps.yaml` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Failures in JSON mode are written to stderr as
//! `{"success": false, "error": ..., "kind": ...}`.
//!
//! ## Logging
//!
//! `--verbose` enables debug logs on stderr; `DEPGRAPH_LOG` takes a full
//! filter directive:
//! ```bash
//! DEPGRAPH_LOG=depgraph=trace depgraph dep add t-aaaaaaa blocks t-bbbbbbb
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod dep;
mod logging;
mod output;
mod query;
mod session;
mod task;

pub use app::{run, Cli, Commands};
pub use logging::init_tracing;
pub use output::{Output, OutputFormat};
