//! # Storage Layer
//!
//! Persistence and coordination behind the engine.
//!
//! ## Stores
//!
//! | Store | Backing | Use |
//! |-------|---------|-----|
//! | [`MemoryStore`] | Hash maps behind a mutex | Tests, embedding |
//! | [`Database`] | SQLite `.depgraph/graph.db` | CLI projects |
//!
//! Both implement [`TaskStore`] and [`EdgeStore`]. Stores only persist;
//! the engine enforces every graph invariant.
//!
//! ## Concurrency Safety
//!
//! - [`ProjectLocks`] serializes mutations per project (in-process registry
//!   plus `fs2` file locks for file-backed projects)
//! - [`Database`] runs SQLite in WAL mode with a busy timeout
//!
//! ## Project Structure
//!
//! ```text
//! .depgraph/
//! ├── graph.db              # Tasks and dependency edges
//! ├── config.toml           # Project configuration
//! ├── locks/                # One advisory lock file per project id
//! └── .gitignore            # Ignores WAL files and locks
//! ```

mod store;
mod memory;
mod sqlite;
mod lock;
mod config;
mod project;

pub use store::{EdgeStore, TaskStore};
pub use memory::MemoryStore;
pub use sqlite::Database;
pub use lock::{ProjectGuard, ProjectLocks};
pub use config::{
    ActorConfig, Config, ConfigError, GlobalConfig, LoggingConfig, OutputFormat, ProjectConfig,
    STATE_DIR,
};
pub use project::{Project, ProjectError};
