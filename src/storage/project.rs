//! Project management
//!
//! Handles project initialization and wires the file-backed store, locks
//! and configuration into an engine.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::STATE_DIR;
use super::{Config, Database, ProjectLocks};
use crate::engine::Engine;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Not in a depgraph project. Run 'depgraph init' first.")]
    NotInProject,
}

const DEFAULT_CONFIG: &str = r#"# depgraph configuration

# Project new tasks are filed under when --project is not given
default_project = "default"

[engine]
# Levels returned by 'depgraph task tree' without --depth
default_tree_depth = 3

# Largest accepted 'depgraph bulk' batch
max_batch_size = 100

[logging]
# Overridden by DEPGRAPH_LOG and --verbose
level = "warn"

[actor]
# Recorded as created_by on new dependencies (defaults to $DEPGRAPH_ACTOR, then $USER)
# name = "me"
"#;

const GITIGNORE: &str = r#"# SQLite write-ahead files
graph.db-wal
graph.db-shm

# Lock files
locks/
"#;

/// A depgraph project directory
pub struct Project {
    root: PathBuf,
    config: Config,
}

impl Project {
    /// Opens an existing project at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();

        if !root.join(STATE_DIR).is_dir() {
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

    /// Initializes a new project at the given path. Existing files are kept.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let state_dir = root.join(STATE_DIR);

        fs::create_dir_all(&state_dir).with_context(|| {
            format!("Failed to create {} directory: {}", STATE_DIR, state_dir.display())
        })?;

        let locks_dir = state_dir.join("locks");
        fs::create_dir_all(&locks_dir).with_context(|| {
            format!("Failed to create locks directory: {}", locks_dir.display())
        })?;

        let config_path = state_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = state_dir.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(&gitignore_path, GITIGNORE).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        let project = Self::open(root)?;
        // Creates the schema up front so later commands only open it
        project.database()?;

        Ok(project)
    }

    /// Returns the project root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .depgraph directory path
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir().join("graph.db")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir().join("locks")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a mutable reference to the configuration
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Opens the project database
    pub fn database(&self) -> Result<Database> {
        Database::open(&self.database_path())
    }

    /// Builds an engine over the project database with file-backed locks
    pub fn engine(&self) -> Result<Engine<Database>> {
        Ok(Engine::new(self.database()?)
            .with_locks(ProjectLocks::with_lock_dir(self.locks_dir()))
            .with_config(self.config.project.engine.clone()))
    }
}
