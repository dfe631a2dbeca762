//! # Dependency Engine
//!
//! Validates and applies every change to dependency edges and the task
//! hierarchy, and derives read models (blocking info, trees, rollups, graph
//! reports) on demand. Nothing derived is cached.
//!
//! Mutations follow one pattern: cheap input checks, then the project lock,
//! then read-validate-write against the store while the lock is held. The
//! blocking subgraph of each project therefore stays acyclic as long as all
//! writes go through the engine.
//!
//! The engine is generic over its store so the same logic runs over
//! [`MemoryStore`](crate::storage::MemoryStore) in tests and
//! [`Database`](crate::storage::Database) in the CLI.

mod error;
mod dependencies;
mod blocking;
mod hierarchy;
mod graph;
mod bulk;

pub use error::{EngineError, EngineResult, ErrorKind, ValidationError};
pub use bulk::{BulkFailure, BulkItem, BulkOperation, BulkRequest, BulkResult};

use serde::{Deserialize, Serialize};

use crate::domain::{EdgeKey, ProjectId, Task, TaskId};
use crate::storage::{EdgeStore, ProjectLocks, TaskStore};

/// Tunables, loaded from `[engine]` in the project config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Depth used by `get_task_tree` when the caller gives none
    pub default_tree_depth: u32,

    /// Largest accepted bulk batch
    pub max_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_tree_depth: 3,
            max_batch_size: 100,
        }
    }
}

pub struct Engine<S> {
    store: S,
    locks: ProjectLocks,
    config: EngineConfig,
}

impl<S> Engine<S>
where
    S: TaskStore + EdgeStore,
{
    /// Creates an engine with in-process locking and default settings
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: ProjectLocks::in_process(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_locks(mut self, locks: ProjectLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetches a task, or `TaskNotFound`
    pub fn require_task(&self, id: &TaskId) -> EngineResult<Task> {
        self.store
            .fetch_task(id)?
            .ok_or_else(|| EngineError::TaskNotFound(id.clone()))
    }

    /// Resolves the project shared by both endpoints of a key
    fn endpoints_project(&self, key: &EdgeKey) -> EngineResult<ProjectId> {
        let dependent = self.require_task(&key.dependent_task_id)?;
        let blocking = self.require_task(&key.blocking_task_id)?;

        if blocking.project_id != dependent.project_id {
            return Err(EngineError::NotInProject {
                task: blocking.id,
                project: dependent.project_id,
            });
        }

        Ok(dependent.project_id)
    }
}
