//! Engine errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EdgeId, EdgeKey, ProjectId, TaskId};

/// Input rejected before any mutation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Task cannot depend on itself: {0}")]
    SelfDependency(TaskId),

    #[error(
        "Adding dependency {dependent} on {blocking} would create a cycle: {}",
        join_path(.path)
    )]
    CircularDependency {
        dependent: TaskId,
        blocking: TaskId,
        path: Vec<TaskId>,
    },

    #[error("Batch would create dependency cycles among: {}", join_cycles(.cycles))]
    CircularBatch { cycles: Vec<Vec<TaskId>> },

    #[error("Cannot move {task} under {parent}: circular parent reference")]
    CircularReference { task: TaskId, parent: TaskId },

    #[error("Cannot move {task} (project {task_project}) under {parent} (project {parent_project})")]
    CrossProjectParent {
        task: TaskId,
        task_project: ProjectId,
        parent: TaskId,
        parent_project: ProjectId,
    },

    #[error("Malformed batch: {0}")]
    MalformedBatch(String),

    #[error("Tree depth must be at least 1, got {0}")]
    InvalidDepth(u32),
}

fn join_path(path: &[TaskId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn join_cycles(cycles: &[Vec<TaskId>]) -> String {
    cycles
        .iter()
        .map(|cycle| {
            let ids: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            format!("[{}]", ids.join(", "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// Reported as not found so callers cannot discover tasks in other projects
    #[error("Task {task} not found in project {project}")]
    NotInProject { task: TaskId, project: ProjectId },

    #[error("Dependency not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("No dependency matches {0}")]
    KeyNotFound(EdgeKey),

    #[error("Dependency already exists: {key} ({existing})")]
    Conflict { key: EdgeKey, existing: EdgeId },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Stable error category for transport mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::TaskNotFound(_)
            | EngineError::NotInProject { .. }
            | EngineError::EdgeNotFound(_)
            | EngineError::KeyNotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict { .. } => ErrorKind::Conflict,
            EngineError::Store(_) => ErrorKind::Internal,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        s.parse().unwrap()
    }

    #[test]
    fn cycle_message_shows_path() {
        let err: EngineError = ValidationError::CircularDependency {
            dependent: id("t-aaaaaaa"),
            blocking: id("t-bbbbbbb"),
            path: vec![id("t-bbbbbbb"), id("t-aaaaaaa"), id("t-bbbbbbb")],
        }
        .into();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err
            .to_string()
            .ends_with("t-bbbbbbb -> t-aaaaaaa -> t-bbbbbbb"));
    }

    #[test]
    fn kinds() {
        assert_eq!(EngineError::TaskNotFound(id("t-aaaaaaa")).kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::Store(anyhow::anyhow!("disk full")).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotFound).unwrap(),
            "\"not_found\""
        );
    }
}
