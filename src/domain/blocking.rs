//! Derived blocking status of a task

use serde::{Deserialize, Serialize};

use super::id::TaskId;
use super::task::{Task, TaskStatus};

/// A task that sits on the blocking side of an incoming edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingTask {
    pub id: TaskId,

    /// None when the blocker's record is missing from the task store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl BlockingTask {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            title: Some(task.title.clone()),
            status: Some(task.status),
        }
    }

    /// A blocker whose record could not be found
    pub fn missing(id: TaskId) -> Self {
        Self {
            id,
            title: None,
            status: None,
        }
    }

    /// Missing blockers count as unresolved
    pub fn is_resolved(&self) -> bool {
        self.status.is_some_and(|s| s.is_resolved())
    }
}

/// Blocking status of a single task. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingInfo {
    pub task_id: TaskId,
    pub is_blocked: bool,

    /// Unresolved blocking tasks
    pub blocked_by: Vec<BlockingTask>,

    pub can_start: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl BlockingInfo {
    /// Derives blocking status from every task on the blocking side of the
    /// task's incoming edges. Resolved blockers are dropped.
    pub fn from_blockers(task_id: TaskId, blockers: impl IntoIterator<Item = BlockingTask>) -> Self {
        let mut blocked_by: Vec<BlockingTask> =
            blockers.into_iter().filter(|b| !b.is_resolved()).collect();
        blocked_by.sort_by(|a, b| a.id.cmp(&b.id));
        blocked_by.dedup_by(|a, b| a.id == b.id);

        let is_blocked = !blocked_by.is_empty();
        let blocked_reason = is_blocked.then(|| {
            let ids: Vec<String> = blocked_by.iter().map(|b| b.id.to_string()).collect();
            format!(
                "Blocked by {} unresolved task(s): {}",
                blocked_by.len(),
                ids.join(", ")
            )
        });

        Self {
            task_id,
            is_blocked,
            blocked_by,
            can_start: !is_blocked,
            blocked_reason,
        }
    }
}
