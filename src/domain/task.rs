//! Task domain model
//!
//! Tasks are owned by the task store. The engine only ever rewrites a
//! task's place in the hierarchy (`parent_id` and its advisory `position`);
//! everything else is read to derive blocking status and rollups.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ProjectId, TaskId};

/// Workflow status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl TaskStatus {
    /// Returns true if this status represents completion
    pub fn is_complete(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// Returns true if this status no longer blocks dependents.
    ///
    /// Both terminal states resolve a block.
    pub fn is_resolved(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::InReview => "in_review",
            TaskStatus::Done => "done",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "in_review" => Ok(TaskStatus::InReview),
            "done" => Ok(TaskStatus::Done),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("Unknown task status: {}", other)),
        }
    }
}

/// A task record as seen by the graph engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Project this task belongs to
    pub project_id: ProjectId,

    /// Parent task in the hierarchy (None for root-level tasks)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,

    /// Human-readable title
    pub title: String,

    /// Current status
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_points: Option<u32>,

    /// Advisory rank among siblings; ties and gaps are allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new root-level task in the given project
    pub fn new(project_id: ProjectId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        let title = title.into();
        Self {
            id: TaskId::new(&format!("{}/{}", project_id, title), now),
            project_id,
            parent_id: None,
            title,
            status: TaskStatus::Todo,
            estimated_hours: None,
            story_points: None,
            position: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the parent task (builder style)
    pub fn with_parent(mut self, parent_id: TaskId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_estimate(mut self, hours: f64) -> Self {
        self.estimated_hours = Some(hours);
        self
    }

    pub fn with_story_points(mut self, points: u32) -> Self {
        self.story_points = Some(points);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns true if this task sits at the root of the hierarchy
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Updates the status, touching `updated_at` only on change
    pub fn set_status(&mut self, status: TaskStatus) {
        if self.status != status {
            self.status = status;
            self.updated_at = Utc::now();
        }
    }

    /// Moves this task under a new parent (or to the root with `None`)
    pub fn reparent(&mut self, parent_id: Option<TaskId>, position: Option<i64>) {
        self.parent_id = parent_id;
        self.position = position;
        self.updated_at = Utc::now();
    }
}

/// Orders siblings by advisory position (unset last), then by ID
pub fn sibling_order(a: &Task, b: &Task) -> std::cmp::Ordering {
    match (a.position, b.position) {
        (Some(pa), Some(pb)) => pa.cmp(&pb).then_with(|| a.id.cmp(&b.id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.id.cmp(&b.id),
    }
}
