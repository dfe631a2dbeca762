//! Dependency edges between tasks
//!
//! Every edge is stored in one canonical direction: `blocking_task_id` must
//! resolve before `dependent_task_id`. `Blocks` and `IsBlockedBy` describe
//! the same relation from opposite endpoints, so both normalize to `Blocks`
//! on creation. The inverse label only exists for presentation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{EdgeId, ProjectId, TaskId};

/// Type of dependency between tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    /// The blocking task must resolve before the dependent can start
    #[default]
    Blocks,
    /// Inverse label of `Blocks`, seen from the dependent task
    IsBlockedBy,
    /// Informational link, never affects blocking or cycles
    RelatesTo,
}

impl DependencyType {
    /// Returns the label an edge of this type is stored under
    pub fn canonical(self) -> Self {
        match self {
            DependencyType::Blocks | DependencyType::IsBlockedBy => DependencyType::Blocks,
            DependencyType::RelatesTo => DependencyType::RelatesTo,
        }
    }

    /// Returns true if this type takes part in blocking and cycle checks
    pub fn is_blocking(self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::IsBlockedBy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependencyType::Blocks => "BLOCKS",
            DependencyType::IsBlockedBy => "IS_BLOCKED_BY",
            DependencyType::RelatesTo => "RELATES_TO",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "BLOCKS" => Ok(DependencyType::Blocks),
            "IS_BLOCKED_BY" | "BLOCKED_BY" => Ok(DependencyType::IsBlockedBy),
            "RELATES_TO" | "RELATED" => Ok(DependencyType::RelatesTo),
            other => Err(format!("Unknown dependency type: {}", other)),
        }
    }
}

/// Which side of an edge a task sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// Edges where the task is the dependent (its blockers)
    Incoming,
    /// Edges where the task is the blocker (its dependents)
    Outgoing,
    Both,
}

/// A canonical (dependent, blocking, type) triple, before it has an ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    pub dependent_task_id: TaskId,
    pub blocking_task_id: TaskId,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}

impl EdgeKey {
    /// Builds a canonical key from explicit roles
    pub fn new(dependent: TaskId, blocking: TaskId, dep_type: DependencyType) -> Self {
        Self {
            dependent_task_id: dependent,
            blocking_task_id: blocking,
            dep_type: dep_type.canonical(),
        }
    }

    /// Builds a canonical key from one task's point of view.
    ///
    /// `task BLOCKS other` makes `other` the dependent; `task IS_BLOCKED_BY
    /// other` makes `task` the dependent. `RELATES_TO` keeps `task` first.
    pub fn from_perspective(task: TaskId, dep_type: DependencyType, other: TaskId) -> Self {
        match dep_type {
            DependencyType::Blocks => Self::new(other, task, dep_type),
            DependencyType::IsBlockedBy | DependencyType::RelatesTo => {
                Self::new(task, other, dep_type)
            }
        }
    }

    /// Returns the key with endpoints swapped (used for symmetric links)
    pub fn reversed(&self) -> Self {
        Self {
            dependent_task_id: self.blocking_task_id.clone(),
            blocking_task_id: self.dependent_task_id.clone(),
            dep_type: self.dep_type,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.dependent_task_id == self.blocking_task_id
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.blocking_task_id, self.dep_type, self.dependent_task_id
        )
    }
}

/// A persisted dependency edge. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub id: EdgeId,

    /// Project both endpoints belong to
    pub project_id: ProjectId,

    pub dependent_task_id: TaskId,

    pub blocking_task_id: TaskId,

    /// Always canonical (`Blocks` or `RelatesTo`)
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl DependencyEdge {
    /// Creates a new edge from a canonical key
    pub fn new(project_id: ProjectId, key: EdgeKey, created_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EdgeId::new(&key.dependent_task_id, &key.blocking_task_id, now),
            project_id,
            dependent_task_id: key.dependent_task_id,
            blocking_task_id: key.blocking_task_id,
            dep_type: key.dep_type.canonical(),
            created_at: now,
            created_by,
        }
    }

    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(
            self.dependent_task_id.clone(),
            self.blocking_task_id.clone(),
            self.dep_type,
        )
    }

    /// Returns true if this edge affects blocking and cycle checks
    pub fn is_blocking(&self) -> bool {
        self.dep_type.is_blocking()
    }

    /// Returns true if the task is either endpoint
    pub fn touches(&self, task_id: &TaskId) -> bool {
        &self.dependent_task_id == task_id || &self.blocking_task_id == task_id
    }

    /// Returns the label of this edge as seen from `task_id`.
    ///
    /// The blocker sees `BLOCKS`, the dependent sees `IS_BLOCKED_BY`.
    pub fn label_for(&self, task_id: &TaskId) -> DependencyType {
        match self.dep_type {
            DependencyType::RelatesTo => DependencyType::RelatesTo,
            _ if &self.dependent_task_id == task_id => DependencyType::IsBlockedBy,
            _ => DependencyType::Blocks,
        }
    }

    /// Returns the endpoint opposite to `task_id`
    pub fn other_end(&self, task_id: &TaskId) -> &TaskId {
        if &self.dependent_task_id == task_id {
            &self.blocking_task_id
        } else {
            &self.dependent_task_id
        }
    }
}

/// Filter for listing dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dep_type: Option<DependencyType>,
}

impl EdgeFilter {
    /// Returns true if the edge passes the type filter.
    ///
    /// With a task in the filter, `Blocks` keeps edges where the task is the
    /// blocker and `IsBlockedBy` keeps edges where it is the dependent.
    pub fn matches_type(&self, edge: &DependencyEdge) -> bool {
        let Some(wanted) = self.dep_type else {
            return true;
        };

        match (&self.task_id, wanted) {
            (_, DependencyType::RelatesTo) => edge.dep_type == DependencyType::RelatesTo,
            (Some(task_id), label) => edge.is_blocking() && edge.label_for(task_id) == label,
            (None, _) => edge.is_blocking(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (TaskId, TaskId) {
        ("t-aaaaaaa".parse().unwrap(), "t-bbbbbbb".parse().unwrap())
    }

    fn project() -> ProjectId {
        "alpha".parse().unwrap()
    }

    #[test]
    fn blocks_and_is_blocked_by_share_canonical_form() {
        let (a, b) = ids();
        let k1 = EdgeKey::new(b.clone(), a.clone(), DependencyType::Blocks);
        let k2 = EdgeKey::new(b.clone(), a.clone(), DependencyType::IsBlockedBy);
        assert_eq!(k1, k2);
        assert_eq!(k2.dep_type, DependencyType::Blocks);
    }

    #[test]
    fn perspective_normalizes_direction() {
        let (a, b) = ids();
        // a blocks b == b is blocked by a
        let k1 = EdgeKey::from_perspective(a.clone(), DependencyType::Blocks, b.clone());
        let k2 = EdgeKey::from_perspective(b.clone(), DependencyType::IsBlockedBy, a.clone());
        assert_eq!(k1, k2);
        assert_eq!(k1.dependent_task_id, b);
        assert_eq!(k1.blocking_task_id, a);
    }

    #[test]
    fn label_for_each_endpoint() {
        let (a, b) = ids();
        let edge = DependencyEdge::new(
            project(),
            EdgeKey::new(b.clone(), a.clone(), DependencyType::Blocks),
            None,
        );
        assert_eq!(edge.label_for(&a), DependencyType::Blocks);
        assert_eq!(edge.label_for(&b), DependencyType::IsBlockedBy);
        assert_eq!(edge.other_end(&a), &b);
    }

    #[test]
    fn relates_to_is_not_blocking() {
        assert!(!DependencyType::RelatesTo.is_blocking());
        assert!(DependencyType::IsBlockedBy.is_blocking());
    }

    #[test]
    fn type_filter_respects_perspective() {
        let (a, b) = ids();
        let edge = DependencyEdge::new(
            project(),
            EdgeKey::new(b.clone(), a.clone(), DependencyType::Blocks),
            None,
        );

        let filter = EdgeFilter {
            task_id: Some(a.clone()),
            dep_type: Some(DependencyType::Blocks),
            ..Default::default()
        };
        assert!(filter.matches_type(&edge));

        let filter = EdgeFilter {
            task_id: Some(a),
            dep_type: Some(DependencyType::IsBlockedBy),
            ..Default::default()
        };
        assert!(!filter.matches_type(&edge));

        let filter = EdgeFilter {
            dep_type: Some(DependencyType::RelatesTo),
            ..Default::default()
        };
        assert!(!filter.matches_type(&edge));
    }

    #[test]
    fn type_parses_loose_spellings() {
        assert_eq!("blocks".parse::<DependencyType>(), Ok(DependencyType::Blocks));
        assert_eq!(
            "is-blocked-by".parse::<DependencyType>(),
            Ok(DependencyType::IsBlockedBy)
        );
        assert_eq!("relates_to".parse::<DependencyType>(), Ok(DependencyType::RelatesTo));
        assert!("duplicates".parse::<DependencyType>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&DependencyType::IsBlockedBy).unwrap();
        assert_eq!(json, "\"IS_BLOCKED_BY\"");
    }
}
