//! Identifiers for projects, tasks and dependency edges
//!
//! ID Format:
//! - Project IDs: lowercase slug (e.g., `web-app`)
//! - Task IDs: `t-{7-char-hash}` (e.g., `t-9d3e5f2`)
//! - Edge IDs: `e-{7-char-hash}` (e.g., `e-41c0a7e`)
//!
//! Hashes are derived from content + creation timestamp, so the same
//! title created twice yields two distinct IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid project ID: expected a lowercase slug, got '{0}'")]
    InvalidProjectId(String),

    #[error("Invalid task ID format: expected 't-{{7-char-hash}}', got '{0}'")]
    InvalidTaskId(String),

    #[error("Invalid edge ID format: expected 'e-{{7-char-hash}}', got '{0}'")]
    InvalidEdgeId(String),
}

/// Generates a 7-character hash from content and timestamp
fn generate_hash(content: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", content, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Extracts the hash portion of a `{prefix}-{hash}` identifier
fn parse_hash<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let hash = s.strip_prefix(prefix)?.strip_prefix('-')?;
    if hash.len() == 7 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hash)
    } else {
        None
    }
}

/// Project identifier, a lowercase slug
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Project used when none is configured
    pub fn default_project() -> Self {
        Self("default".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe name used for lock files
    pub fn file_stem(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.len() <= 64
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
            && !s.starts_with('-');

        if !valid {
            return Err(IdError::InvalidProjectId(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ProjectId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Task ID in the format `t-{7-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId {
    hash: String,
}

impl TaskId {
    /// Creates a new task ID from title and timestamp
    pub fn new(title: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(title, timestamp),
        }
    }

    /// Returns the hash portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t-{}", self.hash)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = parse_hash(s, "t").ok_or_else(|| IdError::InvalidTaskId(s.to_string()))?;
        Ok(Self {
            hash: hash.to_ascii_lowercase(),
        })
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

/// Dependency edge ID in the format `e-{7-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EdgeId {
    hash: String,
}

impl EdgeId {
    /// Creates an edge ID from its endpoints and creation timestamp
    pub fn new(dependent: &TaskId, blocking: &TaskId, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(&format!("{}>{}", blocking, dependent), timestamp),
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e-{}", self.hash)
    }
}

impl FromStr for EdgeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = parse_hash(s, "e").ok_or_else(|| IdError::InvalidEdgeId(s.to_string()))?;
        Ok(Self {
            hash: hash.to_ascii_lowercase(),
        })
    }
}

impl TryFrom<String> for EdgeId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EdgeId> for String {
    fn from(id: EdgeId) -> Self {
        id.to_string()
    }
}
