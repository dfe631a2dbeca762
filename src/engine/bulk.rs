//! Batched dependency creation and deletion
//!
//! A batch is checked for shape first and rejected as a whole if it is
//! empty or too large. Every touched project is then locked for the rest
//! of the call. With `validate_circular`, the union of existing edges and
//! all well-formed blocking candidates must be acyclic or nothing is
//! applied. Items are then applied in order and each outcome is recorded
//! on its own.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Engine, EngineError, EngineResult, ErrorKind, ValidationError};
use crate::domain::{BlockingGraph, DependencyEdge, DependencyType, EdgeKey, ProjectId, TaskId};
use crate::storage::{EdgeStore, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BulkOperation {
    Create,
    Delete,
}

/// One dependency in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItem {
    #[serde(alias = "dependentTaskId")]
    pub dependent_task_id: TaskId,

    #[serde(alias = "blockingTaskId")]
    pub blocking_task_id: TaskId,

    #[serde(rename = "type", default)]
    pub dep_type: DependencyType,
}

impl BulkItem {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(
            self.dependent_task_id.clone(),
            self.blocking_task_id.clone(),
            self.dep_type,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub operation: BulkOperation,

    pub dependencies: Vec<BulkItem>,

    /// Check the whole batch for cycles before applying anything
    #[serde(default, alias = "validateCircular")]
    pub validate_circular: bool,
}

impl BulkRequest {
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(input).map_err(|e| ValidationError::MalformedBatch(e.to_string()))
    }

    pub fn from_yaml(input: &str) -> Result<Self, ValidationError> {
        serde_yaml::from_str(input).map_err(|e| ValidationError::MalformedBatch(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub item: BulkItem,
    pub error: String,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResult {
    pub successful: Vec<DependencyEdge>,
    pub failed: Vec<BulkFailure>,
}

impl<S> Engine<S>
where
    S: TaskStore + EdgeStore,
{
    /// Applies a batch of creates or deletes.
    ///
    /// Returns `Err` only for batch-level rejections (shape, whole-batch
    /// cycle, lock or store failure while preparing); per-item problems end
    /// up in `failed`.
    pub fn bulk_dependency_operation(
        &self,
        request: &BulkRequest,
        actor: Option<&str>,
    ) -> EngineResult<BulkResult> {
        self.check_batch_shape(request)?;

        let resolved: Vec<EngineResult<ProjectId>> = request
            .dependencies
            .iter()
            .map(|item| self.resolve_item(request.operation, item))
            .collect();

        let projects: BTreeSet<ProjectId> = resolved
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .cloned()
            .collect();
        let _guard = self.locks.lock_all(&projects)?;

        if request.operation == BulkOperation::Create && request.validate_circular {
            self.check_batch_cycles(request, &resolved, &projects)?;
        }

        let mut result = BulkResult::default();
        for (item, resolution) in request.dependencies.iter().zip(resolved) {
            let outcome = resolution.and_then(|project| match request.operation {
                BulkOperation::Create => self.create_locked(&project, item.key(), actor),
                BulkOperation::Delete => self.delete_locked(&item.key()),
            });

            match outcome {
                Ok(edge) => result.successful.push(edge),
                Err(err) => result.failed.push(BulkFailure {
                    item: item.clone(),
                    error: err.to_string(),
                    kind: err.kind(),
                }),
            }
        }

        info!(
            operation = ?request.operation,
            successful = result.successful.len(),
            failed = result.failed.len(),
            "bulk dependency operation finished"
        );
        Ok(result)
    }

    fn check_batch_shape(&self, request: &BulkRequest) -> Result<(), ValidationError> {
        if request.dependencies.is_empty() {
            return Err(ValidationError::MalformedBatch(
                "batch contains no dependencies".to_string(),
            ));
        }

        let limit = self.config.max_batch_size;
        if request.dependencies.len() > limit {
            return Err(ValidationError::MalformedBatch(format!(
                "batch of {} dependencies exceeds the limit of {}",
                request.dependencies.len(),
                limit
            )));
        }

        Ok(())
    }

    /// Finds the project an item belongs to, or why it cannot be applied
    fn resolve_item(&self, operation: BulkOperation, item: &BulkItem) -> EngineResult<ProjectId> {
        let key = item.key();
        match operation {
            BulkOperation::Create => {
                if key.is_self_loop() {
                    return Err(ValidationError::SelfDependency(key.dependent_task_id).into());
                }
                self.endpoints_project(&key)
            }
            BulkOperation::Delete => self
                .find_matching(&key)?
                .map(|edge| edge.project_id)
                .ok_or(EngineError::KeyNotFound(key)),
        }
    }

    /// Rejects the batch if existing edges plus every well-formed blocking
    /// candidate contain a cycle
    fn check_batch_cycles(
        &self,
        request: &BulkRequest,
        resolved: &[EngineResult<ProjectId>],
        projects: &BTreeSet<ProjectId>,
    ) -> EngineResult<()> {
        let mut existing = Vec::new();
        for project in projects {
            existing.extend(self.store.list_edges_for_project(project)?);
        }

        let mut graph = BlockingGraph::from_edges(&existing);
        for (item, resolution) in request.dependencies.iter().zip(resolved) {
            if resolution.is_ok() {
                graph.insert_key(&item.key());
            }
        }

        let cycles = graph.find_cycles();
        if !cycles.is_empty() {
            warn!(cycles = cycles.len(), "bulk create rejected: batch closes cycles");
            return Err(ValidationError::CircularBatch { cycles }.into());
        }

        Ok(())
    }
}
