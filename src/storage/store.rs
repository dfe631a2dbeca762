//! Store interfaces consumed by the engine
//!
//! Tasks and edges live in stores the engine does not own. Implementations
//! only persist and query; every graph invariant is enforced by the engine.

use std::sync::Arc;

use anyhow::Result;

use crate::domain::{
    DependencyEdge, EdgeDirection, EdgeId, EdgeKey, ProjectId, Task, TaskId,
};

/// Task records, including their place in the hierarchy
pub trait TaskStore {
    /// Fetches a task by ID
    fn fetch_task(&self, id: &TaskId) -> Result<Option<Task>>;

    /// Rewrites a task's parent and advisory sibling position
    fn update_task_parent(
        &self,
        id: &TaskId,
        parent_id: Option<&TaskId>,
        position: Option<i64>,
    ) -> Result<()>;

    /// Direct children of a task ("children where parent_id = X")
    fn list_children(&self, parent_id: &TaskId) -> Result<Vec<Task>>;

    /// All tasks in a project
    fn list_project_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>>;
}

/// Canonical dependency edges
pub trait EdgeStore {
    /// Edges whose endpoints both belong to the project
    fn list_edges_for_project(&self, project_id: &ProjectId) -> Result<Vec<DependencyEdge>>;

    /// Edges touching a task on the given side
    fn list_edges_for_task(
        &self,
        task_id: &TaskId,
        direction: EdgeDirection,
    ) -> Result<Vec<DependencyEdge>>;

    fn list_all_edges(&self) -> Result<Vec<DependencyEdge>>;

    fn fetch_edge(&self, id: &EdgeId) -> Result<Option<DependencyEdge>>;

    /// Finds the edge stored under exactly this canonical key
    fn find_edge(&self, key: &EdgeKey) -> Result<Option<DependencyEdge>>;

    fn insert_edge(&self, edge: &DependencyEdge) -> Result<()>;

    /// Deletes an edge, returning false if it did not exist
    fn delete_edge(&self, id: &EdgeId) -> Result<bool>;
}

impl<T: TaskStore + ?Sized> TaskStore for Arc<T> {
    fn fetch_task(&self, id: &TaskId) -> Result<Option<Task>> {
        (**self).fetch_task(id)
    }

    fn update_task_parent(
        &self,
        id: &TaskId,
        parent_id: Option<&TaskId>,
        position: Option<i64>,
    ) -> Result<()> {
        (**self).update_task_parent(id, parent_id, position)
    }

    fn list_children(&self, parent_id: &TaskId) -> Result<Vec<Task>> {
        (**self).list_children(parent_id)
    }

    fn list_project_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        (**self).list_project_tasks(project_id)
    }
}

impl<T: EdgeStore + ?Sized> EdgeStore for Arc<T> {
    fn list_edges_for_project(&self, project_id: &ProjectId) -> Result<Vec<DependencyEdge>> {
        (**self).list_edges_for_project(project_id)
    }

    fn list_edges_for_task(
        &self,
        task_id: &TaskId,
        direction: EdgeDirection,
    ) -> Result<Vec<DependencyEdge>> {
        (**self).list_edges_for_task(task_id, direction)
    }

    fn list_all_edges(&self) -> Result<Vec<DependencyEdge>> {
        (**self).list_all_edges()
    }

    fn fetch_edge(&self, id: &EdgeId) -> Result<Option<DependencyEdge>> {
        (**self).fetch_edge(id)
    }

    fn find_edge(&self, key: &EdgeKey) -> Result<Option<DependencyEdge>> {
        (**self).find_edge(key)
    }

    fn insert_edge(&self, edge: &DependencyEdge) -> Result<()> {
        (**self).insert_edge(edge)
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<bool> {
        (**self).delete_edge(id)
    }
}
