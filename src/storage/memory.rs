//! In-memory task and edge store
//!
//! Thread-safe, ephemeral storage for tests and embedding. All operations
//! take one mutex, so each call is atomic but sequences of calls are not;
//! the engine's project locks provide that.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};

use super::store::{EdgeStore, TaskStore};
use crate::domain::{
    sibling_order, DependencyEdge, EdgeDirection, EdgeId, EdgeKey, ProjectId, Task, TaskId,
    TaskStatus,
};

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    edges: HashMap<EdgeId, DependencyEdge>,
}

impl Inner {
    fn in_project(&self, task_id: &TaskId, project_id: &ProjectId) -> bool {
        self.tasks
            .get(task_id)
            .is_some_and(|t| &t.project_id == project_id)
    }

    fn sorted_edges<'a>(&self, edges: impl Iterator<Item = &'a DependencyEdge>) -> Vec<DependencyEdge> {
        let mut edges: Vec<DependencyEdge> = edges.cloned().collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        edges
    }
}

/// Store backed by hash maps behind a mutex
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("Memory store lock poisoned"))
    }

    /// Inserts or replaces a task record
    pub fn insert_task(&self, task: Task) -> Result<()> {
        self.lock()?.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Sets a task's status, returning false if the task is unknown
    pub fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.tasks.get_mut(id) {
            Some(task) => {
                task.set_status(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn task_count(&self) -> Result<usize> {
        Ok(self.lock()?.tasks.len())
    }

    pub fn edge_count(&self) -> Result<usize> {
        Ok(self.lock()?.edges.len())
    }
}

impl TaskStore for MemoryStore {
    fn fetch_task(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.lock()?.tasks.get(id).cloned())
    }

    fn update_task_parent(
        &self,
        id: &TaskId,
        parent_id: Option<&TaskId>,
        position: Option<i64>,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| anyhow!("Task not found: {}", id))?;
        task.reparent(parent_id.cloned(), position);
        Ok(())
    }

    fn list_children(&self, parent_id: &TaskId) -> Result<Vec<Task>> {
        let inner = self.lock()?;
        let mut children: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.parent_id.as_ref() == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by(sibling_order);
        Ok(children)
    }

    fn list_project_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>> {
        let inner = self.lock()?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| &t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }
}

impl EdgeStore for MemoryStore {
    fn list_edges_for_project(&self, project_id: &ProjectId) -> Result<Vec<DependencyEdge>> {
        let inner = self.lock()?;
        let edges = inner.edges.values().filter(|e| {
            inner.in_project(&e.dependent_task_id, project_id)
                && inner.in_project(&e.blocking_task_id, project_id)
        });
        Ok(inner.sorted_edges(edges))
    }

    fn list_edges_for_task(
        &self,
        task_id: &TaskId,
        direction: EdgeDirection,
    ) -> Result<Vec<DependencyEdge>> {
        let inner = self.lock()?;
        let edges = inner.edges.values().filter(|e| match direction {
            EdgeDirection::Incoming => &e.dependent_task_id == task_id,
            EdgeDirection::Outgoing => &e.blocking_task_id == task_id,
            EdgeDirection::Both => e.touches(task_id),
        });
        Ok(inner.sorted_edges(edges))
    }

    fn list_all_edges(&self) -> Result<Vec<DependencyEdge>> {
        let inner = self.lock()?;
        Ok(inner.sorted_edges(inner.edges.values()))
    }

    fn fetch_edge(&self, id: &EdgeId) -> Result<Option<DependencyEdge>> {
        Ok(self.lock()?.edges.get(id).cloned())
    }

    fn find_edge(&self, key: &EdgeKey) -> Result<Option<DependencyEdge>> {
        let inner = self.lock()?;
        Ok(inner.edges.values().find(|e| &e.key() == key).cloned())
    }

    fn insert_edge(&self, edge: &DependencyEdge) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.edges.contains_key(&edge.id) {
            bail!("Edge ID already in use: {}", edge.id);
        }
        let key = edge.key();
        if inner.edges.values().any(|e| e.key() == key) {
            bail!("Edge already stored: {}", key);
        }
        inner.edges.insert(edge.id.clone(), edge.clone());
        Ok(())
    }

    fn delete_edge(&self, id: &EdgeId) -> Result<bool> {
        Ok(self.lock()?.edges.remove(id).is_some())
    }
}
