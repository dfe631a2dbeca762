//! Creating, deleting and listing dependency edges

use tracing::{debug, info};

use super::{Engine, EngineError, EngineResult, ValidationError};
use crate::domain::{
    BlockingGraph, DependencyEdge, DependencyType, EdgeDirection, EdgeFilter, EdgeId, EdgeKey,
    ProjectId, TaskId,
};
use crate::storage::{EdgeStore, TaskStore};

impl<S> Engine<S>
where
    S: TaskStore + EdgeStore,
{
    /// Records that `dependent` cannot start until `blocking` resolves.
    ///
    /// `IS_BLOCKED_BY` is stored as the equivalent `BLOCKS` edge. Fails
    /// without writing anything on a self-dependency, a missing or foreign
    /// task, a duplicate, or a cycle.
    pub fn create_dependency(
        &self,
        dependent: &TaskId,
        blocking: &TaskId,
        dep_type: DependencyType,
        actor: Option<&str>,
    ) -> EngineResult<DependencyEdge> {
        let key = EdgeKey::new(dependent.clone(), blocking.clone(), dep_type);
        if key.is_self_loop() {
            return Err(ValidationError::SelfDependency(dependent.clone()).into());
        }

        let project = self.endpoints_project(&key)?;
        let _guard = self.locks.lock(&project)?;

        self.create_locked(&project, key, actor)
    }

    /// Duplicate and cycle checks plus the write. Caller holds the lock.
    pub(super) fn create_locked(
        &self,
        project: &ProjectId,
        key: EdgeKey,
        actor: Option<&str>,
    ) -> EngineResult<DependencyEdge> {
        if let Some(existing) = self.find_matching(&key)? {
            return Err(EngineError::Conflict {
                key,
                existing: existing.id,
            });
        }

        if key.dep_type.is_blocking() {
            let edges = self.store.list_edges_for_project(project)?;
            let graph = BlockingGraph::from_edges(&edges);
            if let Some(path) = graph.cycle_path(&key.dependent_task_id, &key.blocking_task_id) {
                debug!(candidate = %key, "rejected dependency that would close a cycle");
                return Err(ValidationError::CircularDependency {
                    dependent: key.dependent_task_id,
                    blocking: key.blocking_task_id,
                    path,
                }
                .into());
            }
        }

        let edge = DependencyEdge::new(project.clone(), key, actor.map(str::to_string));
        self.store.insert_edge(&edge)?;

        info!(
            edge = %edge.id,
            project = %project,
            dependent = %edge.dependent_task_id,
            blocking = %edge.blocking_task_id,
            dep_type = %edge.dep_type,
            "dependency created"
        );
        Ok(edge)
    }

    /// Finds a stored edge equal to `key`. `RELATES_TO` matches in either
    /// orientation.
    pub(super) fn find_matching(&self, key: &EdgeKey) -> EngineResult<Option<DependencyEdge>> {
        if let Some(edge) = self.store.find_edge(key)? {
            return Ok(Some(edge));
        }
        if key.dep_type == DependencyType::RelatesTo {
            return Ok(self.store.find_edge(&key.reversed())?);
        }
        Ok(None)
    }

    /// Removes an edge by ID and returns it
    pub fn delete_dependency(&self, id: &EdgeId) -> EngineResult<DependencyEdge> {
        let edge = self
            .store
            .fetch_edge(id)?
            .ok_or_else(|| EngineError::EdgeNotFound(id.clone()))?;

        let _guard = self.locks.lock(&edge.project_id)?;

        // Another caller may have removed it before we got the lock
        if !self.store.delete_edge(id)? {
            return Err(EngineError::EdgeNotFound(id.clone()));
        }

        info!(edge = %edge.id, project = %edge.project_id, "dependency deleted");
        Ok(edge)
    }

    /// Removes the edge matching a key. Caller holds the lock.
    pub(super) fn delete_locked(&self, key: &EdgeKey) -> EngineResult<DependencyEdge> {
        let edge = self
            .find_matching(key)?
            .ok_or_else(|| EngineError::KeyNotFound(key.clone()))?;

        if !self.store.delete_edge(&edge.id)? {
            return Err(EngineError::KeyNotFound(key.clone()));
        }

        info!(edge = %edge.id, project = %edge.project_id, "dependency deleted");
        Ok(edge)
    }

    /// Lists edges, oldest first.
    ///
    /// A task in the filter takes precedence over a project; with neither
    /// every edge is returned.
    pub fn list_dependencies(&self, filter: &EdgeFilter) -> EngineResult<Vec<DependencyEdge>> {
        let edges = match (&filter.task_id, &filter.project_id) {
            (Some(task_id), _) => self.store.list_edges_for_task(task_id, EdgeDirection::Both)?,
            (None, Some(project_id)) => self.store.list_edges_for_project(project_id)?,
            (None, None) => self.store.list_all_edges()?,
        };

        let mut edges: Vec<DependencyEdge> =
            edges.into_iter().filter(|e| filter.matches_type(e)).collect();
        edges.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        debug!(count = edges.len(), "listed dependencies");
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::engine::ErrorKind;

    #[test]
    fn reverse_edge_rejected_as_cycle() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let b = add_task(&engine, "alpha", "B");

        engine.create_dependency(&b.id, &a.id, DependencyType::Blocks, None).unwrap();
        let err = engine
            .create_dependency(&a.id, &b.id, DependencyType::Blocks, None)
            .unwrap_err();

        match err {
            EngineError::Validation(ValidationError::CircularDependency { path, .. }) => {
                assert_eq!(path, vec![b.id.clone(), a.id.clone(), b.id.clone()]);
            }
            other => panic!("expected circular dependency, got {other:?}"),
        }
        assert_eq!(engine.list_dependencies(&EdgeFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn self_dependency_rejected() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");

        let err = engine
            .create_dependency(&a.id, &a.id, DependencyType::Blocks, None)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::SelfDependency(_))
        ));
    }

    #[test]
    fn missing_and_foreign_tasks_are_not_found() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let other = add_task(&engine, "beta", "Other");
        let ghost: TaskId = "t-0000000".parse().unwrap();

        let err = engine
            .create_dependency(&a.id, &ghost, DependencyType::Blocks, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = engine
            .create_dependency(&a.id, &other.id, DependencyType::Blocks, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotInProject { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn inverse_label_is_a_duplicate() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let b = add_task(&engine, "alpha", "B");

        let edge = engine
            .create_dependency(&b.id, &a.id, DependencyType::IsBlockedBy, Some("ana"))
            .unwrap();
        assert_eq!(edge.dep_type, DependencyType::Blocks);
        assert_eq!(edge.created_by.as_deref(), Some("ana"));

        let err = engine
            .create_dependency(&b.id, &a.id, DependencyType::Blocks, None)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn relates_to_is_symmetric_and_inert() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let b = add_task(&engine, "alpha", "B");

        engine.create_dependency(&a.id, &b.id, DependencyType::RelatesTo, None).unwrap();
        let err = engine
            .create_dependency(&b.id, &a.id, DependencyType::RelatesTo, None)
            .unwrap_err();
        assert!(err.is_conflict());

        // Informational links never close a blocking cycle
        engine.create_dependency(&b.id, &a.id, DependencyType::Blocks, None).unwrap();
        assert!(!engine.get_task_blocking_info(&a.id).unwrap().is_blocked);
    }

    #[test]
    fn delete_then_recreate() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let b = add_task(&engine, "alpha", "B");

        let edge = engine.create_dependency(&b.id, &a.id, DependencyType::Blocks, None).unwrap();
        let before = engine.get_task_blocking_info(&b.id).unwrap();
        let graph_before = engine.generate_dependency_graph(&project("alpha")).unwrap();

        let deleted = engine.delete_dependency(&edge.id).unwrap();
        assert_eq!(deleted.id, edge.id);
        assert!(!engine.get_task_blocking_info(&b.id).unwrap().is_blocked);

        let err = engine.delete_dependency(&edge.id).unwrap_err();
        assert!(err.is_not_found());

        engine.create_dependency(&b.id, &a.id, DependencyType::Blocks, None).unwrap();
        assert_eq!(engine.get_task_blocking_info(&b.id).unwrap(), before);
        assert_eq!(
            engine.generate_dependency_graph(&project("alpha")).unwrap(),
            graph_before
        );
    }

    #[test]
    fn list_filters() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let b = add_task(&engine, "alpha", "B");
        let c = add_task(&engine, "alpha", "C");
        let x = add_task(&engine, "beta", "X");
        let y = add_task(&engine, "beta", "Y");

        engine.create_dependency(&b.id, &a.id, DependencyType::Blocks, None).unwrap();
        engine.create_dependency(&a.id, &c.id, DependencyType::Blocks, None).unwrap();
        engine.create_dependency(&a.id, &b.id, DependencyType::RelatesTo, None).unwrap();
        engine.create_dependency(&y.id, &x.id, DependencyType::Blocks, None).unwrap();

        let all = engine.list_dependencies(&EdgeFilter::default()).unwrap();
        assert_eq!(all.len(), 4);

        let alpha = EdgeFilter {
            project_id: Some(project("alpha")),
            ..Default::default()
        };
        assert_eq!(engine.list_dependencies(&alpha).unwrap().len(), 3);

        let a_blocks = EdgeFilter {
            task_id: Some(a.id.clone()),
            dep_type: Some(DependencyType::Blocks),
            ..Default::default()
        };
        let edges = engine.list_dependencies(&a_blocks).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].dependent_task_id, b.id);

        let a_blocked_by = EdgeFilter {
            task_id: Some(a.id.clone()),
            dep_type: Some(DependencyType::IsBlockedBy),
            ..Default::default()
        };
        let edges = engine.list_dependencies(&a_blocked_by).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].blocking_task_id, c.id);

        // Task wins over project
        let task_and_other_project = EdgeFilter {
            task_id: Some(a.id.clone()),
            project_id: Some(project("beta")),
            ..Default::default()
        };
        assert_eq!(engine.list_dependencies(&task_and_other_project).unwrap().len(), 3);
    }
}
