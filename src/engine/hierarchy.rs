//! Parent/child hierarchy operations

use tracing::{debug, info};

use super::{Engine, EngineResult, ValidationError};
use crate::domain::{is_descendant, SubtaskSummary, Task, TaskId, TaskTreeNode};
use crate::storage::{EdgeStore, TaskStore};

impl<S> Engine<S>
where
    S: TaskStore + EdgeStore,
{
    /// Moves a task under a new parent, or to the root with `None`.
    ///
    /// Rejects parents from another project and any move that would make a
    /// task its own ancestor.
    pub fn move_task(
        &self,
        task_id: &TaskId,
        new_parent: Option<&TaskId>,
        position: Option<i64>,
    ) -> EngineResult<Task> {
        let project = self.require_task(task_id)?.project_id;
        let _guard = self.locks.lock(&project)?;

        // Re-read under the lock
        let mut task = self.require_task(task_id)?;

        if let Some(parent_id) = new_parent {
            let parent = self.require_task(parent_id)?;

            if parent.project_id != task.project_id {
                return Err(ValidationError::CrossProjectParent {
                    task: task.id,
                    task_project: task.project_id,
                    parent: parent.id,
                    parent_project: parent.project_id,
                }
                .into());
            }

            if parent_id == task_id
                || is_descendant(task_id, parent_id, |id| self.store.list_children(id))?
            {
                return Err(ValidationError::CircularReference {
                    task: task_id.clone(),
                    parent: parent_id.clone(),
                }
                .into());
            }
        }

        self.store.update_task_parent(task_id, new_parent, position)?;
        task.reparent(new_parent.cloned(), position);

        info!(
            task = %task.id,
            parent = ?task.parent_id.as_ref().map(|p| p.to_string()),
            position = ?position,
            "task moved"
        );
        Ok(task)
    }

    /// Returns the subtree below a task.
    ///
    /// `max_depth` counts levels including the root and defaults to the
    /// configured tree depth.
    pub fn get_task_tree(&self, task_id: &TaskId, max_depth: Option<u32>) -> EngineResult<TaskTreeNode> {
        let max_depth = max_depth.unwrap_or(self.config.default_tree_depth);
        if max_depth == 0 {
            return Err(ValidationError::InvalidDepth(max_depth).into());
        }

        let root = self.require_task(task_id)?;
        let tree = TaskTreeNode::build(root, max_depth, |id| self.store.list_children(id))?;

        debug!(task = %task_id, max_depth, nodes = tree.node_count(), "built task tree");
        Ok(tree)
    }

    /// Rolls up the direct children of a task
    pub fn get_subtask_summary(&self, parent_id: &TaskId) -> EngineResult<SubtaskSummary> {
        self.require_task(parent_id)?;
        let children = self.store.list_children(parent_id)?;

        Ok(SubtaskSummary::from_children(parent_id.clone(), &children))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::domain::TaskStatus;
    use crate::engine::EngineError;
    use crate::storage::TaskStore;

    #[test]
    fn move_under_descendant_rejected() {
        let engine = engine();
        let p = add_task(&engine, "alpha", "P");
        let c = add_child(&engine, &p, "C");
        let g = add_child(&engine, &c, "G");

        for target in [&c, &g, &p] {
            let err = engine.move_task(&p.id, Some(&target.id), None).unwrap_err();
            assert!(
                matches!(
                    err,
                    EngineError::Validation(ValidationError::CircularReference { .. })
                ),
                "moving under {} should fail",
                target.title
            );
        }
        assert!(engine.store().fetch_task(&p.id).unwrap().unwrap().is_root());
    }

    #[test]
    fn detach_to_root() {
        let engine = engine();
        let p = add_task(&engine, "alpha", "P");
        let t = add_child(&engine, &p, "T");

        let moved = engine.move_task(&t.id, None, None).unwrap();
        assert!(moved.is_root());
        assert!(engine.store().list_children(&p.id).unwrap().is_empty());
    }

    #[test]
    fn move_records_position() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let b = add_task(&engine, "alpha", "B");
        let c = add_child(&engine, &a, "C");

        let moved = engine.move_task(&c.id, Some(&b.id), Some(2)).unwrap();
        assert_eq!(moved.parent_id, Some(b.id.clone()));
        assert_eq!(moved.position, Some(2));

        let children = engine.store().list_children(&b.id).unwrap();
        assert_eq!(children[0].position, Some(2));
    }

    #[test]
    fn cross_project_parent_rejected() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let x = add_task(&engine, "beta", "X");

        let err = engine.move_task(&a.id, Some(&x.id), None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::CrossProjectParent { .. })
        ));
    }

    #[test]
    fn missing_parent_not_found() {
        let engine = engine();
        let a = add_task(&engine, "alpha", "A");
        let ghost: TaskId = "t-0000000".parse().unwrap();

        assert!(engine.move_task(&a.id, Some(&ghost), None).unwrap_err().is_not_found());
        assert!(engine.move_task(&ghost, None, None).unwrap_err().is_not_found());
    }

    #[test]
    fn tree_depth_one_is_root_only() {
        let engine = engine();
        let p = add_task(&engine, "alpha", "P");
        add_child(&engine, &p, "C1");
        add_child(&engine, &p, "C2");

        let tree = engine.get_task_tree(&p.id, Some(1)).unwrap();
        assert_eq!(tree.depth, 0);
        assert!(tree.children.is_empty());
        assert!(tree.has_children);
    }

    #[test]
    fn tree_uses_configured_default_depth() {
        let engine = engine();
        let p = add_task(&engine, "alpha", "P");
        let c = add_child(&engine, &p, "C");
        let g = add_child(&engine, &c, "G");
        add_child(&engine, &g, "GG");

        // Default depth 3: root, children, grandchildren
        let tree = engine.get_task_tree(&p.id, None).unwrap();
        assert_eq!(tree.node_count(), 3);
        assert!(tree.children[0].children[0].has_children);
    }

    #[test]
    fn tree_depth_zero_rejected() {
        let engine = engine();
        let p = add_task(&engine, "alpha", "P");

        let err = engine.get_task_tree(&p.id, Some(0)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn summary_rolls_up_children() {
        let engine = engine();
        let p = add_task(&engine, "alpha", "P");
        let a = Task::new(p.project_id.clone(), "A")
            .with_parent(p.id.clone())
            .with_estimate(8.0);
        let b = Task::new(p.project_id.clone(), "B")
            .with_parent(p.id.clone())
            .with_estimate(4.0);
        engine.store().insert_task(a.clone()).unwrap();
        engine.store().insert_task(b).unwrap();

        let summary = engine.get_subtask_summary(&p.id).unwrap();
        assert_eq!(summary.total_subtasks, 2);
        assert_eq!(summary.estimated_hours, 12.0);
        assert_eq!(summary.completion_percentage, 0);

        set_status(&engine, &a, TaskStatus::Done);
        assert_eq!(engine.get_subtask_summary(&p.id).unwrap().completion_percentage, 50);
    }

    #[test]
    fn summary_of_missing_parent() {
        let engine = engine();
        let err = engine
            .get_subtask_summary(&"t-0000000".parse().unwrap())
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
