//! Blocking analysis

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{Engine, EngineResult};
use crate::domain::{BlockingInfo, BlockingTask, EdgeDirection, ProjectId, Task, TaskId};
use crate::storage::{EdgeStore, TaskStore};

impl<S> Engine<S>
where
    S: TaskStore + EdgeStore,
{
    /// Derives whether a task can start from the status of its blockers
    pub fn get_task_blocking_info(&self, task_id: &TaskId) -> EngineResult<BlockingInfo> {
        self.require_task(task_id)?;

        let mut blockers = Vec::new();
        for edge in self.store.list_edges_for_task(task_id, EdgeDirection::Incoming)? {
            if !edge.is_blocking() {
                continue;
            }
            let blocker = match self.store.fetch_task(&edge.blocking_task_id)? {
                Some(task) => BlockingTask::from_task(&task),
                None => {
                    warn!(
                        edge = %edge.id,
                        blocker = %edge.blocking_task_id,
                        "blocking task missing from store"
                    );
                    BlockingTask::missing(edge.blocking_task_id)
                }
            };
            blockers.push(blocker);
        }

        let info = BlockingInfo::from_blockers(task_id.clone(), blockers);
        debug!(task = %task_id, blocked = info.is_blocked, "computed blocking info");
        Ok(info)
    }

    /// Unresolved tasks of a project that can start now
    pub fn ready_tasks(&self, project_id: &ProjectId) -> EngineResult<Vec<Task>> {
        Ok(self
            .project_blocking(project_id)?
            .into_iter()
            .filter(|(_, info)| info.can_start)
            .map(|(task, _)| task)
            .collect())
    }

    /// Unresolved tasks of a project that wait on other tasks
    pub fn blocked_tasks(&self, project_id: &ProjectId) -> EngineResult<Vec<BlockingInfo>> {
        Ok(self
            .project_blocking(project_id)?
            .into_iter()
            .filter(|(_, info)| info.is_blocked)
            .map(|(_, info)| info)
            .collect())
    }

    /// Blocking info for every unresolved task, from one pass over the
    /// project's tasks and edges
    fn project_blocking(&self, project_id: &ProjectId) -> EngineResult<Vec<(Task, BlockingInfo)>> {
        let tasks = self.store.list_project_tasks(project_id)?;
        let edges = self.store.list_edges_for_project(project_id)?;

        let by_id: HashMap<&TaskId, &Task> = tasks.iter().map(|t| (&t.id, t)).collect();
        let mut blockers: HashMap<&TaskId, Vec<BlockingTask>> = HashMap::new();
        for edge in edges.iter().filter(|e| e.is_blocking()) {
            let blocker = match by_id.get(&edge.blocking_task_id) {
                Some(task) => BlockingTask::from_task(task),
                None => BlockingTask::missing(edge.blocking_task_id.clone()),
            };
            blockers.entry(&edge.dependent_task_id).or_default().push(blocker);
        }

        let result = tasks
            .iter()
            .filter(|t| !t.status.is_resolved())
            .map(|task| {
                let info = BlockingInfo::from_blockers(
                    task.id.clone(),
                    blockers.remove(&task.id).unwrap_or_default(),
                );
                (task.clone(), info)
            })
            .collect();

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::domain::{DependencyEdge, DependencyType, EdgeKey, TaskStatus};
    use crate::storage::EdgeStore;

    #[test]
    fn dependent_is_blocked_until_blocker_done() {
        let engine = engine();
        let t1 = add_task(&engine, "alpha", "T1");
        let t2 = add_task(&engine, "alpha", "T2");
        engine.create_dependency(&t2.id, &t1.id, DependencyType::Blocks, None).unwrap();

        let info = engine.get_task_blocking_info(&t2.id).unwrap();
        assert!(info.is_blocked);
        assert!(!info.can_start);
        assert_eq!(info.blocked_by[0].id, t1.id);
        assert!(!engine.get_task_blocking_info(&t1.id).unwrap().is_blocked);

        set_status(&engine, &t1, TaskStatus::Done);
        assert!(engine.get_task_blocking_info(&t2.id).unwrap().can_start);
    }

    #[test]
    fn cancelled_blocker_resolves() {
        let engine = engine();
        let t1 = add_task(&engine, "alpha", "T1");
        let t2 = add_task(&engine, "alpha", "T2");
        engine.create_dependency(&t2.id, &t1.id, DependencyType::Blocks, None).unwrap();

        set_status(&engine, &t1, TaskStatus::Cancelled);
        assert!(!engine.get_task_blocking_info(&t2.id).unwrap().is_blocked);
    }

    #[test]
    fn unknown_task_not_found() {
        let engine = engine();
        let err = engine
            .get_task_blocking_info(&"t-0000000".parse().unwrap())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_blocker_record_still_blocks() {
        let engine = engine();
        let t2 = add_task(&engine, "alpha", "T2");
        let ghost = "t-0000000".parse().unwrap();
        // Written behind the engine's back
        let edge = DependencyEdge::new(
            project("alpha"),
            EdgeKey::new(t2.id.clone(), ghost, DependencyType::Blocks),
            None,
        );
        engine.store().insert_edge(&edge).unwrap();

        let info = engine.get_task_blocking_info(&t2.id).unwrap();
        assert!(info.is_blocked);
        assert!(info.blocked_by[0].title.is_none());
    }

    #[test]
    fn ready_and_blocked_lists() {
        let engine = engine();
        let design = add_task(&engine, "alpha", "Design");
        let build = add_task(&engine, "alpha", "Build");
        let ship = add_task(&engine, "alpha", "Ship");
        let done = add_task(&engine, "alpha", "Old");
        set_status(&engine, &done, TaskStatus::Done);

        engine.create_dependency(&build.id, &design.id, DependencyType::Blocks, None).unwrap();
        engine.create_dependency(&ship.id, &build.id, DependencyType::Blocks, None).unwrap();

        let ready: Vec<_> = engine
            .ready_tasks(&project("alpha"))
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ready, vec![design.id.clone()]);

        let blocked = engine.blocked_tasks(&project("alpha")).unwrap();
        assert_eq!(blocked.len(), 2);

        set_status(&engine, &design, TaskStatus::Done);
        let ready: Vec<_> = engine
            .ready_tasks(&project("alpha"))
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ready, vec![build.id]);
    }
}
