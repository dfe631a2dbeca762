//! Project graph reports

use tracing::{debug, warn};

use super::{Engine, EngineResult};
use crate::domain::{DependencyGraph, ProjectId};
use crate::storage::{EdgeStore, TaskStore};

impl<S> Engine<S>
where
    S: TaskStore + EdgeStore,
{
    /// Snapshots a project's edges. Cycles found in stored data are
    /// reported, not repaired.
    pub fn generate_dependency_graph(&self, project_id: &ProjectId) -> EngineResult<DependencyGraph> {
        let edges = self.store.list_edges_for_project(project_id)?;
        let graph = DependencyGraph::from_edges(project_id.clone(), &edges);

        if !graph.is_acyclic() {
            warn!(
                project = %project_id,
                cycles = graph.cycles.len(),
                "stored dependencies contain cycles"
            );
        }

        debug!(
            project = %project_id,
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "generated dependency graph"
        );
        Ok(graph)
    }
}
