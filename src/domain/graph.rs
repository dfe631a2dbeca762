//! Blocking graph and cycle detection
//!
//! Holds the blocking subgraph of a set of dependency edges with edge
//! direction `blocking -> dependent`. Adding a candidate edge
//! `blocking -> dependent` creates a cycle iff `blocking` is already
//! reachable from `dependent`.
//!
//! The graph is rebuilt from the edge store on every call. Every traversal
//! keeps a visited set so it terminates even over data that already
//! contains a cycle. Uses petgraph for SCC and topological ordering.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::edge::{DependencyEdge, DependencyType, EdgeKey};
use super::id::{ProjectId, TaskId};

/// Directed graph of blocking relationships
#[derive(Debug, Default)]
pub struct BlockingGraph {
    /// The underlying directed graph (blocking -> dependent)
    graph: DiGraph<TaskId, ()>,

    /// Map from TaskId to node index
    node_map: HashMap<TaskId, NodeIndex>,
}

impl BlockingGraph {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds the blocking subgraph of a collection of edges.
    ///
    /// `RELATES_TO` edges are skipped. Edges are inserted in a stable order
    /// so traversal results do not depend on store iteration order.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a DependencyEdge>) -> Self {
        let mut pairs: Vec<(&TaskId, &TaskId)> = edges
            .into_iter()
            .filter(|edge| edge.is_blocking())
            .map(|edge| (&edge.blocking_task_id, &edge.dependent_task_id))
            .collect();
        pairs.sort();

        let mut graph = Self::new();
        for (blocking, dependent) in pairs {
            graph.insert_edge(blocking, dependent);
        }
        graph
    }

    /// Adds a task to the graph, returning its node
    pub fn add_task(&mut self, task_id: &TaskId) -> NodeIndex {
        if let Some(idx) = self.node_map.get(task_id) {
            return *idx;
        }
        let idx = self.graph.add_node(task_id.clone());
        self.node_map.insert(task_id.clone(), idx);
        idx
    }

    /// Inserts `blocking -> dependent` without validation.
    ///
    /// Used to assemble hypothetical graphs; duplicate edges collapse.
    pub fn insert_edge(&mut self, blocking: &TaskId, dependent: &TaskId) {
        let from = self.add_task(blocking);
        let to = self.add_task(dependent);
        self.graph.update_edge(from, to, ());
    }

    /// Inserts a canonical key if it is a blocking edge
    pub fn insert_key(&mut self, key: &EdgeKey) {
        if key.dep_type.is_blocking() {
            self.insert_edge(&key.blocking_task_id, &key.dependent_task_id);
        }
    }

    /// Returns true if adding `blocking -> dependent` would close a cycle
    pub fn would_create_cycle(&self, dependent: &TaskId, blocking: &TaskId) -> bool {
        self.cycle_path(dependent, blocking).is_some()
    }

    /// Returns the cycle that adding `blocking -> dependent` would close.
    ///
    /// The path reads `blocking -> dependent -> ... -> blocking`.
    pub fn cycle_path(&self, dependent: &TaskId, blocking: &TaskId) -> Option<Vec<TaskId>> {
        if dependent == blocking {
            return Some(vec![blocking.clone(), dependent.clone()]);
        }

        let start = *self.node_map.get(dependent)?;
        let target = *self.node_map.get(blocking)?;

        // BFS from `dependent` looking for `blocking`
        let mut queue: VecDeque<NodeIndex> = VecDeque::from([start]);
        let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();

        while let Some(current) = queue.pop_front() {
            if current == target {
                return Some(self.reconstruct_path(start, target, &parent));
            }

            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if visited.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }

        None
    }

    fn reconstruct_path(
        &self,
        start: NodeIndex,
        target: NodeIndex,
        parent: &HashMap<NodeIndex, NodeIndex>,
    ) -> Vec<TaskId> {
        // Parent links run target -> ... -> start
        let mut nodes = vec![target];
        let mut cursor = target;
        while cursor != start {
            match parent.get(&cursor) {
                Some(prev) => {
                    cursor = *prev;
                    nodes.push(cursor);
                }
                None => break,
            }
        }
        nodes.reverse();

        let mut path = Vec::with_capacity(nodes.len() + 1);
        path.push(self.node_id(target));
        path.extend(nodes.into_iter().map(|idx| self.node_id(idx)));
        path
    }

    fn node_id(&self, idx: NodeIndex) -> TaskId {
        self.graph[idx].clone()
    }

    /// Finds strongly connected components with more than one task.
    ///
    /// Each component is sorted, and the list of components is sorted.
    /// Empty whenever the DAG invariant holds.
    pub fn find_cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut ids: Vec<TaskId> =
                    component.into_iter().map(|idx| self.node_id(idx)).collect();
                ids.sort();
                ids
            })
            .collect();

        cycles.sort();
        cycles
    }

    /// Returns all tasks in topological order (blockers before dependents),
    /// or None if the graph is cyclic
    pub fn topological_order(&self) -> Option<Vec<TaskId>> {
        toposort(&self.graph, None)
            .ok()
            .map(|order| order.into_iter().map(|idx| self.node_id(idx)).collect())
    }
}

/// Decides whether adding `candidate` to `edges` would create a cycle.
///
/// Non-blocking candidates never do.
pub fn would_create_cycle(edges: &[DependencyEdge], candidate: &EdgeKey) -> bool {
    cycle_path(edges, candidate).is_some()
}

/// Returns the path `candidate` would close, if any
pub fn cycle_path(edges: &[DependencyEdge], candidate: &EdgeKey) -> Option<Vec<TaskId>> {
    if !candidate.dep_type.is_blocking() {
        return None;
    }
    BlockingGraph::from_edges(edges)
        .cycle_path(&candidate.dependent_task_id, &candidate.blocking_task_id)
}

/// Cycles already present in a set of edges
pub fn find_cycles(edges: &[DependencyEdge]) -> Vec<Vec<TaskId>> {
    BlockingGraph::from_edges(edges).find_cycles()
}

/// An edge of the graph report, drawn from blocker to dependent.
///
/// Carries no edge ID, so the report depends only on graph content.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: TaskId,
    pub to: TaskId,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}

/// Snapshot of a project's dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub project_id: ProjectId,

    /// Every task touched by an edge, sorted
    pub nodes: Vec<TaskId>,

    /// All edges, including `RELATES_TO`, sorted by endpoints then type
    pub edges: Vec<GraphEdge>,

    /// Strongly connected components of the blocking subgraph. Empty
    /// whenever the stored data is consistent.
    pub cycles: Vec<Vec<TaskId>>,

    /// Blockers before dependents; empty when `cycles` is not
    pub topological_order: Vec<TaskId>,
}

impl DependencyGraph {
    pub fn from_edges(project_id: ProjectId, edges: &[DependencyEdge]) -> Self {
        let nodes: BTreeSet<TaskId> = edges
            .iter()
            .flat_map(|e| [e.dependent_task_id.clone(), e.blocking_task_id.clone()])
            .collect();

        let blocking = BlockingGraph::from_edges(edges);
        let cycles = blocking.find_cycles();
        let topological_order = if cycles.is_empty() {
            blocking.topological_order().unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut report_edges: Vec<GraphEdge> = edges
            .iter()
            .map(|e| GraphEdge {
                from: e.blocking_task_id.clone(),
                to: e.dependent_task_id.clone(),
                dep_type: e.dep_type,
            })
            .collect();
        report_edges.sort();

        Self {
            project_id,
            nodes: nodes.into_iter().collect(),
            edges: report_edges,
            cycles,
            topological_order,
        }
    }

    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }
}
