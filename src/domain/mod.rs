//! Domain models for depgraph
//!
//! Contains the graph and tree algorithms without any I/O concerns.

mod id;
mod task;
mod edge;
mod graph;
mod blocking;
mod hierarchy;

pub use id::{EdgeId, IdError, ProjectId, TaskId};
pub use task::{sibling_order, Task, TaskStatus};
pub use edge::{DependencyEdge, DependencyType, EdgeDirection, EdgeFilter, EdgeKey};
pub use graph::{
    cycle_path, find_cycles, would_create_cycle, BlockingGraph, DependencyGraph, GraphEdge,
};
pub use blocking::{BlockingInfo, BlockingTask};
pub use hierarchy::{is_descendant, SubtaskSummary, TaskTreeNode};
