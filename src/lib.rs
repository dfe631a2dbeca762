//! depgraph - a task dependency and hierarchy engine
//!
//! Tasks live in projects and form a parent/child tree. Dependency edges
//! between tasks of the same project say which task must finish before
//! another can start. The engine keeps every project's blocking graph
//! acyclic, answers "can this task start?", and rolls subtask estimates up
//! to their parent.
//!
//! Layers, bottom up:
//! - [`domain`]: ids, tasks, edges and the pure graph algorithms
//! - [`storage`]: store traits, the SQLite and in-memory stores, project locks, config
//! - [`engine`]: validated operations over any store
//! - [`cli`]: the `depgraph` binary

pub mod domain;
pub mod storage;
pub mod engine;
pub mod cli;

pub use domain::{DependencyEdge, DependencyType, EdgeId, ProjectId, Task, TaskId, TaskStatus};
pub use engine::{Engine, EngineError, ErrorKind};
