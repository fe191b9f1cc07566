// src/dag/mod.rs

//! Task DAG representation and planning.
//!
//! - [`task`] defines task specs and registered tasks.
//! - [`template`] renders invocation templates against parameters.
//! - [`graph`] holds the index-based dependency graph.
//! - [`registry`] builds and validates the immutable task registry.
//! - [`scheduler`] turns a target into an [`ExecutionPlan`].

pub mod graph;
pub mod plan;
pub mod registry;
pub mod scheduler;
pub mod task;
pub mod template;

pub use graph::DagGraph;
pub use plan::{ExecutionPlan, PlannedTask};
pub use registry::{Registry, RegistryBuilder};
pub use scheduler::Scheduler;
pub use task::{Invocation, Task, TaskSpec};
