//! Core orchestration logic.
//!
//! This module contains:
//! - Step: Step definitions, conditions and executors
//! - Workflow: Validated, ordered step lists
//! - Nested: Projections for workflows run as steps
//! - ArtifactWriter: Timestamped document persistence
//! - Orchestrator: Main execution engine

pub mod artifact_writer;
pub mod error;
pub mod nested;
pub mod orchestrator;
pub mod step;
pub mod workflow;

// Re-export commonly used types
pub use artifact_writer::{
    logical_name_of, slugify, ArtifactError, ArtifactWriter, Clock, CollisionPolicy, FixedClock,
    SystemClock,
};
pub use error::{DefinitionError, StepError, WorkflowError};
pub use nested::{NestedWorkflow, Projection};
pub use orchestrator::Orchestrator;
pub use step::{
    content_key, output, path_key, ArtifactSpec, Condition, Executor, Prompt, Step, StepOutput,
};
pub use workflow::Workflow;
