//! Domain types for the docflow orchestrator.
//!
//! This module contains the core data structures:
//! - Context: Values threaded between steps of a run
//! - Events: Per-step records of a run
//! - Run: Reports of completed runs
//! - Artifact: Persisted documents

pub mod artifact;
pub mod context;
pub mod events;
pub mod run;

// Re-export commonly used types
pub use artifact::{content_digest, Artifact};
pub use context::{ContextError, RunContext, Value};
pub use events::{StepOutcome, StepRecord};
pub use run::{RunReport, RunStatus};
