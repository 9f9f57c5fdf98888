//! docflow - Nested workflow engine for product documents
//!
//! Turns a short product or feature request into requirements,
//! architecture, code and review documents by running ordered workflows of
//! steps against a capability invoker (Fabric, the Anthropic API or an
//! offline echo).
//!
//! # Architecture
//!
//! - A workflow is an ordered list of steps built once and never mutated
//! - Each step reads a shared run context and writes only the keys it declares
//! - Steps run conditionally, call one collaborator at most, and may run a
//!   whole workflow as a nested step with explicit key projections
//! - Selected outputs are persisted as timestamped markdown artifacts
//!
//! # Modules
//!
//! - `adapters`: Capability invokers (Fabric, Anthropic, echo)
//! - `core`: Orchestration logic (Step, Workflow, Orchestrator, ArtifactWriter)
//! - `domain`: Data structures (RunContext, Artifact, RunReport)
//! - `workflows`: Bundled document workflows and the request surface
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # PRD, architecture and ticket for a new product
//! docflow generate "Blog Scheduler" --context "schedule posts" --scope product --research
//!
//! # Dry run without a backend
//! docflow --backend echo discover "Dark Mode" --context "theme toggle"
//!
//! # Implement a ticket, revising until code and security reviews approve
//! docflow implement "Blog Scheduler" --task "queue posts" --architecture-file ticket.md
//!
//! # List generated PRDs
//! docflow artifacts --prefix prd
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod workflows;

// Re-export main types at crate root for convenience
pub use adapters::{CapabilityError, CapabilityInvoker};
pub use core::{ArtifactWriter, Orchestrator, Step, Workflow, WorkflowError};
pub use domain::{Artifact, RunContext, RunReport, RunStatus, Value};
pub use workflows::{generate, Catalog, GenerationRequest, GenerationResult, Scope};
