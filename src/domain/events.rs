//! Step records kept while a workflow runs.
//!
//! Every step of a run, including steps of nested workflows, leaves one
//! record behind: either it executed or its condition skipped it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Run that owns the step (nested runs have their own id)
    pub run_id: Uuid,

    /// Workflow the step belongs to
    pub workflow: String,

    /// Step name (unique within the workflow)
    pub step: String,

    /// Outcome of the step
    pub outcome: StepOutcome,

    /// When the step was reached
    pub timestamp: DateTime<Utc>,

    /// Time taken in milliseconds (executed steps only)
    pub duration_ms: Option<u64>,
}

impl StepRecord {
    /// Record a step whose condition evaluated false
    pub fn skipped(run_id: Uuid, workflow: &str, step: &str) -> Self {
        Self {
            run_id,
            workflow: workflow.to_string(),
            step: step.to_string(),
            outcome: StepOutcome::Skipped,
            timestamp: Utc::now(),
            duration_ms: None,
        }
    }

    /// Record a step that ran to completion
    pub fn executed(run_id: Uuid, workflow: &str, step: &str, duration_ms: u64) -> Self {
        Self {
            run_id,
            workflow: workflow.to_string(),
            step: step.to_string(),
            outcome: StepOutcome::Executed,
            timestamp: Utc::now(),
            duration_ms: Some(duration_ms),
        }
    }
}

/// Outcome of a step within a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step ran and its outputs were merged
    Executed,

    /// The run condition was false; nothing was merged
    Skipped,
}
