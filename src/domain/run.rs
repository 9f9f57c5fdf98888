//! Run reports returned by the orchestrator.
//!
//! A report only exists for a successful run: any step failure aborts the
//! run and surfaces as an error instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::Artifact;
use super::context::RunContext;
use super::events::{StepOutcome, StepRecord};

/// Result of one completed workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Name of the workflow that ran
    pub workflow_name: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed
    pub completed_at: DateTime<Utc>,

    /// Final context, or the workflow's declared return subset
    pub context: RunContext,

    /// Artifacts written by this run and its nested runs, in write order
    pub artifacts: Vec<Artifact>,

    /// One record per step reached, nested runs included
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Paths of every artifact written during the run
    pub fn artifact_paths(&self) -> Vec<std::path::PathBuf> {
        self.artifacts.iter().map(|a| a.path.clone()).collect()
    }

    /// Find the record of a step by workflow and step name
    pub fn step(&self, workflow: &str, step: &str) -> Option<&StepRecord> {
        self.steps
            .iter()
            .find(|r| r.workflow == workflow && r.step == step)
    }

    /// Check whether a step executed (searching nested runs too)
    pub fn executed(&self, step: &str) -> bool {
        self.steps
            .iter()
            .any(|r| r.step == step && r.outcome == StepOutcome::Executed)
    }

    /// Check whether a step was skipped (searching nested runs too)
    pub fn skipped(&self, step: &str) -> bool {
        self.steps
            .iter()
            .any(|r| r.step == step && r.outcome == StepOutcome::Skipped)
    }

    /// Total run time in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

/// Final status reported at the invocation surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Every step completed
    Completed,

    /// A step failed and the run was aborted
    Failed { step: String, error: String },
}
