//! Invocation surface: a generation request in, artifact paths and a status out.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{Orchestrator, Workflow, WorkflowError};
use crate::domain::{RunContext, RunReport, RunStatus};

use super::{
    Scope, KEY_AUDIENCE, KEY_CONTEXT, KEY_ENABLE_COMPETITORS, KEY_ENABLE_RESEARCH, KEY_SCOPE,
    KEY_SUBJECT, KEY_USER_PROMPT,
};

/// What the caller wants generated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub subject_name: String,
    pub context_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,

    /// Left empty to let the analysis decide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,

    #[serde(default)]
    pub enable_research: bool,

    #[serde(default)]
    pub enable_competitor_analysis: bool,
}

impl GenerationRequest {
    pub fn new(subject_name: impl Into<String>, context_description: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            context_description: context_description.into(),
            audience: None,
            user_prompt: None,
            scope: None,
            enable_research: false,
            enable_competitor_analysis: false,
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_user_prompt(mut self, user_prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(user_prompt.into());
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Enable market research and competitor analysis
    pub fn with_research(mut self, research: bool, competitors: bool) -> Self {
        self.enable_research = research;
        self.enable_competitor_analysis = competitors;
        self
    }

    /// Initial run parameters; absent optionals are left out entirely
    pub fn to_params(&self) -> RunContext {
        let mut params = RunContext::new();
        params.set(KEY_SUBJECT, self.subject_name.as_str());
        params.set(KEY_CONTEXT, self.context_description.as_str());
        if let Some(audience) = &self.audience {
            params.set(KEY_AUDIENCE, audience.as_str());
        }
        if let Some(user_prompt) = &self.user_prompt {
            params.set(KEY_USER_PROMPT, user_prompt.as_str());
        }
        if let Some(scope) = self.scope {
            params.set(KEY_SCOPE, scope.as_str());
        }
        params.set(KEY_ENABLE_RESEARCH, self.enable_research);
        params.set(KEY_ENABLE_COMPETITORS, self.enable_competitor_analysis);
        params
    }
}

/// What the caller gets back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Every artifact written by the run, nested runs included; empty on failure
    pub generated_artifact_paths: Vec<PathBuf>,

    #[serde(flatten)]
    pub status: RunStatus,
}

impl GenerationResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

impl From<RunReport> for GenerationResult {
    fn from(report: RunReport) -> Self {
        Self {
            generated_artifact_paths: report.artifact_paths(),
            status: RunStatus::Completed,
        }
    }
}

impl From<WorkflowError> for GenerationResult {
    fn from(err: WorkflowError) -> Self {
        let path = err.step_path();
        let step = if path.is_empty() {
            "<definition>".to_string()
        } else {
            path.join("/")
        };

        Self {
            generated_artifact_paths: Vec::new(),
            status: RunStatus::Failed {
                step,
                error: err.to_string(),
            },
        }
    }
}

/// Run `workflow` for `request` and fold the outcome into a result
pub async fn generate(
    orchestrator: &Orchestrator,
    workflow: &Workflow,
    request: &GenerationRequest,
) -> GenerationResult {
    info!(
        workflow = %workflow.name(),
        subject = %request.subject_name,
        invoker = orchestrator.invoker().name(),
        "Generation requested"
    );

    match orchestrator.run(workflow, request.to_params()).await {
        Ok(report) => {
            info!(
                workflow = %workflow.name(),
                artifacts = report.artifacts.len(),
                duration_ms = report.duration_ms(),
                "Generation completed"
            );
            report.into()
        }
        Err(err) => {
            warn!(workflow = %workflow.name(), error = %err, "Generation failed");
            err.into()
        }
    }
}
