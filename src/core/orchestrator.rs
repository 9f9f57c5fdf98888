//! Main orchestrator for workflow execution.
//!
//! Runs the steps of a workflow strictly in order, evaluating each run
//! condition against the live context, dispatching the step's executor,
//! persisting artifacts and merging outputs. The first failure aborts the
//! run; artifacts written before it stay on disk.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::adapters::CapabilityInvoker;
use crate::domain::{Artifact, RunContext, RunReport, StepRecord};

use super::artifact_writer::ArtifactWriter;
use super::error::{StepError, WorkflowError};
use super::step::{Executor, Step, StepOutput};
use super::workflow::Workflow;

type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<RunReport, WorkflowError>> + Send + 'a>>;

/// What a step hands back besides its values
#[derive(Debug, Default)]
struct StepResult {
    values: StepOutput,
    artifacts: Vec<Artifact>,
    records: Vec<StepRecord>,
}

impl StepResult {
    fn values(values: StepOutput) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }
}

/// Main workflow orchestrator
pub struct Orchestrator {
    /// Text generation backend
    invoker: Arc<dyn CapabilityInvoker>,

    /// Artifact persistence
    writer: ArtifactWriter,
}

impl Orchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(invoker: Arc<dyn CapabilityInvoker>, writer: ArtifactWriter) -> Self {
        Self { invoker, writer }
    }

    pub fn invoker(&self) -> &dyn CapabilityInvoker {
        self.invoker.as_ref()
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Execute a workflow with the given initial parameters
    #[instrument(skip(self, workflow, params), fields(workflow = %workflow.name()))]
    pub async fn run(
        &self,
        workflow: &Workflow,
        params: RunContext,
    ) -> Result<RunReport, WorkflowError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, steps = workflow.steps().len(), "Starting workflow run");

        let mut context = params;
        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut records: Vec<StepRecord> = Vec::new();

        for step in workflow.steps() {
            let should_run = step
                .should_run(&context)
                .map_err(|e| self.step_failed(workflow, step, e))?;

            if !should_run {
                info!(step = %step.name(), "Condition false, skipping step");
                records.push(StepRecord::skipped(run_id, workflow.name(), step.name()));
                continue;
            }

            let step_start = Instant::now();
            debug!(step = %step.name(), kind = step.executor().kind(), "Executing step");

            let result = self
                .complete_step(step, &context)
                .await
                .map_err(|e| self.step_failed(workflow, step, e))?;

            let duration_ms = step_start.elapsed().as_millis() as u64;
            info!(step = %step.name(), duration_ms, "Step completed");

            artifacts.extend(result.artifacts);
            records.extend(result.records);
            records.push(StepRecord::executed(
                run_id,
                workflow.name(),
                step.name(),
                duration_ms,
            ));
            context.merge(result.values);
        }

        info!(%run_id, artifacts = artifacts.len(), "Workflow run completed");

        Ok(RunReport {
            id: run_id,
            workflow_name: workflow.name().to_string(),
            started_at,
            completed_at: Utc::now(),
            context: workflow.returned(context),
            artifacts,
            steps: records,
        })
    }

    /// Boxed entry point for runs started from inside another run
    fn run_nested<'a>(&'a self, workflow: &'a Workflow, params: RunContext) -> RunFuture<'a> {
        Box::pin(self.run(workflow, params))
    }

    /// Execute a step, persist its artifact and check its outputs
    async fn complete_step(
        &self,
        step: &Step,
        context: &RunContext,
    ) -> Result<StepResult, StepError> {
        let mut result = self.execute_step(step, context).await?;
        step.check_outputs(&result.values)?;

        if let Some(spec) = step.artifact() {
            let content_key = step.content_key();
            let content = result
                .values
                .get_text_opt(&content_key)?
                .ok_or(StepError::MissingOutput { key: content_key })?;

            let subject = match result.values.get_text_opt(&spec.subject_key)? {
                Some(subject) => subject,
                None => context.get_text(&spec.subject_key)?,
            };

            let artifact = self
                .writer
                .write(&spec.logical_name, subject, content)
                .await?;

            result.values.set(step.path_key(), artifact.path.clone());
            result.artifacts.push(artifact);
        }

        Ok(result)
    }

    /// Dispatch on the step's executor
    async fn execute_step(
        &self,
        step: &Step,
        context: &RunContext,
    ) -> Result<StepResult, StepError> {
        match step.executor() {
            Executor::Transform(transform) => Ok(StepResult::values(transform(context)?)),

            Executor::CapabilityCall {
                role,
                prompt,
                output_key,
            } => {
                let prompt = prompt(context)?;
                debug!(step = %step.name(), role = %role, invoker = self.invoker.name(), "Invoking capability");

                let text = self
                    .invoker
                    .invoke(role, &prompt.text, &prompt.context)
                    .await?;

                let mut values = StepOutput::new();
                values.set(output_key.clone(), text);
                Ok(StepResult::values(values))
            }

            Executor::Nested(nested) => {
                let params = nested.inputs().apply(context)?;
                debug!(
                    step = %step.name(),
                    child = %nested.workflow().name(),
                    keys = params.len(),
                    "Starting nested workflow"
                );

                let report = self
                    .run_nested(nested.workflow(), params)
                    .await
                    .map_err(|e| StepError::Nested(Box::new(e)))?;

                Ok(StepResult {
                    values: nested.outputs().apply(&report.context)?,
                    artifacts: report.artifacts,
                    records: report.steps,
                })
            }
        }
    }

    /// Annotate a step error with where it happened
    fn step_failed(&self, workflow: &Workflow, step: &Step, source: StepError) -> WorkflowError {
        error!(step = %step.name(), error = %source, "Step failed");
        WorkflowError::Step {
            workflow: workflow.name().to_string(),
            step: step.name().to_string(),
            source,
        }
    }
}
