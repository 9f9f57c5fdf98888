//! Step definitions.
//!
//! A step is built once when its workflow is defined and never changes
//! afterwards. It names the keys it writes, an optional run condition, and
//! one of three executors: a direct transform, a capability call or a
//! nested workflow.

use std::fmt;
use std::sync::Arc;

use crate::domain::{ContextError, RunContext, Value};

use super::error::StepError;
use super::nested::NestedWorkflow;

/// Values a step hands back for merging into the run context
pub type StepOutput = RunContext;

/// Run condition predicate
pub type Predicate = dyn Fn(&RunContext) -> Result<bool, ContextError> + Send + Sync;

/// Direct transformation of the context into outputs
pub type TransformFn = dyn Fn(&RunContext) -> Result<StepOutput, StepError> + Send + Sync;

/// Builds the prompt for a capability call
pub type PromptFn = dyn Fn(&RunContext) -> Result<Prompt, ContextError> + Send + Sync;

/// Key under which a step stores its generated text
pub fn content_key(step_name: &str) -> String {
    format!("{}_content", step_name)
}

/// Key under which an artifact-producing step stores its file path
pub fn path_key(step_name: &str) -> String {
    format!("{}_path", step_name)
}

/// Whether a step runs, evaluated against the context at execution time
#[derive(Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    When(Arc<Predicate>),
}

impl Condition {
    /// Run only when the predicate holds
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&RunContext) -> Result<bool, ContextError> + Send + Sync + 'static,
    {
        Self::When(Arc::new(predicate))
    }

    /// Run only when a text key equals `expected`; a missing key is an error
    pub fn text_equals(key: impl Into<String>, expected: impl Into<String>) -> Self {
        let key = key.into();
        let expected = expected.into();
        Self::when(move |ctx| Ok(ctx.get_text(&key)? == expected))
    }

    /// Run only when a flag is set; an absent flag counts as unset
    pub fn flag(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::when(move |ctx| match ctx.get_opt(&key) {
            None => Ok(false),
            Some(_) => ctx.get_flag(&key),
        })
    }

    /// Run only when a key is absent
    pub fn missing(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::when(move |ctx| Ok(!ctx.contains(&key)))
    }

    pub fn evaluate(&self, ctx: &RunContext) -> Result<bool, ContextError> {
        match self {
            Self::Always => Ok(true),
            Self::When(predicate) => predicate(ctx),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Prompt handed to the capability invoker
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub context: serde_json::Value,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: serde_json::Value::Null,
        }
    }

    /// Attach structured context data
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// What a step does when it runs
#[derive(Clone)]
pub enum Executor {
    /// Pure function of the context
    Transform(Arc<TransformFn>),

    /// One call to the capability invoker
    CapabilityCall {
        role: String,
        prompt: Arc<PromptFn>,
        output_key: String,
    },

    /// A whole workflow run with explicit projections in and out
    Nested(NestedWorkflow),
}

impl Executor {
    /// Short label for logs and listings
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transform(_) => "transform",
            Self::CapabilityCall { .. } => "capability",
            Self::Nested(_) => "nested",
        }
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform(_) => f.write_str("Transform(..)"),
            Self::CapabilityCall {
                role, output_key, ..
            } => f
                .debug_struct("CapabilityCall")
                .field("role", role)
                .field("output_key", output_key)
                .finish(),
            Self::Nested(nested) => f
                .debug_tuple("Nested")
                .field(&nested.workflow().name())
                .finish(),
        }
    }
}

/// Artifact declaration of a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    /// File name prefix (e.g. "prd")
    pub logical_name: String,

    /// Context key holding the subject the file is named after
    pub subject_key: String,
}

/// A single step in a workflow
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    description: String,
    condition: Condition,
    executor: Executor,
    outputs: Vec<String>,
    artifact: Option<ArtifactSpec>,
}

impl Step {
    fn with_executor(name: impl Into<String>, executor: Executor, outputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            condition: Condition::Always,
            executor,
            outputs,
            artifact: None,
        }
    }

    /// Step running a direct transform that writes the declared keys
    pub fn transform<I, K, F>(name: impl Into<String>, outputs: I, transform: F) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
        F: Fn(&RunContext) -> Result<StepOutput, StepError> + Send + Sync + 'static,
    {
        let outputs = outputs.into_iter().map(Into::into).collect();
        Self::with_executor(name, Executor::Transform(Arc::new(transform)), outputs)
    }

    /// Step calling the capability invoker; the text lands in `<name>_content`
    pub fn capability<F>(name: impl Into<String>, role: impl Into<String>, prompt: F) -> Self
    where
        F: Fn(&RunContext) -> Result<Prompt, ContextError> + Send + Sync + 'static,
    {
        let name = name.into();
        let output_key = content_key(&name);
        let executor = Executor::CapabilityCall {
            role: role.into(),
            prompt: Arc::new(prompt),
            output_key: output_key.clone(),
        };
        Self::with_executor(name, executor, vec![output_key])
    }

    /// Step running a nested workflow; writes the output projection's targets
    pub fn nested(name: impl Into<String>, nested: NestedWorkflow) -> Self {
        let outputs = nested.outputs().targets().map(str::to_string).collect();
        Self::with_executor(name, Executor::Nested(nested), outputs)
    }

    /// Attach a run condition
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Attach a human-readable description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Persist `<name>_content` as an artifact and record `<name>_path`
    pub fn produces_artifact(
        mut self,
        logical_name: impl Into<String>,
        subject_key: impl Into<String>,
    ) -> Self {
        for key in [self.content_key(), self.path_key()] {
            if !self.outputs.contains(&key) {
                self.outputs.push(key);
            }
        }
        self.artifact = Some(ArtifactSpec {
            logical_name: logical_name.into(),
            subject_key: subject_key.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Keys this step may write
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn artifact(&self) -> Option<&ArtifactSpec> {
        self.artifact.as_ref()
    }

    pub fn content_key(&self) -> String {
        content_key(&self.name)
    }

    pub fn path_key(&self) -> String {
        path_key(&self.name)
    }

    /// Evaluate the run condition; a failing predicate fails the step
    pub fn should_run(&self, ctx: &RunContext) -> Result<bool, StepError> {
        self.condition.evaluate(ctx).map_err(StepError::Condition)
    }

    /// Reject outputs the step never declared
    pub fn check_outputs(&self, output: &StepOutput) -> Result<(), StepError> {
        match output.keys().find(|key| !self.outputs.iter().any(|o| o.as_str() == *key)) {
            Some(key) => Err(StepError::UndeclaredOutput {
                key: key.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Build a step output from key/value pairs
pub fn output<I, K, V>(values: I) -> StepOutput
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    RunContext::from_params(values)
}
