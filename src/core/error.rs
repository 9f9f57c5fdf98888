//! Error taxonomy for workflow definition and execution.

use thiserror::Error;

use crate::adapters::CapabilityError;
use crate::domain::ContextError;

use super::artifact_writer::ArtifactError;

/// Why a single step failed
#[derive(Debug, Error)]
pub enum StepError {
    #[error("missing context key '{key}'")]
    MissingKey { key: String },

    #[error("context key '{key}' holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("run condition could not be evaluated: {0}")]
    Condition(#[source] ContextError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("step produced undeclared output key '{key}'")]
    UndeclaredOutput { key: String },

    #[error("artifact step produced no text under '{key}'")]
    MissingOutput { key: String },

    #[error("{0}")]
    Transform(String),

    #[error("nested {0}")]
    Nested(#[source] Box<WorkflowError>),
}

impl From<ContextError> for StepError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::MissingKey { key } => Self::MissingKey { key },
            ContextError::TypeMismatch {
                key,
                expected,
                found,
            } => Self::TypeMismatch {
                key,
                expected,
                found,
            },
        }
    }
}

/// A workflow that cannot be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("workflow name cannot be empty")]
    EmptyName,

    #[error("workflow '{workflow}' must have at least one step")]
    NoSteps { workflow: String },

    #[error("workflow '{workflow}' has a step with an empty name at index {index}")]
    EmptyStepName { workflow: String, index: usize },

    #[error("workflow '{workflow}' declares step '{step}' more than once")]
    DuplicateStep { workflow: String, step: String },

    #[error("workflow '{workflow}': output key '{key}' is declared by both '{first}' and '{second}'")]
    OutputCollision {
        workflow: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("workflow '{workflow}' returns '{key}' but no step declares it")]
    UnknownReturnKey { workflow: String, key: String },
}

/// Failure of a workflow run or definition
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow '{workflow}' failed at step '{step}': {source}")]
    Step {
        workflow: String,
        step: String,
        #[source]
        source: StepError,
    },

    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

impl WorkflowError {
    /// Name of the failing step in the outermost workflow
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Step { step, .. } => Some(step),
            Self::Definition(_) => None,
        }
    }

    /// Names of the failing steps from the outermost workflow inwards
    pub fn step_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;

        while let Self::Step { step, source, .. } = current {
            path.push(step.as_str());
            match source {
                StepError::Nested(inner) => current = &**inner,
                _ => break,
            }
        }

        path
    }

    /// The step error at the bottom of any nesting
    pub fn root_cause(&self) -> Option<&StepError> {
        match self {
            Self::Step {
                source: StepError::Nested(inner),
                ..
            } => inner.root_cause(),
            Self::Step { source, .. } => Some(source),
            Self::Definition(_) => None,
        }
    }

    /// Check if the run failed because an artifact path already existed
    pub fn is_artifact_collision(&self) -> bool {
        matches!(
            self.root_cause(),
            Some(StepError::Artifact(ArtifactError::Collision { .. }))
        )
    }
}
