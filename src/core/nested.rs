//! Nested workflow composition.
//!
//! A workflow used as a single step of a parent sees only the parent keys
//! its input projection names, and hands back only the keys its output
//! projection names. Nothing else crosses the boundary.

use std::sync::Arc;

use crate::domain::{ContextError, RunContext};

use super::error::DefinitionError;
use super::workflow::Workflow;

/// One key carried across a workflow boundary
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    /// Key read on the source side
    from: String,

    /// Key written on the destination side
    to: String,

    /// Absent optional keys are simply not carried
    required: bool,
}

/// Declared set of keys carried across a workflow boundary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    bindings: Vec<Binding>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry a required key, renaming it
    pub fn bind(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.bindings.push(Binding {
            from: from.into(),
            to: to.into(),
            required: true,
        });
        self
    }

    /// Carry a required key under the same name
    pub fn keep(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.bind(key.clone(), key)
    }

    /// Carry a key when present, renaming it
    pub fn optional(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.bindings.push(Binding {
            from: from.into(),
            to: to.into(),
            required: false,
        });
        self
    }

    /// Carry a key when present under the same name
    pub fn keep_optional(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.optional(key.clone(), key)
    }

    /// Keys read on the source side
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.from.as_str())
    }

    /// Keys written on the destination side
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.to.as_str())
    }

    /// Build a fresh context from `source` holding only the projected keys
    pub fn apply(&self, source: &RunContext) -> Result<RunContext, ContextError> {
        let mut projected = RunContext::new();

        for binding in &self.bindings {
            let value = if binding.required {
                source.get(&binding.from)?
            } else {
                match source.get_opt(&binding.from) {
                    Some(value) => value,
                    None => continue,
                }
            };
            projected.set(binding.to.clone(), value.clone());
        }

        Ok(projected)
    }
}

/// A workflow run as the executor of a parent step
#[derive(Debug, Clone)]
pub struct NestedWorkflow {
    workflow: Arc<Workflow>,
    inputs: Projection,
    outputs: Projection,
}

impl NestedWorkflow {
    /// Wrap `workflow`; every output source must be something it returns
    pub fn new(
        workflow: Arc<Workflow>,
        inputs: Projection,
        outputs: Projection,
    ) -> Result<Self, DefinitionError> {
        for key in outputs.sources() {
            if !workflow.returns_key(key) {
                return Err(DefinitionError::UnknownReturnKey {
                    workflow: workflow.name().to_string(),
                    key: key.to_string(),
                });
            }
        }

        Ok(Self {
            workflow,
            inputs,
            outputs,
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn inputs(&self) -> &Projection {
        &self.inputs
    }

    pub fn outputs(&self) -> &Projection {
        &self.outputs
    }
}
