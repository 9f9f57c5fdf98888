//! Workflow definitions.
//!
//! A workflow is an ordered list of steps plus an optional declared return
//! subset. Definitions are validated when built: step names must be unique
//! and no two steps may declare the same output key.

use std::collections::HashMap;

use crate::domain::RunContext;

use super::error::DefinitionError;
use super::step::Step;

/// A complete workflow definition
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Workflow name (used in logs and errors)
    name: String,

    /// Human-readable description
    description: String,

    /// Ordered list of steps to execute
    steps: Vec<Step>,

    /// Keys handed back to the caller; `None` returns the whole context
    returns: Option<Vec<String>>,
}

impl Workflow {
    /// Build and validate a workflow
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Result<Self, DefinitionError> {
        let workflow = Self {
            name: name.into(),
            description: String::new(),
            steps,
            returns: None,
        };
        workflow.validate()?;
        Ok(workflow)
    }

    /// Attach a human-readable description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Restrict what the run hands back to the listed keys
    pub fn returning<I, K>(mut self, keys: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();

        for key in &keys {
            if self.declaring_step(key).is_none() {
                return Err(DefinitionError::UnknownReturnKey {
                    workflow: self.name.clone(),
                    key: key.clone(),
                });
            }
        }

        self.returns = Some(keys);
        Ok(self)
    }

    /// Validate the workflow definition
    fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }

        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps {
                workflow: self.name.clone(),
            });
        }

        let mut step_names: Vec<&str> = Vec::with_capacity(self.steps.len());
        let mut owners: HashMap<&str, &str> = HashMap::new();

        for (index, step) in self.steps.iter().enumerate() {
            if step.name().is_empty() {
                return Err(DefinitionError::EmptyStepName {
                    workflow: self.name.clone(),
                    index,
                });
            }

            if step_names.contains(&step.name()) {
                return Err(DefinitionError::DuplicateStep {
                    workflow: self.name.clone(),
                    step: step.name().to_string(),
                });
            }
            step_names.push(step.name());

            for key in step.outputs() {
                if let Some(first) = owners.insert(key.as_str(), step.name()) {
                    return Err(DefinitionError::OutputCollision {
                        workflow: self.name.clone(),
                        key: key.clone(),
                        first: first.to_string(),
                        second: step.name().to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Declared return subset, if any
    pub fn returns(&self) -> Option<&[String]> {
        self.returns.as_deref()
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name() == name)
    }

    /// Get the index of a step by name
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name() == name)
    }

    /// Step that declares `key` as an output
    pub fn declaring_step(&self, key: &str) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.outputs().iter().any(|o| o == key))
    }

    /// Whether a completed run can hand `key` back to its caller
    pub fn returns_key(&self, key: &str) -> bool {
        match &self.returns {
            Some(keys) => keys.iter().any(|k| k == key),
            None => self.declaring_step(key).is_some(),
        }
    }

    /// Reduce a final context to what the workflow hands back
    pub fn returned(&self, context: RunContext) -> RunContext {
        match &self.returns {
            Some(keys) => context.subset(keys.iter().map(String::as_str)),
            None => context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::step::{output, Prompt};
    use crate::domain::ContextError;

    fn emit(name: &str, key: &'static str) -> Step {
        Step::transform(name, [key], move |_| Ok(output([(key, "x")])))
    }

    #[test]
    fn test_valid_workflow() {
        let workflow = Workflow::new("demo", vec![emit("first", "a"), emit("second", "b")])
            .unwrap()
            .with_description("Demo workflow");

        assert_eq!(workflow.name(), "demo");
        assert_eq!(workflow.steps().len(), 2);
        assert_eq!(workflow.step_index("second"), Some(1));
        assert!(workflow.get_step("third").is_none());
        assert_eq!(workflow.declaring_step("b").unwrap().name(), "second");
    }

    #[test]
    fn test_empty_workflow_rejected() {
        assert_eq!(
            Workflow::new("empty", Vec::new()).unwrap_err(),
            DefinitionError::NoSteps {
                workflow: "empty".to_string()
            }
        );
        assert_eq!(
            Workflow::new("", vec![emit("first", "a")]).unwrap_err(),
            DefinitionError::EmptyName
        );
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let err = Workflow::new("dup", vec![emit("same", "a"), emit("same", "b")]).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateStep { step, .. } if step == "same"));
    }

    #[test]
    fn test_output_collision_rejected() {
        let err = Workflow::new("clash", vec![emit("first", "shared"), emit("second", "shared")])
            .unwrap_err();

        assert_eq!(
            err,
            DefinitionError::OutputCollision {
                workflow: "clash".to_string(),
                key: "shared".to_string(),
                first: "first".to_string(),
                second: "second".to_string(),
            }
        );
    }

    #[test]
    fn test_capability_steps_collide_on_content_key() {
        let prompt = |_: &RunContext| -> Result<Prompt, ContextError> { Ok(Prompt::new("x")) };
        let err = Workflow::new(
            "clash",
            vec![
                Step::capability("analysis", "analyst", prompt),
                emit("rewrite", "analysis_content"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, DefinitionError::OutputCollision { key, .. } if key == "analysis_content"));
    }

    #[test]
    fn test_returning_subset() {
        let workflow = Workflow::new("demo", vec![emit("first", "a"), emit("second", "b")])
            .unwrap()
            .returning(["b"])
            .unwrap();

        assert!(workflow.returns_key("b"));
        assert!(!workflow.returns_key("a"));

        let context = RunContext::from_params([("a", "1"), ("b", "2"), ("input", "3")]);
        let returned = workflow.returned(context);
        assert_eq!(returned.keys().collect::<Vec<_>>(), vec!["b"]);

        let err = Workflow::new("demo", vec![emit("first", "a")])
            .unwrap()
            .returning(["zzz"])
            .unwrap_err();
        assert!(matches!(err, DefinitionError::UnknownReturnKey { key, .. } if key == "zzz"));
    }
}
