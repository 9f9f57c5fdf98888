//! Code review workflow.
//!
//! Reviews code against an optional architecture document, identifies the
//! changes needed, decides, and proposes an architecture update only when
//! the decision says the implementation deliberately diverged.

use crate::adapters::{
    ROLE_ARCHITECTURE_UPDATER, ROLE_CHANGE_IDENTIFIER, ROLE_CODE_REVIEWER, ROLE_REVIEW_DECIDER,
};
use crate::core::{output, Condition, DefinitionError, Prompt, Step, StepError, Workflow};
use crate::domain::{ContextError, RunContext};

use super::KEY_SUBJECT;

pub const WORKFLOW_NAME: &str = "code_review";

/// Input: code under review
pub const KEY_CODE: &str = "code";
/// Input: architecture document, optional
pub const KEY_ARCHITECTURE: &str = "architecture";
/// `approved` or `changes_requested`
pub const KEY_STATUS: &str = "review_status";
/// Final report text
pub const KEY_REPORT: &str = "review_report_content";
/// Report artifact path
pub const KEY_REPORT_PATH: &str = "review_report_path";
/// Proposed architecture update, when one was needed
pub const KEY_UPDATE: &str = "update_architecture_content";

/// Phrases in a review decision that mean the architecture should follow the code
const DIVERGENCE_MARKERS: &[&str] = &[
    "diverged from architecture",
    "different approach",
    "implementation differs",
    "architecture update needed",
    "design changed",
    "modified the architecture",
    "updated approach",
    "better pattern",
    "refactored to",
    "intentionally changed",
];

/// Outcome of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStatus {
    Approved,
    ChangesRequested,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::ChangesRequested => "changes_requested",
        }
    }

    /// Read the status out of a decision text; anything unclear requests changes
    pub fn from_decision(decision: &str) -> Self {
        let lower = decision.to_lowercase();
        let requests_changes = ["changes requested", "changes_requested", "request changes"]
            .iter()
            .any(|m| lower.contains(m));

        if !requests_changes && lower.contains("approved") {
            Self::Approved
        } else {
            Self::ChangesRequested
        }
    }
}

/// Whether a decision says the implementation diverged on purpose
pub fn architecture_diverged(decision: &str) -> bool {
    let lower = decision.to_lowercase();
    DIVERGENCE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn review_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    let mut text = format!(
        "Review the code for **{}**.\n\n## Code\n\n```\n{}\n```\n",
        ctx.get_text(KEY_SUBJECT)?,
        ctx.get_text(KEY_CODE)?
    );

    if let Some(architecture) = ctx.get_text_opt(KEY_ARCHITECTURE)? {
        text.push_str(&format!("\n## Architecture\n\n{}\n", architecture));
    }

    text.push_str(
        "\nAssess correctness, error handling, tests and conformance to the \
         architecture. Note where the implementation differs from the design.",
    );

    Ok(Prompt::new(text))
}

fn identify_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "List the concrete changes required by this review, each with file, \
         severity and rationale.\n\n## Review\n\n{}\n",
        ctx.get_text("review_content")?
    )))
}

fn decide_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "Decide whether the code is approved or changes are requested. State \
         `approved` or `changes requested` explicitly, and say whether the \
         implementation intentionally diverged from the architecture.\n\n\
         ## Required Changes\n\n{}\n",
        ctx.get_text("identify_content")?
    )))
}

fn update_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    let current = ctx
        .get_text_opt(KEY_ARCHITECTURE)?
        .unwrap_or("No architecture document was provided.");

    Ok(Prompt::new(format!(
        "Update the architecture document to match the implementation.\n\n\
         ## Review Decision\n\n{}\n\n## Current Architecture\n\n{}\n",
        ctx.get_text("decide_content")?,
        current
    )))
}

fn render_report(ctx: &RunContext) -> Result<RunContext, StepError> {
    let decision = ctx.get_text("decide_content")?;
    let status = ReviewStatus::from_decision(decision);

    let mut report = format!(
        "# Code Review: {}\n\n**Status:** {}\n\n## Review\n\n{}\n\n## Required Changes\n\n{}\n\n## Decision\n\n{}\n",
        ctx.get_text(KEY_SUBJECT)?,
        status.as_str(),
        ctx.get_text("review_content")?.trim(),
        ctx.get_text("identify_content")?.trim(),
        decision.trim()
    );

    if let Some(update) = ctx.get_text_opt(KEY_UPDATE)? {
        report.push_str(&format!("\n## Architecture Update\n\n{}\n", update.trim()));
    }

    Ok(output([
        (KEY_REPORT, report),
        (KEY_STATUS, status.as_str().to_string()),
    ]))
}

/// Build the code review workflow
pub fn code_review_workflow() -> Result<Workflow, DefinitionError> {
    Workflow::new(
        WORKFLOW_NAME,
        vec![
            Step::capability("review", ROLE_CODE_REVIEWER, review_prompt)
                .describe("Review the code"),
            Step::capability("identify", ROLE_CHANGE_IDENTIFIER, identify_prompt)
                .describe("Identify required changes"),
            Step::capability("decide", ROLE_REVIEW_DECIDER, decide_prompt)
                .describe("Approve or request changes"),
            Step::capability("update_architecture", ROLE_ARCHITECTURE_UPDATER, update_prompt)
                .when(Condition::when(|ctx| {
                    Ok(architecture_diverged(ctx.get_text("decide_content")?))
                }))
                .describe("Bring the architecture in line with the code"),
            Step::transform("review_report", [KEY_REPORT, KEY_STATUS], render_report)
                .produces_artifact("review", KEY_SUBJECT)
                .describe("Review report"),
        ],
    )?
    .with_description("Code review with optional architecture update")
    .returning([KEY_STATUS, KEY_REPORT, KEY_REPORT_PATH, KEY_UPDATE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_status_from_decision() {
        assert_eq!(
            ReviewStatus::from_decision("Decision: APPROVED"),
            ReviewStatus::Approved
        );
        assert_eq!(
            ReviewStatus::from_decision("Not approved. Changes requested."),
            ReviewStatus::ChangesRequested
        );
        assert_eq!(
            ReviewStatus::from_decision("Needs another look"),
            ReviewStatus::ChangesRequested
        );
    }

    #[test]
    fn test_architecture_diverged() {
        assert!(architecture_diverged(
            "Approved. The team Refactored To an event queue."
        ));
        assert!(!architecture_diverged("Approved, matches the design."));
    }

    #[test]
    fn test_report_includes_update_when_present() {
        let ctx = RunContext::from_params([
            (KEY_SUBJECT, "Blog Scheduler"),
            ("review_content", "Looks fine."),
            ("identify_content", "None."),
            ("decide_content", "Approved."),
            (KEY_UPDATE, "Use a queue."),
        ]);

        let out = render_report(&ctx).unwrap();
        assert_eq!(out.get_text(KEY_STATUS).unwrap(), "approved");
        let report = out.get_text(KEY_REPORT).unwrap();
        assert!(report.starts_with("# Code Review: Blog Scheduler"));
        assert!(report.contains("## Architecture Update\n\nUse a queue."));
    }

    #[test]
    fn test_code_review_workflow_shape() {
        let workflow = code_review_workflow().unwrap();
        assert_eq!(workflow.steps().len(), 5);
        assert!(!workflow
            .get_step("update_architecture")
            .unwrap()
            .condition()
            .is_always());
    }
}
