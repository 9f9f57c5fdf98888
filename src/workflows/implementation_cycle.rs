//! Implementation cycle: develop, review, security review, revise.
//!
//! One pass is its own workflow (`implementation_iteration`). The cycle runs
//! it as up to three nested steps. A later pass runs only while the previous
//! one lacked approval from both reviewers, and it sees that pass's code and
//! feedback. The last pass's code is persisted as an `implementation`
//! artifact.

use std::sync::Arc;

use crate::adapters::{ROLE_LEAD_ENGINEER, ROLE_SECURITY_ENGINEER, ROLE_SOFTWARE_ENGINEER};
use crate::core::{
    output, Condition, DefinitionError, NestedWorkflow, Projection, Prompt, Step, StepError,
    Workflow,
};
use crate::domain::{ContextError, RunContext, Value};

use super::code_review::ReviewStatus;
use super::{KEY_CONTEXT, KEY_SUBJECT};

pub const ITERATION_WORKFLOW_NAME: &str = "implementation_iteration";
pub const WORKFLOW_NAME: &str = "implementation_cycle";

/// Passes run before the cycle gives up on approval
pub const MAX_ITERATIONS: usize = 3;

/// Input: technical design to implement
pub const KEY_ARCHITECTURE: &str = "architecture";

/// Pass input: code from the previous pass
pub const KEY_PREVIOUS_CODE: &str = "previous_implementation";
/// Pass input: code review of the previous pass
pub const KEY_CODE_FEEDBACK: &str = "code_feedback";
/// Pass input: security review of the previous pass
pub const KEY_SECURITY_FEEDBACK: &str = "security_feedback";

/// Pass output: code written by the pass
pub const KEY_CODE: &str = "development_content";
/// Pass output: code review text
pub const KEY_CODE_REVIEW: &str = "code_review_content";
/// Pass output: security review text
pub const KEY_SECURITY_REVIEW: &str = "security_review_content";
/// Pass output: `approved` or `changes_requested`
pub const KEY_CODE_STATUS: &str = "code_review_status";
/// Pass output: `approved` or `changes_requested`
pub const KEY_SECURITY_STATUS: &str = "security_review_status";
/// Pass output: both reviews approved
pub const KEY_APPROVED: &str = "approved";

/// `approved` or `completed_with_notes`
pub const KEY_STATUS: &str = "implementation_status";
/// Number of passes that ran
pub const KEY_ITERATIONS: &str = "iterations";
/// Code from the last pass
pub const KEY_IMPLEMENTATION: &str = "implementation_content";
/// Implementation artifact path
pub const KEY_IMPLEMENTATION_PATH: &str = "implementation_path";
/// Markdown summary of the cycle
pub const KEY_SUMMARY: &str = "implementation_summary";

/// Keys each pass hands back to the cycle, suffixed with the pass number
const PASS_OUTPUTS: &[&str] = &[
    KEY_CODE,
    KEY_CODE_REVIEW,
    KEY_SECURITY_REVIEW,
    KEY_CODE_STATUS,
    KEY_SECURITY_STATUS,
    KEY_APPROVED,
];

/// Cycle-level key holding `key` from pass `pass`
pub fn pass_key(key: &str, pass: usize) -> String {
    format!("{}_{}", key, pass)
}

/// Read a security review; fix requests and critical or high findings block it
pub fn security_status(review: &str) -> ReviewStatus {
    let lower = review.to_lowercase();
    let blocked = lower.contains("changes required")
        || lower.contains("changes_required")
        || lower.contains("critical")
        || (lower.contains("high") && lower.contains("vulnerabilit"));

    if blocked {
        ReviewStatus::ChangesRequested
    } else {
        ReviewStatus::Approved
    }
}

fn development_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    let subject = ctx.get_text(KEY_SUBJECT)?;
    let task = ctx.get_text(KEY_CONTEXT)?;

    let mut text = match ctx.get_text_opt(KEY_PREVIOUS_CODE)? {
        None => format!(
            "Implement **{}** from the technical design.\n\n**Task:** {}\n\n\
             ## Technical Design\n\n{}\n",
            subject,
            task,
            ctx.get_text(KEY_ARCHITECTURE)?
        ),
        Some(previous) => {
            let mut text = format!(
                "Revise the implementation of **{}** to address the review feedback.\n\n\
                 **Task:** {}\n\n## Current Code\n\n```\n{}\n```\n",
                subject, task, previous
            );
            if let Some(feedback) = ctx.get_text_opt(KEY_CODE_FEEDBACK)? {
                text.push_str(&format!("\n## Code Review\n\n{}\n", feedback));
            }
            if let Some(feedback) = ctx.get_text_opt(KEY_SECURITY_FEEDBACK)? {
                text.push_str(&format!("\n## Security Review\n\n{}\n", feedback));
            }
            text
        }
    };

    text.push_str(
        "\nReturn the complete code. Validate input, handle errors and comment \
         only where the logic is not obvious.",
    );

    Ok(Prompt::new(text))
}

fn code_review_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "Review the code for **{}** against the technical design.\n\n\
         ## Technical Design\n\n{}\n\n## Code\n\n```\n{}\n```\n\n\
         Judge quality, alignment with the design and maintainability. Start \
         with `Review Status: APPROVED` or `Review Status: CHANGES_REQUESTED`, \
         then list the required changes.",
        ctx.get_text(KEY_SUBJECT)?,
        ctx.get_text(KEY_ARCHITECTURE)?,
        ctx.get_text(KEY_CODE)?
    )))
}

fn security_review_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "Review the code for **{}** for security vulnerabilities.\n\n\
         ## Code\n\n```\n{}\n```\n\n\
         Look for injection, broken authentication or authorization, sensitive \
         data exposure and missing input validation. Start with \
         `Security Status: APPROVED` or `Security Status: CHANGES_REQUIRED`, \
         then list findings with their severity.",
        ctx.get_text(KEY_SUBJECT)?,
        ctx.get_text(KEY_CODE)?
    )))
}

fn verdict(ctx: &RunContext) -> Result<RunContext, StepError> {
    let code = ReviewStatus::from_decision(ctx.get_text(KEY_CODE_REVIEW)?);
    let security = security_status(ctx.get_text(KEY_SECURITY_REVIEW)?);
    let approved = code == ReviewStatus::Approved && security == ReviewStatus::Approved;

    Ok(output([
        (KEY_CODE_STATUS, Value::from(code.as_str())),
        (KEY_SECURITY_STATUS, Value::from(security.as_str())),
        (KEY_APPROVED, Value::from(approved)),
    ]))
}

/// Run pass `pass + 1` only when pass `pass` ran and was not approved
fn needs_revision(pass: usize) -> Condition {
    let approved = pass_key(KEY_APPROVED, pass);
    Condition::when(move |ctx| match ctx.get_opt(&approved) {
        None => Ok(false),
        Some(_) => Ok(!ctx.get_flag(&approved)?),
    })
}

fn finalize(ctx: &RunContext) -> Result<RunContext, StepError> {
    let last = (1..=MAX_ITERATIONS)
        .rev()
        .find(|pass| ctx.contains(&pass_key(KEY_APPROVED, *pass)))
        .ok_or_else(|| ContextError::MissingKey {
            key: pass_key(KEY_APPROVED, 1),
        })?;

    let status = if ctx.get_flag(&pass_key(KEY_APPROVED, last))? {
        "approved"
    } else {
        "completed_with_notes"
    };

    let summary = format!(
        "# Implementation: {}\n\n**Status:** {}\n**Iterations:** {}\n\
         **Code Review:** {}\n**Security Review:** {}\n\n\
         ## Code Review\n\n{}\n\n## Security Review\n\n{}\n",
        ctx.get_text(KEY_SUBJECT)?,
        status,
        last,
        ctx.get_text(&pass_key(KEY_CODE_STATUS, last))?,
        ctx.get_text(&pass_key(KEY_SECURITY_STATUS, last))?,
        ctx.get_text(&pass_key(KEY_CODE_REVIEW, last))?.trim(),
        ctx.get_text(&pass_key(KEY_SECURITY_REVIEW, last))?.trim()
    );

    Ok(output([
        (KEY_STATUS, Value::from(status)),
        (KEY_ITERATIONS, Value::from(last.to_string())),
        (
            KEY_IMPLEMENTATION,
            Value::from(ctx.get_text(&pass_key(KEY_CODE, last))?),
        ),
        (KEY_SUMMARY, Value::from(summary)),
    ]))
}

/// Build one development pass
pub fn implementation_iteration_workflow() -> Result<Workflow, DefinitionError> {
    Workflow::new(
        ITERATION_WORKFLOW_NAME,
        vec![
            Step::capability("development", ROLE_SOFTWARE_ENGINEER, development_prompt)
                .describe("Write or revise the code"),
            Step::capability("code_review", ROLE_LEAD_ENGINEER, code_review_prompt)
                .describe("Review quality and design alignment"),
            Step::capability("security_review", ROLE_SECURITY_ENGINEER, security_review_prompt)
                .describe("Review for vulnerabilities"),
            Step::transform(
                "verdict",
                [KEY_CODE_STATUS, KEY_SECURITY_STATUS, KEY_APPROVED],
                verdict,
            )
            .describe("Combine both review outcomes"),
        ],
    )?
    .with_description("One development pass with code and security review")
    .returning(PASS_OUTPUTS.iter().copied())
}

/// Build the cycle around a single-pass child
pub fn implementation_cycle_workflow(
    iteration: Arc<Workflow>,
) -> Result<Workflow, DefinitionError> {
    let mut steps = Vec::with_capacity(MAX_ITERATIONS + 1);

    for pass in 1..=MAX_ITERATIONS {
        let mut inputs = Projection::new()
            .keep(KEY_SUBJECT)
            .keep(KEY_CONTEXT)
            .keep(KEY_ARCHITECTURE);
        if pass > 1 {
            inputs = inputs
                .bind(pass_key(KEY_CODE, pass - 1), KEY_PREVIOUS_CODE)
                .bind(pass_key(KEY_CODE_REVIEW, pass - 1), KEY_CODE_FEEDBACK)
                .bind(pass_key(KEY_SECURITY_REVIEW, pass - 1), KEY_SECURITY_FEEDBACK);
        }

        let outputs = PASS_OUTPUTS
            .iter()
            .fold(Projection::new(), |projection, key| {
                projection.bind(*key, pass_key(key, pass))
            });

        let mut step = Step::nested(
            format!("iteration_{}", pass),
            NestedWorkflow::new(iteration.clone(), inputs, outputs)?,
        )
        .describe(format!("Development pass {}", pass));
        if pass > 1 {
            step = step.when(needs_revision(pass - 1));
        }
        steps.push(step);
    }

    steps.push(
        Step::transform(
            "implementation",
            [KEY_STATUS, KEY_ITERATIONS, KEY_IMPLEMENTATION, KEY_SUMMARY],
            finalize,
        )
        .produces_artifact("implementation", KEY_SUBJECT)
        .describe("Final code and review outcome"),
    );

    Workflow::new(WORKFLOW_NAME, steps)?
        .with_description("Development with code and security review, revised until approved")
        .returning([
            KEY_STATUS,
            KEY_ITERATIONS,
            KEY_IMPLEMENTATION,
            KEY_IMPLEMENTATION_PATH,
            KEY_SUMMARY,
        ])
}
