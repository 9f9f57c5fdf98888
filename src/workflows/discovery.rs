//! Discovery workflow: from a short request to a requirements document.
//!
//! Steps, in order:
//! 1. `analysis` - analyze the request and judge its scope
//! 2. `classify_scope` - derive `scope` from the analysis when the caller gave none
//! 3. `research` - nested research run, only for new products with research enabled
//! 4. `synthesis` - merge analysis and research into requirements
//! 5. `prd_creation` - write the PRD, persisted as a `prd` artifact

use std::sync::Arc;

use crate::adapters::{ROLE_ANALYST, ROLE_PRODUCT_LEAD, ROLE_SYNTHESIZER};
use crate::core::{
    output, Condition, DefinitionError, NestedWorkflow, Projection, Prompt, Step, StepError,
    Workflow,
};
use crate::domain::{ContextError, RunContext};

use super::research::{KEY_NOTES, KEY_NOTES_PATH};
use super::{
    request_brief, Scope, KEY_AUDIENCE, KEY_CONTEXT, KEY_ENABLE_COMPETITORS, KEY_ENABLE_RESEARCH,
    KEY_SCOPE, KEY_SUBJECT, KEY_USER_PROMPT,
};

pub const WORKFLOW_NAME: &str = "discovery";

/// Research notes as seen by the discovery run
pub const KEY_RESEARCH: &str = "research_content";
/// Research artifact path as seen by the discovery run
pub const KEY_RESEARCH_PATH: &str = "research_path";
/// Final PRD text
pub const KEY_PRD: &str = "prd_creation_content";
/// PRD artifact path
pub const KEY_PRD_PATH: &str = "prd_creation_path";

/// Phrases in an analysis that mark a brand-new product
const PRODUCT_MARKERS: &[&str] = &[
    "new product",
    "from scratch",
    "greenfield",
    "standalone product",
];

fn analysis_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    let scope = ctx.get_text_opt(KEY_SCOPE)?.unwrap_or("Not specified");
    let mut text = format!(
        "Analyze the following request.\n\n{}\n**Scope:** {}\n",
        request_brief(ctx)?,
        scope
    );

    if let Some(user_prompt) = ctx.get_text_opt(KEY_USER_PROMPT)? {
        text.push_str(&format!("\n**Original Request:**\n{}\n", user_prompt));
    }

    text.push_str(
        "\nOn a line starting with `Scope:`, answer `product` or `feature`. \
         Then list the problem being solved, the users affected, core \
         capabilities, open questions and risks.",
    );

    Ok(Prompt::new(text))
}

/// Read the scope an analysis settled on
///
/// Looks at the first line mentioning "scope"; falls back to scanning the
/// whole text for product markers. Anything else is a feature.
pub fn classify_scope_text(analysis: &str) -> Scope {
    let lower = analysis.to_lowercase();

    if let Some(line) = lower.lines().find(|line| line.contains("scope")) {
        if line.contains("feature") || line.contains("enhancement") {
            return Scope::Feature;
        }
        if line.contains("product") {
            return Scope::Product;
        }
    }

    if PRODUCT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Scope::Product
    } else {
        Scope::Feature
    }
}

fn classify_scope(ctx: &RunContext) -> Result<RunContext, StepError> {
    let scope = classify_scope_text(ctx.get_text("analysis_content")?);
    Ok(output([(KEY_SCOPE, scope.as_str())]))
}

/// Research runs only for new products with at least one research flag set
fn research_wanted(ctx: &RunContext) -> Result<bool, ContextError> {
    if Scope::from_context(ctx)? != Scope::Product {
        return Ok(false);
    }
    let flag = |key: &str| match ctx.get_opt(key) {
        None => Ok(false),
        Some(_) => ctx.get_flag(key),
    };
    Ok(flag(KEY_ENABLE_RESEARCH)? || flag(KEY_ENABLE_COMPETITORS)?)
}

fn synthesis_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    let mut text = format!(
        "Synthesize requirements for the following request.\n\n{}\n\n## Analysis\n\n{}\n",
        request_brief(ctx)?,
        ctx.get_text("analysis_content")?
    );

    if let Some(research) = ctx.get_text_opt(KEY_RESEARCH)? {
        text.push_str(&format!("\n## Research\n\n{}\n", research));
    }

    text.push_str(
        "\nProduce prioritized functional requirements, non-functional \
         requirements, success metrics and explicit out-of-scope items.",
    );

    Ok(Prompt::new(text))
}

fn prd_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    let outline = match Scope::from_context(ctx)? {
        Scope::Product => {
            "Write a full product requirements document with these sections: \
             Overview, Problem Statement, Target Users, Goals and Success Metrics, \
             Functional Requirements, Non-Functional Requirements, Release Plan, \
             Risks and Open Questions."
        }
        Scope::Feature => {
            "Write a concise feature requirements document with these sections: \
             Summary, User Stories, Acceptance Criteria, Dependencies, Out of Scope."
        }
    };

    let mut text = format!(
        "{}\n\n{}\n\n## Analysis\n\n{}\n\n## Synthesized Requirements\n\n{}\n",
        outline,
        request_brief(ctx)?,
        ctx.get_text("analysis_content")?,
        ctx.get_text("synthesis_content")?
    );

    if let Some(research) = ctx.get_text_opt(KEY_RESEARCH)? {
        text.push_str(&format!("\n## Research\n\n{}\n", research));
    }

    Ok(Prompt::new(text))
}

/// Build the discovery workflow around a research child
pub fn discovery_workflow(research: Arc<Workflow>) -> Result<Workflow, DefinitionError> {
    let research_step = NestedWorkflow::new(
        research,
        Projection::new()
            .keep(KEY_SUBJECT)
            .keep(KEY_CONTEXT)
            .keep_optional(KEY_AUDIENCE)
            .keep_optional(KEY_ENABLE_RESEARCH)
            .keep_optional(KEY_ENABLE_COMPETITORS),
        Projection::new()
            .bind(KEY_NOTES, KEY_RESEARCH)
            .bind(KEY_NOTES_PATH, KEY_RESEARCH_PATH),
    )?;

    Workflow::new(
        WORKFLOW_NAME,
        vec![
            Step::capability("analysis", ROLE_ANALYST, analysis_prompt)
                .describe("Analyze the request and its scope"),
            Step::transform("classify_scope", [KEY_SCOPE], classify_scope)
                .when(Condition::missing(KEY_SCOPE))
                .describe("Derive the scope from the analysis"),
            Step::nested("research", research_step)
                .when(Condition::when(research_wanted))
                .describe("Market and competitor research for new products"),
            Step::capability("synthesis", ROLE_SYNTHESIZER, synthesis_prompt)
                .describe("Merge analysis and research into requirements"),
            Step::capability("prd_creation", ROLE_PRODUCT_LEAD, prd_prompt)
                .produces_artifact("prd", KEY_SUBJECT)
                .describe("Write the requirements document"),
        ],
    )?
    .with_description("Requirements document from a short request")
    .returning([KEY_PRD, KEY_PRD_PATH, KEY_SCOPE, KEY_RESEARCH_PATH])
}
