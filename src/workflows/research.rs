//! Research workflow: market research and competitor analysis notes.
//!
//! Each research call is gated by its own flag. The notes step always
//! runs and persists whatever sections were produced as a `research`
//! artifact.

use crate::adapters::{ROLE_COMPETITOR_RESEARCHER, ROLE_MARKET_RESEARCHER};
use crate::core::{output, Condition, DefinitionError, Prompt, Step, StepError, Workflow};
use crate::domain::{ContextError, RunContext};

use super::{request_brief, KEY_ENABLE_COMPETITORS, KEY_ENABLE_RESEARCH, KEY_SUBJECT};

pub const WORKFLOW_NAME: &str = "research";

/// Key holding the combined notes
pub const KEY_NOTES: &str = "research_notes_content";
/// Key holding the notes artifact path
pub const KEY_NOTES_PATH: &str = "research_notes_path";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

fn market_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "Research the market for the following product.\n\n{}\n\n\
         Cover market size and growth, target segments, trends and \
         regulatory or technical constraints. Keep findings concise and cite \
         assumptions explicitly.",
        request_brief(ctx)?
    )))
}

fn competitor_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "Analyze the competitive landscape for the following product.\n\n{}\n\n\
         List direct and indirect competitors, their positioning, strengths \
         and weaknesses, and the gaps this product could fill.",
        request_brief(ctx)?
    )))
}

/// Join the research sections that were produced
fn combine_notes(ctx: &RunContext) -> Result<RunContext, StepError> {
    let sections = [
        ("Market Research", "market_research_content"),
        ("Competitor Analysis", "competitor_analysis_content"),
    ];

    let mut parts = Vec::new();
    for (title, key) in sections {
        if let Some(text) = ctx.get_text_opt(key)? {
            parts.push(format!("## {}\n\n{}", title, text.trim()));
        }
    }

    let notes = if parts.is_empty() {
        "No research was requested.".to_string()
    } else {
        format!(
            "# Research Notes: {}\n\n{}\n",
            ctx.get_text(KEY_SUBJECT)?,
            parts.join(SECTION_SEPARATOR)
        )
    };

    Ok(output([(KEY_NOTES, notes)]))
}

/// Build the research workflow
pub fn research_workflow() -> Result<Workflow, DefinitionError> {
    Workflow::new(
        WORKFLOW_NAME,
        vec![
            Step::capability("market_research", ROLE_MARKET_RESEARCHER, market_prompt)
                .when(Condition::flag(KEY_ENABLE_RESEARCH))
                .describe("Market size, segments and trends"),
            Step::capability(
                "competitor_analysis",
                ROLE_COMPETITOR_RESEARCHER,
                competitor_prompt,
            )
            .when(Condition::flag(KEY_ENABLE_COMPETITORS))
            .describe("Competitive landscape"),
            Step::transform("research_notes", [KEY_NOTES], combine_notes)
                .produces_artifact("research", KEY_SUBJECT)
                .describe("Combine research sections into one document"),
        ],
    )?
    .with_description("Market and competitor research notes")
    .returning([KEY_NOTES, KEY_NOTES_PATH])
}
