//! Architecture workflow: technical design and implementation ticket from a PRD.

use crate::adapters::ROLE_LEAD_ENGINEER;
use crate::core::{output, DefinitionError, Prompt, Step, StepError, Workflow};
use crate::domain::{ContextError, RunContext};

use super::KEY_SUBJECT;

pub const WORKFLOW_NAME: &str = "architecture";

/// Input: the requirements document text
pub const KEY_PRD_INPUT: &str = "prd_content";
/// Technical design text
pub const KEY_DESIGN: &str = "architecture_design_content";
/// Ticket text
pub const KEY_TICKET: &str = "ticket_creation_content";
/// Ticket artifact path
pub const KEY_TICKET_PATH: &str = "ticket_creation_path";

fn design_prompt(ctx: &RunContext) -> Result<Prompt, ContextError> {
    Ok(Prompt::new(format!(
        "Design the technical architecture for **{}** from this requirements \
         document.\n\n## Requirements\n\n{}\n\n\
         Describe components and their responsibilities, data model, \
         interfaces, technology choices with trade-offs, and an ordered \
         implementation plan.",
        ctx.get_text(KEY_SUBJECT)?,
        ctx.get_text(KEY_PRD_INPUT)?
    )))
}

/// Wrap the design in the ticket template
fn render_ticket(ctx: &RunContext) -> Result<RunContext, StepError> {
    let ticket = format!(
        "# Architecture & Implementation Ticket\n\n\
         **Product/Feature:** {}\n\n\
         ---\n\n\
         {}\n\n\
         ---\n\n\
         **Status:** Ready for Implementation\n",
        ctx.get_text(KEY_SUBJECT)?,
        ctx.get_text(KEY_DESIGN)?.trim()
    );

    Ok(output([(KEY_TICKET, ticket)]))
}

/// Build the architecture workflow
pub fn architecture_workflow() -> Result<Workflow, DefinitionError> {
    Workflow::new(
        WORKFLOW_NAME,
        vec![
            Step::capability("architecture_design", ROLE_LEAD_ENGINEER, design_prompt)
                .describe("Technical design from the requirements"),
            Step::transform("ticket_creation", [KEY_TICKET], render_ticket)
                .produces_artifact("ticket", KEY_SUBJECT)
                .describe("Implementation ticket"),
        ],
    )?
    .with_description("Technical design and implementation ticket from a PRD")
    .returning([KEY_DESIGN, KEY_TICKET, KEY_TICKET_PATH])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_template() {
        let ctx = RunContext::from_params([
            (KEY_SUBJECT, "Blog Scheduler"),
            (KEY_DESIGN, "## Components\n\n- scheduler\n"),
        ]);

        let out = render_ticket(&ctx).unwrap();
        let ticket = out.get_text(KEY_TICKET).unwrap();
        assert!(ticket.starts_with("# Architecture & Implementation Ticket"));
        assert!(ticket.contains("**Product/Feature:** Blog Scheduler"));
        assert!(ticket.contains("- scheduler\n\n---"));
        assert!(ticket.ends_with("**Status:** Ready for Implementation\n"));
    }

    #[test]
    fn test_design_prompt_requires_prd() {
        let ctx = RunContext::from_params([(KEY_SUBJECT, "Blog")]);
        assert!(matches!(
            design_prompt(&ctx),
            Err(ContextError::MissingKey { key }) if key == KEY_PRD_INPUT
        ));
    }

    #[test]
    fn test_architecture_workflow_shape() {
        let workflow = architecture_workflow().unwrap();
        assert_eq!(workflow.steps().len(), 2);
        assert!(workflow.get_step("ticket_creation").unwrap().artifact().is_some());
    }
}
