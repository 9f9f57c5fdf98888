//! Software development workflow: discovery followed by architecture.
//!
//! Both phases run as nested workflows. Only the PRD text crosses from
//! discovery into architecture.

use std::sync::Arc;

use crate::core::{DefinitionError, NestedWorkflow, Projection, Step, Workflow};

use super::architecture::{KEY_DESIGN, KEY_PRD_INPUT, KEY_TICKET, KEY_TICKET_PATH};
use super::discovery::{KEY_PRD, KEY_PRD_PATH, KEY_RESEARCH_PATH};
use super::{
    KEY_AUDIENCE, KEY_CONTEXT, KEY_ENABLE_COMPETITORS, KEY_ENABLE_RESEARCH, KEY_SCOPE,
    KEY_SUBJECT, KEY_USER_PROMPT,
};

pub const WORKFLOW_NAME: &str = "software_development";

/// PRD artifact path
pub const KEY_PRD_FILE: &str = "prd_path";
/// Technical design text
pub const KEY_ARCHITECTURE: &str = "architecture";
/// Ticket text
pub const KEY_TICKET_CONTENT: &str = "ticket_content";
/// Ticket artifact path
pub const KEY_TICKET_FILE: &str = "ticket_path";

/// Build the software development workflow from its two phases
pub fn software_development_workflow(
    discovery: Arc<Workflow>,
    architecture: Arc<Workflow>,
) -> Result<Workflow, DefinitionError> {
    let discovery_step = NestedWorkflow::new(
        discovery,
        Projection::new()
            .keep(KEY_SUBJECT)
            .keep(KEY_CONTEXT)
            .keep_optional(KEY_AUDIENCE)
            .keep_optional(KEY_USER_PROMPT)
            .keep_optional(KEY_SCOPE)
            .keep_optional(KEY_ENABLE_RESEARCH)
            .keep_optional(KEY_ENABLE_COMPETITORS),
        Projection::new()
            .bind(KEY_PRD, KEY_PRD_INPUT)
            .bind(KEY_PRD_PATH, KEY_PRD_FILE)
            .keep(KEY_SCOPE)
            .keep_optional(KEY_RESEARCH_PATH),
    )?;

    let architecture_step = NestedWorkflow::new(
        architecture,
        Projection::new().keep(KEY_SUBJECT).keep(KEY_PRD_INPUT),
        Projection::new()
            .bind(KEY_DESIGN, KEY_ARCHITECTURE)
            .bind(KEY_TICKET, KEY_TICKET_CONTENT)
            .bind(KEY_TICKET_PATH, KEY_TICKET_FILE),
    )?;

    Ok(Workflow::new(
        WORKFLOW_NAME,
        vec![
            Step::nested("product_discovery", discovery_step)
                .describe("Requirements document"),
            Step::nested("architecture_design", architecture_step)
                .describe("Technical design and ticket"),
        ],
    )?
    .with_description("Discovery followed by architecture"))
}
