//! Bundled document workflows.
//!
//! Every workflow is built by a plain constructor from an explicit list of
//! steps; parents receive their children as arguments. Nothing is
//! registered globally.
//!
//! - `research`: market and competitor research notes
//! - `discovery`: requirements document (PRD) from a short request
//! - `architecture`: technical design and implementation ticket from a PRD
//! - `software_development`: discovery then architecture, as nested runs
//! - `code_review`: review, decision and optional architecture update
//! - `implementation_cycle`: development with code and security review,
//!   revised up to three times until both approve

pub mod architecture;
pub mod code_review;
pub mod discovery;
pub mod implementation_cycle;
pub mod request;
pub mod research;
pub mod software_development;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{DefinitionError, Workflow};
use crate::domain::{ContextError, RunContext};

pub use request::{generate, GenerationRequest, GenerationResult};

/// Context key: name of the product or feature
pub const KEY_SUBJECT: &str = "subject";
/// Context key: description of what should be built
pub const KEY_CONTEXT: &str = "context";
/// Context key: intended users
pub const KEY_AUDIENCE: &str = "audience";
/// Context key: the original free-form request
pub const KEY_USER_PROMPT: &str = "user_prompt";
/// Context key: `product` or `feature`
pub const KEY_SCOPE: &str = "scope";
/// Context key: run market research
pub const KEY_ENABLE_RESEARCH: &str = "enable_research";
/// Context key: run competitor analysis
pub const KEY_ENABLE_COMPETITORS: &str = "enable_competitor_analysis";

/// Scope of the requested work
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// A new product built from scratch
    Product,

    /// A feature or enhancement of something that exists
    #[default]
    Feature,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Feature => "feature",
        }
    }

    /// Read the scope from the context; unknown values count as a feature
    pub fn from_context(ctx: &RunContext) -> Result<Self, ContextError> {
        Ok(ctx.get_text(KEY_SCOPE)?.parse().unwrap_or_default())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "product" | "new_product" => Ok(Self::Product),
            "feature" | "enhancement" => Ok(Self::Feature),
            other => Err(format!("unknown scope '{}'", other)),
        }
    }
}

/// Markdown summary of the request shared by most prompts
pub(crate) fn request_brief(ctx: &RunContext) -> Result<String, ContextError> {
    Ok(format!(
        "**Name:** {}\n**Context:** {}\n**Target Audience:** {}",
        ctx.get_text(KEY_SUBJECT)?,
        ctx.get_text(KEY_CONTEXT)?,
        ctx.get_text_opt(KEY_AUDIENCE)?.unwrap_or("Not specified"),
    ))
}

/// All bundled workflows, wired together
#[derive(Debug, Clone)]
pub struct Catalog {
    pub research: Arc<Workflow>,
    pub discovery: Arc<Workflow>,
    pub architecture: Arc<Workflow>,
    pub software_development: Arc<Workflow>,
    pub code_review: Arc<Workflow>,
    pub implementation_iteration: Arc<Workflow>,
    pub implementation_cycle: Arc<Workflow>,
}

impl Catalog {
    /// Build every workflow, children first
    pub fn build() -> Result<Self, DefinitionError> {
        let research = Arc::new(research::research_workflow()?);
        let discovery = Arc::new(discovery::discovery_workflow(research.clone())?);
        let architecture = Arc::new(architecture::architecture_workflow()?);
        let software_development = Arc::new(software_development::software_development_workflow(
            discovery.clone(),
            architecture.clone(),
        )?);
        let code_review = Arc::new(code_review::code_review_workflow()?);
        let implementation_iteration =
            Arc::new(implementation_cycle::implementation_iteration_workflow()?);
        let implementation_cycle = Arc::new(implementation_cycle::implementation_cycle_workflow(
            implementation_iteration.clone(),
        )?);

        Ok(Self {
            research,
            discovery,
            architecture,
            software_development,
            code_review,
            implementation_iteration,
            implementation_cycle,
        })
    }

    /// Workflows in dependency order
    pub fn all(&self) -> Vec<&Workflow> {
        vec![
            &self.research,
            &self.discovery,
            &self.architecture,
            &self.software_development,
            &self.code_review,
            &self.implementation_iteration,
            &self.implementation_cycle,
        ]
    }

    /// Look a workflow up by name
    pub fn get(&self, name: &str) -> Option<&Workflow> {
        self.all().into_iter().find(|w| w.name() == name)
    }
}
