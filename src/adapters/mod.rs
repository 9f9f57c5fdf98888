//! Capability invokers for text generation.
//!
//! The orchestrator treats text generation as a black box: given a role,
//! a prompt and some context data, an invoker returns generated text or
//! fails. Retries and timeouts are the invoker's business.

pub mod anthropic;
pub mod echo;
pub mod fabric;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use anthropic::AnthropicInvoker;
pub use echo::EchoInvoker;
pub use fabric::FabricInvoker;

/// Role of the requirements analyst that scopes a request
pub const ROLE_ANALYST: &str = "requirements_analyst";
/// Role of the market researcher
pub const ROLE_MARKET_RESEARCHER: &str = "market_researcher";
/// Role of the competitor researcher
pub const ROLE_COMPETITOR_RESEARCHER: &str = "competitor_researcher";
/// Role that condenses analysis and research before writing requirements
pub const ROLE_SYNTHESIZER: &str = "requirements_synthesizer";
/// Role that writes requirement documents
pub const ROLE_PRODUCT_LEAD: &str = "product_lead";
/// Role that writes technical architecture
pub const ROLE_LEAD_ENGINEER: &str = "lead_engineer";
/// Role that reviews code
pub const ROLE_CODE_REVIEWER: &str = "code_reviewer";
/// Role that classifies review findings
pub const ROLE_CHANGE_IDENTIFIER: &str = "change_identifier";
/// Role that approves or rejects a review
pub const ROLE_REVIEW_DECIDER: &str = "review_decider";
/// Role that proposes architecture document updates
pub const ROLE_ARCHITECTURE_UPDATER: &str = "architecture_updater";
/// Role that writes and revises code
pub const ROLE_SOFTWARE_ENGINEER: &str = "software_engineer";
/// Role that reviews code for vulnerabilities
pub const ROLE_SECURITY_ENGINEER: &str = "security_engineer";

/// Failure of the external generation capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapabilityError {
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error("capability rejected input: {0}")]
    InvalidInput(String),

    #[error("capability timed out after {0:?}")]
    Timeout(Duration),
}

/// Opaque text-generation collaborator
#[async_trait]
pub trait CapabilityInvoker: Send + Sync {
    /// Human-readable invoker name
    fn name(&self) -> &str;

    /// Generate text for `role` from a prompt and structured context data
    async fn invoke(
        &self,
        role: &str,
        prompt: &str,
        context: &serde_json::Value,
    ) -> Result<String, CapabilityError>;
}

/// Render the prompt and context data as one document for text-only backends
pub(crate) fn render_input(prompt: &str, context: &serde_json::Value) -> String {
    match context {
        serde_json::Value::Null => prompt.to_string(),
        serde_json::Value::Object(map) if map.is_empty() => prompt.to_string(),
        _ => {
            let data = serde_json::to_string_pretty(context).unwrap_or_default();
            format!("{}\n\n## Context Data\n\n```json\n{}\n```\n", prompt, data)
        }
    }
}
