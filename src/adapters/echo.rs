//! Offline invoker that echoes its input.
//!
//! Used for dry runs: every workflow step executes and every artifact is
//! written, but no generation service is contacted.

use async_trait::async_trait;

use super::{CapabilityError, CapabilityInvoker};

/// Deterministic invoker that returns a summary of the request
#[derive(Debug, Default, Clone)]
pub struct EchoInvoker;

impl EchoInvoker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CapabilityInvoker for EchoInvoker {
    fn name(&self) -> &str {
        "echo"
    }

    async fn invoke(
        &self,
        role: &str,
        prompt: &str,
        _context: &serde_json::Value,
    ) -> Result<String, CapabilityError> {
        if prompt.trim().is_empty() {
            return Err(CapabilityError::InvalidInput("empty prompt".to_string()));
        }

        Ok(format!("## {}\n\n{}\n", role, prompt.trim()))
    }
}
