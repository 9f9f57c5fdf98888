//! Anthropic Messages API invoker.
//!
//! Each role maps to a system instruction; the prompt and rendered context
//! data form the single user message.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{render_input, CapabilityError, CapabilityInvoker};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// HTTP invoker for the Anthropic Messages API
pub struct AnthropicInvoker {
    /// API key sent as `x-api-key`
    api_key: String,
    /// Model identifier
    model: String,
    /// API base URL (no trailing slash)
    base_url: String,
    /// Maximum tokens per completion
    max_tokens: u32,
    /// Role -> system instruction
    instructions: HashMap<String, String>,
    /// Per-call timeout
    call_timeout: Duration,
    /// HTTP client
    client: reqwest::Client,
}

/// Response body from the Messages API
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Error body from the Messages API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl AnthropicInvoker {
    /// Create an invoker for `model`
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 4096,
            instructions: HashMap::new(),
            call_timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the completion token limit
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Map roles to system instructions
    pub fn with_instructions(mut self, instructions: HashMap<String, String>) -> Self {
        self.instructions = instructions;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    /// System instruction for a role
    fn system_for(&self, role: &str) -> String {
        self.instructions
            .get(role)
            .cloned()
            .unwrap_or_else(|| format!("You are acting as the {}.", role.replace('_', " ")))
    }

    fn request_body(&self, role: &str, input: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": self.system_for(role),
            "messages": [{ "role": "user", "content": input }],
        })
    }
}

#[async_trait]
impl CapabilityInvoker for AnthropicInvoker {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn invoke(
        &self,
        role: &str,
        prompt: &str,
        context: &serde_json::Value,
    ) -> Result<String, CapabilityError> {
        let body = self.request_body(role, &render_input(prompt, context));
        debug!(role, model = %self.model, "Calling messages API");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .timeout(self.call_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Timeout(self.call_timeout)
                } else {
                    CapabilityError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error.message,
                Err(_) => status.to_string(),
            };
            return Err(classify_status(status, detail));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| CapabilityError::Unavailable(format!("malformed response: {}", e)))?;

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(CapabilityError::InvalidInput(format!(
                "empty completion for role '{}'",
                role
            )));
        }

        Ok(text)
    }
}

/// Map an HTTP failure status onto the capability error taxonomy
fn classify_status(status: reqwest::StatusCode, detail: String) -> CapabilityError {
    if status.is_server_error()
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
    {
        CapabilityError::Unavailable(format!("{}: {}", status, detail))
    } else {
        CapabilityError::InvalidInput(format!("{}: {}", status, detail))
    }
}
