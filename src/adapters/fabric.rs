//! Fabric invoker for text generation.
//!
//! Spawns the `fabric` CLI with one pattern per role and pipes the prompt
//! (plus rendered context data) to stdin, collecting stdout as the result.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{render_input, CapabilityError, CapabilityInvoker};

/// Invoker backed by the Fabric CLI
pub struct FabricInvoker {
    /// Path to the fabric binary
    binary_path: String,

    /// Role -> pattern overrides; unmapped roles use the role name as pattern
    patterns: HashMap<String, String>,

    /// Per-call timeout
    call_timeout: Duration,
}

impl FabricInvoker {
    /// Create a Fabric invoker
    ///
    /// Looks for fabric-ai first (Homebrew install), falls back to fabric
    pub fn new(call_timeout: Duration) -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .output()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self::with_binary_path(binary_path, call_timeout)
    }

    /// Create a Fabric invoker with a custom binary path
    pub fn with_binary_path(binary_path: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            patterns: HashMap::new(),
            call_timeout,
        }
    }

    /// Map roles to Fabric pattern names
    pub fn with_patterns(mut self, patterns: HashMap<String, String>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Pattern used for a role
    pub fn pattern_for<'a>(&'a self, role: &'a str) -> &'a str {
        self.patterns.get(role).map(String::as_str).unwrap_or(role)
    }

    async fn run_pattern(&self, pattern: &str, input: &str) -> Result<String, CapabilityError> {
        let mut child = Command::new(&self.binary_path)
            .args(["-p", pattern])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CapabilityError::Unavailable(format!(
                    "failed to spawn {} for pattern '{}': {}",
                    self.binary_path, pattern, e
                ))
            })?;

        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(input.as_bytes()).await?;
                // Dropping stdin signals EOF
            }
            Ok::<_, std::io::Error>(())
        };

        // Feeding stdin and collecting output share one deadline
        let (fed, output) = timeout(self.call_timeout, async {
            tokio::join!(feed, child.wait_with_output())
        })
        .await
        .map_err(|_| CapabilityError::Timeout(self.call_timeout))?;

        let output = output.map_err(|e| {
            CapabilityError::Unavailable(format!("failed to wait for fabric: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(CapabilityError::InvalidInput(format!(
                "pattern '{}' failed with exit code {}: {}",
                pattern,
                exit_code,
                stderr.trim()
            )));
        }

        fed.map_err(|e| {
            CapabilityError::Unavailable(format!("failed to write to fabric stdin: {}", e))
        })?;

        String::from_utf8(output.stdout).map_err(|_| {
            CapabilityError::InvalidInput(format!("pattern '{}' returned non UTF-8 output", pattern))
        })
    }
}

#[async_trait]
impl CapabilityInvoker for FabricInvoker {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn invoke(
        &self,
        role: &str,
        prompt: &str,
        context: &serde_json::Value,
    ) -> Result<String, CapabilityError> {
        let pattern = self.pattern_for(role);
        debug!(role, pattern, "Invoking fabric pattern");
        self.run_pattern(pattern, &render_input(prompt, context)).await
    }
}
