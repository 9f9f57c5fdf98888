//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone};

use docflow::adapters::{CapabilityError, CapabilityInvoker};
use docflow::core::{ArtifactWriter, Clock, FixedClock, Orchestrator};

/// One recorded invoker call
#[derive(Debug, Clone)]
pub struct Call {
    pub role: String,
    pub prompt: String,
}

/// Invoker with canned replies that records every call
#[derive(Default)]
pub struct ScriptedInvoker {
    replies: HashMap<String, Vec<String>>,
    fail_on_call: Option<usize>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `text` whenever `role` is invoked
    pub fn reply(self, role: &str, text: &str) -> Self {
        self.replies_in_order(role, &[text])
    }

    /// Reply to successive calls for `role` in order; the last reply repeats
    pub fn replies_in_order(mut self, role: &str, texts: &[&str]) -> Self {
        self.replies.insert(
            role.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Fail the n-th call (1-based) as unavailable
    pub fn fail_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn roles(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.role).collect()
    }

    pub fn prompt_for(&self, role: &str) -> Option<String> {
        self.calls()
            .into_iter()
            .find(|c| c.role == role)
            .map(|c| c.prompt)
    }
}

#[async_trait]
impl CapabilityInvoker for ScriptedInvoker {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        role: &str,
        prompt: &str,
        _context: &serde_json::Value,
    ) -> Result<String, CapabilityError> {
        let (call_number, role_call) = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                role: role.to_string(),
                prompt: prompt.to_string(),
            });
            let role_call = calls.iter().filter(|c| c.role == role).count();
            (calls.len(), role_call)
        };

        if self.fail_on_call == Some(call_number) {
            return Err(CapabilityError::Unavailable(format!(
                "scripted failure on call {}",
                call_number
            )));
        }

        let scripted = self
            .replies
            .get(role)
            .and_then(|texts| texts.get(role_call - 1).or_else(|| texts.last()));

        Ok(scripted.cloned().unwrap_or_else(|| {
            format!("## {}\n\nDraft from {} characters of input.\n", role, prompt.len())
        }))
    }
}

/// Clock advancing one second per reading
pub struct SteppingClock {
    start: DateTime<Local>,
    ticks: AtomicI64,
}

impl SteppingClock {
    pub fn new() -> Self {
        Self {
            start: start_time(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Local> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::seconds(n)
    }
}

pub fn start_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
}

pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(start_time()))
}

/// Orchestrator writing into `dir` with the given invoker and clock
pub fn orchestrator(
    invoker: Arc<ScriptedInvoker>,
    dir: &std::path::Path,
    clock: Arc<dyn Clock>,
) -> Orchestrator {
    Orchestrator::new(invoker, ArtifactWriter::new(dir).with_clock(clock))
}
