//! Bounded execution of OS automation scripts.
//!
//! Everything that touches `osascript` goes through [`ScriptRunner`]: one
//! hard wall-clock timeout per attempt, a constant delay between attempts,
//! and failure classification done exactly once at this boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::AutomationError;

/// Execution budget for one automation script.
#[derive(Debug, Clone, Copy)]
pub struct ScriptBudget {
    /// Hard wall-clock limit per attempt.
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub retries: u32,
    /// Constant delay between attempts.
    pub retry_delay: Duration,
}

impl Default for ScriptBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// An opaque script body plus its execution budget. Created per invocation,
/// discarded after execution.
#[derive(Debug, Clone)]
pub struct AutomationScript {
    body: String,
    budget: ScriptBudget,
}

impl AutomationScript {
    pub fn new(body: impl Into<String>, budget: ScriptBudget) -> Self {
        Self {
            body: body.into(),
            budget,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn budget(&self) -> ScriptBudget {
        self.budget
    }
}

/// Seam to the OS script engine, so the runner can be exercised without
/// spawning processes.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Run a script body to completion. `Err` carries the engine's raw
    /// error text; classification happens in the runner, not here.
    async fn execute(&self, body: &str) -> Result<String, String>;
}

/// Production engine: `osascript -e <body>`.
pub struct OsaScript;

#[async_trait]
impl ScriptEngine for OsaScript {
    async fn execute(&self, body: &str) -> Result<String, String> {
        let output = Command::new("osascript")
            .arg("-e")
            .arg(body)
            .output()
            .await
            .map_err(|e| format!("failed to spawn osascript: {e}"))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout)
                .trim_end()
                .to_string())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}

/// Executes a single automation script under its budget.
pub struct ScriptRunner {
    engine: Arc<dyn ScriptEngine>,
    max_script_len: usize,
}

impl ScriptRunner {
    pub fn new(engine: Arc<dyn ScriptEngine>, max_script_len: usize) -> Self {
        Self {
            engine,
            max_script_len,
        }
    }

    /// Run `script` to completion, retrying up to its budget. An empty or
    /// oversized body is rejected without consuming an attempt. A timed-out
    /// attempt is classified `Timeout` and still counts against the budget.
    pub async fn run(&self, script: &AutomationScript) -> Result<String, AutomationError> {
        if script.body().trim().is_empty() {
            return Err(AutomationError::InvalidInput(
                "automation script body is empty".to_string(),
            ));
        }
        if script.body().len() > self.max_script_len {
            return Err(AutomationError::InvalidInput(format!(
                "automation script is {} bytes, maximum is {}",
                script.body().len(),
                self.max_script_len
            )));
        }

        let budget = script.budget();
        let attempts = budget.retries.max(1);
        let mut timed_out = false;
        let mut last_message = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(budget.retry_delay).await;
            }

            match tokio::time::timeout(budget.timeout, self.engine.execute(script.body())).await {
                Ok(Ok(text)) => {
                    debug!(attempt, body = %script.body(), "automation script succeeded");
                    return Ok(text);
                }
                Ok(Err(message)) => {
                    debug!(
                        attempt,
                        body = %script.body(),
                        error = %message,
                        "automation script attempt failed"
                    );
                    timed_out = false;
                    last_message = message;
                }
                Err(_) => {
                    debug!(
                        attempt,
                        body = %script.body(),
                        "automation script attempt timed out after {:?}",
                        budget.timeout
                    );
                    timed_out = true;
                    last_message =
                        format!("script did not complete within {:?}", budget.timeout);
                }
            }
        }

        if timed_out {
            Err(AutomationError::script_timeout(last_message))
        } else {
            Err(AutomationError::from_engine_error(last_message))
        }
    }
}
