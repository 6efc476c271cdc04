//! The capture engine: the one entry point callers go through.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::Config;
use crate::errors::AutomationError;
use crate::poll::{poll_for_reply, CaptureOutcome, PollSession};
use crate::sample::{AxTextSampler, Sampler};
use crate::script::{OsaScript, ScriptBudget, ScriptEngine, ScriptRunner};
use crate::submit::PromptSubmitter;

/// Returned when the deadline passed and nothing could be captured. The
/// prompt itself was delivered.
pub const NO_REPLY_FALLBACK: &str =
    "Prompt was sent, but no reply could be captured from the application window before the timeout.";

/// Returned when polling is disabled via configuration.
pub const SENT_WITHOUT_POLLING: &str =
    "Prompt was sent; reply polling is disabled, so no reply was captured.";

/// One capture request. Polling knobs default from configuration but are
/// settable per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub prompt: String,
    pub conversation_id: Option<String>,
    pub timeout: Duration,
    pub interval: Duration,
    pub required_stable_checks: u32,
}

impl CaptureRequest {
    /// A request for `prompt` with the configured polling defaults.
    pub fn new(prompt: impl Into<String>, config: &Config) -> Self {
        Self {
            prompt: prompt.into(),
            conversation_id: None,
            timeout: config.timing.reply_timeout(),
            interval: config.timing.poll_interval(),
            required_stable_checks: config.timing.required_stable_checks,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// Submit-then-poll over one target application. One logical request at a
/// time: concurrent captures against the same application instance race on
/// clipboard and focused-window state and are unsupported.
pub struct CaptureEngine {
    submitter: PromptSubmitter,
    sampler: Arc<dyn Sampler>,
    config: Config,
    cancel: CancellationToken,
}

impl CaptureEngine {
    /// Engine wired to the OS: osascript, the system clipboard, and the
    /// accessibility-tree sampler.
    pub fn new(config: Config) -> Self {
        Self::with_backends(config, Arc::new(OsaScript), Arc::new(SystemClipboard))
    }

    /// Engine over explicit backends. This is the seam tests use.
    pub fn with_backends(
        config: Config,
        engine: Arc<dyn ScriptEngine>,
        clipboard: Arc<dyn Clipboard>,
    ) -> Self {
        let runner = Arc::new(ScriptRunner::new(engine, config.limits.max_script_len));
        let budget = ScriptBudget {
            timeout: config.timing.script_timeout(),
            retries: config.timing.script_retries,
            retry_delay: config.timing.script_retry_delay(),
        };
        let sampler = Arc::new(AxTextSampler::new(
            runner.clone(),
            config.target.clone(),
            budget,
        ));
        Self::with_sampler(config, runner, clipboard, sampler)
    }

    /// Engine over an explicit sampler as well, for tests that script the
    /// sampled text directly.
    pub fn with_sampler(
        config: Config,
        runner: Arc<ScriptRunner>,
        clipboard: Arc<dyn Clipboard>,
        sampler: Arc<dyn Sampler>,
    ) -> Self {
        let submitter = PromptSubmitter::new(
            runner,
            clipboard,
            config.target.clone(),
            config.timing.clone(),
        );
        Self {
            submitter,
            sampler,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// A token a surrounding layer can use to short-circuit the poll loop.
    /// The engine itself never requires cancellation.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Submit the prompt and capture the reply.
    ///
    /// The caller always receives a string — the stabilized reply, a
    /// best-effort partial reply, or an explanatory sentinel — except for
    /// the precondition failures (`InvalidInput`, `TargetNotRunning`,
    /// `WindowNotFound`) and classified script failures, which surface as
    /// errors so the caller can remediate.
    pub async fn capture(&self, request: CaptureRequest) -> Result<String, AutomationError> {
        self.validate(&request)?;

        self.submitter
            .submit(&request.prompt, request.conversation_id.as_deref())
            .await?;

        if self.config.skip_polling() {
            info!("polling disabled, acknowledging delivery only");
            return Ok(SENT_WITHOUT_POLLING.to_string());
        }

        // Give the application time to begin rendering before the first
        // sample.
        tokio::time::sleep(self.config.timing.settle_delay()).await;

        let mut session = PollSession::new(
            &request.prompt,
            request.interval,
            request.timeout,
            request.required_stable_checks,
            self.config.markers.clone(),
            self.config.limits.min_reply_len,
        );

        match poll_for_reply(self.sampler.as_ref(), &mut session, &self.cancel).await {
            CaptureOutcome::Reply(text) | CaptureOutcome::Partial(text) => Ok(text),
            CaptureOutcome::NoReply => Ok(NO_REPLY_FALLBACK.to_string()),
            // The precondition stopped holding mid-capture.
            CaptureOutcome::Aborted => Err(AutomationError::TargetNotRunning(
                self.config.target.app_name.clone(),
            )),
        }
    }

    fn validate(&self, request: &CaptureRequest) -> Result<(), AutomationError> {
        if request.prompt.trim().is_empty() {
            return Err(AutomationError::InvalidInput(
                "prompt must not be empty".to_string(),
            ));
        }
        let prompt_len = request.prompt.chars().count();
        if prompt_len > self.config.limits.max_prompt_len {
            return Err(AutomationError::InvalidInput(format!(
                "prompt is {prompt_len} characters, maximum is {}",
                self.config.limits.max_prompt_len
            )));
        }
        if let Some(id) = &request.conversation_id {
            if id.chars().count() > self.config.limits.max_conversation_id_len {
                return Err(AutomationError::InvalidInput(format!(
                    "conversation id exceeds {} characters",
                    self.config.limits.max_conversation_id_len
                )));
            }
        }
        if request.timeout.is_zero() || request.interval.is_zero() {
            return Err(AutomationError::InvalidInput(
                "timeout and interval must be positive".to_string(),
            ));
        }
        if request.required_stable_checks == 0 {
            return Err(AutomationError::InvalidInput(
                "required_stable_checks must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
