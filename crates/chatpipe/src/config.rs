//! Runtime configuration.
//!
//! Every empirically tuned constant in the capture flow lives here rather
//! than in code: the stability thresholds and settle delays have no
//! principled derivation and do not generalize across target applications
//! or OS versions, so they must stay tunable without a rebuild.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that disables reply polling ("fire and forget").
pub const NO_POLL_ENV: &str = "CHATPIPE_NO_POLL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetApp,
    pub timing: Timing,
    pub limits: Limits,
    pub markers: Markers,
    /// Skip polling entirely and return an immediate "sent, not polled"
    /// acknowledgement. Also settable via `CHATPIPE_NO_POLL`.
    pub skip_polling: bool,
    /// Directory for daily-rotated log files. Unset = stderr only.
    pub log_dir: Option<PathBuf>,
}

/// Identity of the GUI application being driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetApp {
    /// Name used in `tell application "..."` clauses.
    pub app_name: String,
    /// System Events process name (usually the same).
    pub process_name: String,
    /// Key pressed with Command to open a new conversation.
    pub new_conversation_key: String,
}

impl Default for TargetApp {
    fn default() -> Self {
        Self {
            app_name: "ChatGPT".to_string(),
            process_name: "ChatGPT".to_string(),
            new_conversation_key: "n".to_string(),
        }
    }
}

/// Delays, budgets and poll defaults, in milliseconds where applicable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Hard wall-clock budget per script attempt.
    pub script_timeout_ms: u64,
    /// Total attempts per script, including the first.
    pub script_retries: u32,
    /// Constant delay between attempts. No backoff multiplier.
    pub script_retry_delay_ms: u64,
    /// Pause between UI-driving steps, for the app's async UI updates.
    pub inter_step_delay_ms: u64,
    /// Delay between window-existence checks after submission starts.
    pub window_check_delay_ms: u64,
    /// Maximum window-existence checks before giving up.
    pub window_check_attempts: u32,
    /// Pause between submitting and the first sample, so the app can start
    /// rendering.
    pub settle_delay_ms: u64,
    /// Default polling interval.
    pub poll_interval_ms: u64,
    /// Default overall reply timeout.
    pub reply_timeout_ms: u64,
    /// Consecutive identical non-empty samples required to call the reply
    /// finished.
    pub required_stable_checks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            script_timeout_ms: 30_000,
            script_retries: 3,
            script_retry_delay_ms: 500,
            inter_step_delay_ms: 300,
            window_check_delay_ms: 500,
            window_check_attempts: 10,
            settle_delay_ms: 2_000,
            poll_interval_ms: 1_000,
            reply_timeout_ms: 120_000,
            required_stable_checks: 2,
        }
    }
}

impl Timing {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    pub fn script_retry_delay(&self) -> Duration {
        Duration::from_millis(self.script_retry_delay_ms)
    }

    pub fn inter_step_delay(&self) -> Duration {
        Duration::from_millis(self.inter_step_delay_ms)
    }

    pub fn window_check_delay(&self) -> Duration {
        Duration::from_millis(self.window_check_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Input size bounds, enforced before any automation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_prompt_len: usize,
    pub max_conversation_id_len: usize,
    pub max_script_len: usize,
    /// Minimum length for the extractor's no-prompt-anchor fallback.
    pub min_reply_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_prompt_len: 16_000,
            max_conversation_id_len: 200,
            max_script_len: 32_768,
            min_reply_len: 20,
        }
    }
}

/// Strings the capture flow matches against raw accessibility dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Live "still generating" indicators. Any occurrence resets stability.
    pub generating: Vec<String>,
    /// UI chrome: the candidate reply is truncated at the earliest of these.
    pub chrome: Vec<String>,
    /// Placeholders shown before any conversation content exists.
    pub empty_states: Vec<String>,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            generating: vec![
                "▍".to_string(),
                "Stop generating".to_string(),
                "is typing".to_string(),
                "Thinking".to_string(),
            ],
            chrome: vec![
                "Copy".to_string(),
                "Share".to_string(),
                "Edit".to_string(),
                "Regenerate".to_string(),
                "ChatGPT can make mistakes. Check important info.".to_string(),
            ],
            empty_states: vec![
                "What can I help with?".to_string(),
                "Ask anything".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location when
    /// `path` is `None`. A missing default file yields the defaults; an
    /// explicitly named file must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let p = Self::default_path();
                match p {
                    Some(p) if p.exists() => Self::from_file(&p),
                    _ => Ok(Self::default()),
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("chatpipe").join("config.toml"))
    }

    /// Effective skip-polling flag: the config field or the environment
    /// escape hatch.
    pub fn skip_polling(&self) -> bool {
        if self.skip_polling {
            return true;
        }
        std::env::var(NO_POLL_ENV)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false)
    }
}
