//! Read-only text sampling of the target window's accessibility tree.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::TargetApp;
use crate::script::{AutomationScript, ScriptBudget, ScriptRunner};

/// Prefix of every in-band sampling failure. The poller matches on this to
/// tell transient UI noise from an actual sample.
pub const ERROR_SENTINEL: &str = "Error:";

/// Sentinel returned when the target process no longer exists. The poller
/// aborts on this one instead of re-polling.
pub const PROCESS_GONE_SENTINEL: &str = "Error: application process is gone";

const NO_WINDOW_SENTINEL: &str = "Error: no window";

/// Read-only view of the target's front window text.
///
/// Sampling never fails loudly: all failure modes come back as an
/// `"Error: …"` sentinel string so the poller can keep its loop simple.
/// Failures are expected to happen periodically while the UI is actively
/// updating and are handled by the poller, not retried here.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self) -> String;
}

/// Production sampler: walks every static-text leaf of the front window
/// through System Events and joins their values with blank lines.
pub struct AxTextSampler {
    runner: Arc<ScriptRunner>,
    target: TargetApp,
    budget: ScriptBudget,
}

impl AxTextSampler {
    pub fn new(runner: Arc<ScriptRunner>, target: TargetApp, budget: ScriptBudget) -> Self {
        Self {
            runner,
            target,
            budget,
        }
    }

    fn dump_script(&self) -> String {
        format!(
            r#"
tell application "System Events"
    if not (exists process "{proc}") then return "{gone}"
    tell process "{proc}"
        if (count of windows) is 0 then return "{no_window}"
        try
            set collected to ""
            repeat with t in (every static text of entire contents of front window)
                set v to value of t
                if v is not missing value and v is not "" then
                    if collected is "" then
                        set collected to v
                    else
                        set collected to collected & linefeed & linefeed & v
                    end if
                end if
            end repeat
            return collected
        on error errMsg
            return "Error: " & errMsg
        end try
    end tell
end tell
"#,
            proc = self.target.process_name,
            gone = PROCESS_GONE_SENTINEL,
            no_window = NO_WINDOW_SENTINEL,
        )
    }
}

#[async_trait]
impl Sampler for AxTextSampler {
    async fn sample(&self) -> String {
        let script = AutomationScript::new(self.dump_script(), self.budget);
        match self.runner.run(&script).await {
            Ok(text) => text,
            // Plumbing failures get the same in-band shape as in-script
            // failures; the poller treats both as a no-op tick.
            Err(err) => {
                debug!("sampling failed: {err}");
                format!("{ERROR_SENTINEL} {err}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{OsaScript, ScriptEngine};

    #[test]
    fn dump_script_names_the_configured_process() {
        let runner = Arc::new(ScriptRunner::new(Arc::new(OsaScript), 32_768));
        let sampler = AxTextSampler::new(
            runner,
            TargetApp {
                app_name: "Claude".to_string(),
                process_name: "Claude".to_string(),
                new_conversation_key: "n".to_string(),
            },
            ScriptBudget::default(),
        );

        let script = sampler.dump_script();
        assert!(script.contains(r#"exists process "Claude""#));
        assert!(script.contains(PROCESS_GONE_SENTINEL));
    }

    #[tokio::test]
    async fn runner_errors_become_error_sentinels() {
        struct BrokenEngine;

        #[async_trait]
        impl ScriptEngine for BrokenEngine {
            async fn execute(&self, _body: &str) -> Result<String, String> {
                Err("execution error: UI busy (-1712)".to_string())
            }
        }

        let runner = Arc::new(ScriptRunner::new(Arc::new(BrokenEngine), 32_768));
        let sampler = AxTextSampler::new(
            runner,
            TargetApp::default(),
            ScriptBudget {
                retries: 1,
                ..ScriptBudget::default()
            },
        );

        let raw = sampler.sample().await;
        assert!(raw.starts_with(ERROR_SENTINEL));
    }
}
