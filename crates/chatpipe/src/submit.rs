//! Driving the target application's UI to deliver a prompt.
//!
//! The prompt text itself never appears in script source: it travels
//! through the clipboard and a synthesized Cmd-V. Only short, sanitized
//! identifiers are interpolated into AppleScript bodies.

use std::sync::Arc;

use tracing::{debug, info};

use crate::clipboard::{with_clipboard_guard, Clipboard};
use crate::config::{TargetApp, Timing};
use crate::errors::{AutomationError, ScriptFailureKind};
use crate::script::{AutomationScript, ScriptBudget, ScriptRunner};

/// Sanitize a string for safe interpolation into AppleScript source.
fn sanitize_applescript_string(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\n', '\r'], " ")
        .chars()
        .filter(|&c| c >= ' ' || c == '\t')
        .collect()
}

/// Submits one prompt to the target application, entirely through
/// runner-executed automation. Holds no per-request state.
pub struct PromptSubmitter {
    runner: Arc<ScriptRunner>,
    clipboard: Arc<dyn Clipboard>,
    target: TargetApp,
    timing: Timing,
}

impl PromptSubmitter {
    pub fn new(
        runner: Arc<ScriptRunner>,
        clipboard: Arc<dyn Clipboard>,
        target: TargetApp,
        timing: Timing,
    ) -> Self {
        Self {
            runner,
            clipboard,
            target,
            timing,
        }
    }

    /// Deliver `prompt`, optionally into the conversation whose title
    /// contains `conversation_id`. Conversation selection and input
    /// focusing are best-effort; window availability is not.
    pub async fn submit(
        &self,
        prompt: &str,
        conversation_id: Option<&str>,
    ) -> Result<(), AutomationError> {
        self.ensure_running().await?;

        self.run_step(&self.activate_script()).await?;
        self.pause().await;

        match conversation_id {
            Some(id) => {
                // Best-effort: fall back to whatever conversation is
                // frontmost if the title cannot be matched.
                if let Err(err) = self.run_step(&self.select_conversation_script(id)).await {
                    debug!("conversation selection failed, using frontmost: {err}");
                }
            }
            None => {
                self.run_step(&self.new_conversation_script()).await?;
            }
        }
        self.pause().await;

        self.wait_for_window().await?;

        if let Err(err) = self.run_step(&self.focus_input_script()).await {
            debug!("could not focus input element: {err}");
        }
        self.pause().await;

        self.run_step(&self.clear_input_script()).await?;
        self.pause().await;

        with_clipboard_guard(self.clipboard.as_ref(), async {
            self.clipboard.write_text(prompt).map_err(|err| {
                AutomationError::ScriptFailed {
                    message: format!("clipboard write failed: {err:#}"),
                    os_code: None,
                    kind: ScriptFailureKind::ExecutionFailed,
                }
            })?;
            self.run_step(&self.paste_script()).await?;
            self.pause().await;
            self.run_step(&self.submit_script()).await?;
            Ok::<(), AutomationError>(())
        })
        .await?;

        info!(app = %self.target.app_name, "prompt delivered");
        Ok(())
    }

    async fn ensure_running(&self) -> Result<(), AutomationError> {
        let probe = format!(
            r#"tell application "System Events" to (name of processes) contains "{}""#,
            sanitize_applescript_string(&self.target.process_name)
        );
        let out = self.run_step(&probe).await?;
        if out.trim() == "true" {
            Ok(())
        } else {
            Err(AutomationError::TargetNotRunning(
                self.target.app_name.clone(),
            ))
        }
    }

    /// Wait until the application has at least one window, checking a
    /// bounded number of times with a fixed delay between checks.
    async fn wait_for_window(&self) -> Result<(), AutomationError> {
        let script = format!(
            r#"tell application "System Events" to tell process "{}" to count windows"#,
            sanitize_applescript_string(&self.target.process_name)
        );
        for attempt in 1..=self.timing.window_check_attempts.max(1) {
            let out = self.run_step(&script).await?;
            if out.trim().parse::<u32>().unwrap_or(0) > 0 {
                return Ok(());
            }
            debug!(attempt, "no window yet");
            tokio::time::sleep(self.timing.window_check_delay()).await;
        }
        Err(AutomationError::WindowNotFound(
            self.target.app_name.clone(),
        ))
    }

    async fn run_step(&self, body: &str) -> Result<String, AutomationError> {
        let script = AutomationScript::new(body, self.budget());
        self.runner.run(&script).await
    }

    fn budget(&self) -> ScriptBudget {
        ScriptBudget {
            timeout: self.timing.script_timeout(),
            retries: self.timing.script_retries,
            retry_delay: self.timing.script_retry_delay(),
        }
    }

    async fn pause(&self) {
        tokio::time::sleep(self.timing.inter_step_delay()).await;
    }

    fn activate_script(&self) -> String {
        format!(
            r#"tell application "{}" to activate"#,
            sanitize_applescript_string(&self.target.app_name)
        )
    }

    fn new_conversation_script(&self) -> String {
        format!(
            r#"tell application "System Events" to tell process "{}" to keystroke "{}" using {{command down}}"#,
            sanitize_applescript_string(&self.target.process_name),
            sanitize_applescript_string(&self.target.new_conversation_key)
        )
    }

    fn select_conversation_script(&self, conversation_id: &str) -> String {
        format!(
            r#"
tell application "System Events"
    tell process "{proc}"
        set frontmost to true
        click (first button of front window whose name contains "{id}")
    end tell
end tell
"#,
            proc = sanitize_applescript_string(&self.target.process_name),
            id = sanitize_applescript_string(conversation_id),
        )
    }

    fn focus_input_script(&self) -> String {
        format!(
            r#"
tell application "System Events"
    tell process "{proc}"
        set focused of text area 1 of front window to true
    end tell
end tell
"#,
            proc = sanitize_applescript_string(&self.target.process_name),
        )
    }

    fn clear_input_script(&self) -> String {
        format!(
            r#"
tell application "System Events"
    tell process "{proc}"
        keystroke "a" using {{command down}}
        key code 51
    end tell
end tell
"#,
            proc = sanitize_applescript_string(&self.target.process_name),
        )
    }

    fn paste_script(&self) -> String {
        format!(
            r#"tell application "System Events" to tell process "{}" to keystroke "v" using {{command down}}"#,
            sanitize_applescript_string(&self.target.process_name)
        )
    }

    fn submit_script(&self) -> String {
        format!(
            r#"tell application "System Events" to tell process "{}" to keystroke return"#,
            sanitize_applescript_string(&self.target.process_name)
        )
    }
}
