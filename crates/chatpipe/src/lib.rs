//! Response capture from GUI chat applications through accessibility
//! automation.
//!
//! Some desktop applications generate text you want programmatically but
//! expose no API — only a window that OS-level UI automation can drive and
//! an accessibility tree it can read. This crate submits a prompt through
//! keyboard and clipboard injection, then repeatedly samples the window's
//! text until the extracted reply stops changing. There is no "done" signal
//! from the target; everything downstream of submission is a best-effort
//! state machine over a noisy, externally-controlled text stream.

pub mod clipboard;
pub mod config;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod poll;
pub mod sample;
pub mod script;
pub mod submit;

pub use clipboard::{with_clipboard_guard, Clipboard, ClipboardGuard, SystemClipboard};
pub use config::{Config, Limits, Markers, TargetApp, Timing};
pub use engine::{CaptureEngine, CaptureRequest, NO_REPLY_FALLBACK, SENT_WITHOUT_POLLING};
pub use errors::{AutomationError, ScriptFailureKind};
pub use extract::extract_reply;
pub use poll::{poll_for_reply, CaptureOutcome, PollSession, PollState};
pub use sample::{AxTextSampler, Sampler, ERROR_SENTINEL, PROCESS_GONE_SENTINEL};
pub use script::{AutomationScript, OsaScript, ScriptBudget, ScriptEngine, ScriptRunner};
pub use submit::PromptSubmitter;
pub use tokio_util::sync::CancellationToken;
