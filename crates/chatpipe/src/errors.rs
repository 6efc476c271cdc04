use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Coarse classification of a failed automation script run.
///
/// Classification happens exactly once, at the script runner boundary.
/// Upper layers match on this enum and never re-inspect the raw error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptFailureKind {
    /// The attempt did not complete within its wall-clock budget.
    Timeout,
    /// The OS refused to let the script drive the UI. On macOS this is the
    /// accessibility permission for sending keystrokes.
    PermissionDenied,
    /// Anything else the script engine reported.
    ExecutionFailed,
}

#[derive(Error, Debug)]
pub enum AutomationError {
    /// Caller error, rejected before any automation runs. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The target application process does not exist.
    #[error("Target application is not running: {0}")]
    TargetNotRunning(String),

    /// No window of the target application became available within the
    /// configured wait bounds.
    #[error("No window found for target application: {0}")]
    WindowNotFound(String),

    /// An automation script exhausted its retry budget.
    #[error("Automation script failed ({kind:?}): {message}")]
    ScriptFailed {
        /// The last underlying error message.
        message: String,
        /// OS-level error number parsed from the engine's error text, if any.
        os_code: Option<i32>,
        kind: ScriptFailureKind,
    },
}

impl AutomationError {
    /// Build a `ScriptFailed` from the engine's raw error text, classifying
    /// it and extracting the OS error number in one place.
    pub(crate) fn from_engine_error(message: String) -> Self {
        let kind = classify_failure(&message);
        let os_code = parse_os_error_code(&message);
        AutomationError::ScriptFailed {
            message,
            os_code,
            kind,
        }
    }

    pub(crate) fn script_timeout(message: String) -> Self {
        AutomationError::ScriptFailed {
            message,
            os_code: None,
            kind: ScriptFailureKind::Timeout,
        }
    }
}

/// Substring osascript emits when the accessibility permission is missing.
const PERMISSION_MARKER: &str = "not allowed to send keystrokes";

/// osascript appends the OSStatus as a trailing "(-1719)" style suffix.
static OS_ERROR_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((-?\d+)\)\s*$").expect("static pattern"));

pub(crate) fn classify_failure(message: &str) -> ScriptFailureKind {
    if message.contains(PERMISSION_MARKER) {
        ScriptFailureKind::PermissionDenied
    } else {
        ScriptFailureKind::ExecutionFailed
    }
}

pub(crate) fn parse_os_error_code(message: &str) -> Option<i32> {
    OS_ERROR_CODE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_error_is_classified() {
        let msg = "osascript is not allowed to send keystrokes. (-1719)";
        assert_eq!(classify_failure(msg), ScriptFailureKind::PermissionDenied);
    }

    #[test]
    fn unknown_error_defaults_to_execution_failed() {
        assert_eq!(
            classify_failure("System Events got an error: Can't get window 1."),
            ScriptFailureKind::ExecutionFailed
        );
    }

    #[test]
    fn trailing_os_code_is_parsed() {
        assert_eq!(
            parse_os_error_code("execution error: something broke (-1728)"),
            Some(-1728)
        );
        assert_eq!(parse_os_error_code("error (25) occurred in the middle"), None);
        assert_eq!(parse_os_error_code("no code here"), None);
    }

    #[test]
    fn from_engine_error_carries_code_and_kind() {
        let err =
            AutomationError::from_engine_error("not allowed to send keystrokes. (-1719)".into());
        match err {
            AutomationError::ScriptFailed {
                os_code,
                kind,
                ..
            } => {
                assert_eq!(os_code, Some(-1719));
                assert_eq!(kind, ScriptFailureKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
