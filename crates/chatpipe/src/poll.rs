//! The stability poll loop: sample, extract, and decide when the reply has
//! stopped changing.
//!
//! "The reply is finished" is approximated by "the extracted candidate has
//! held still for N consecutive samples with no generating indicator on
//! screen". The ambiguity is kept visible in the type system: the session
//! is always in exactly one [`PollState`], and the per-tick transition is a
//! pure function over the raw sample so it can be tested without any OS
//! automation.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Markers;
use crate::extract::extract_reply;
use crate::sample::{Sampler, ERROR_SENTINEL, PROCESS_GONE_SENTINEL};

/// Where a capture attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Still sampling; the reply may not have finished rendering.
    Polling,
    /// The candidate held still long enough to call the reply finished.
    Stable,
    /// The overall deadline passed first.
    TimedOut,
    /// The target process disappeared mid-capture.
    Aborted,
}

/// What the poll loop hands back to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A reply that stabilized before the deadline.
    Reply(String),
    /// The deadline passed, but something was captured. The prompt was in
    /// fact delivered, so returning a partial reply beats returning
    /// nothing.
    Partial(String),
    /// The deadline passed with nothing captured.
    NoReply,
    /// The target process went away.
    Aborted,
}

/// Per-request polling state. Exactly one session exists per logical
/// request; it is created when a capture attempt starts, mutated once per
/// tick, and discarded when the session terminates.
pub struct PollSession {
    request_id: Uuid,
    prompt: String,
    started: Instant,
    interval: Duration,
    timeout: Duration,
    required_stable_checks: u32,
    stable_count: u32,
    last_candidate: Option<String>,
    last_raw: Option<String>,
    state: PollState,
    markers: Markers,
    min_reply_len: usize,
}

impl PollSession {
    pub fn new(
        prompt: &str,
        interval: Duration,
        timeout: Duration,
        required_stable_checks: u32,
        markers: Markers,
        min_reply_len: usize,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            prompt: prompt.to_string(),
            started: Instant::now(),
            interval,
            timeout,
            required_stable_checks: required_stable_checks.max(1),
            stable_count: 0,
            last_candidate: None,
            last_raw: None,
            state: PollState::Polling,
            markers,
            min_reply_len,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn last_candidate(&self) -> Option<&str> {
        self.last_candidate.as_deref()
    }

    /// The raw text of the most recent sample, error sentinels included.
    pub fn last_raw(&self) -> Option<&str> {
        self.last_raw.as_deref()
    }

    /// One tick of the state machine. `stable_count` is the number of
    /// consecutive samples the current candidate has been observed for; a
    /// generating indicator forces it back to zero even when the sampled
    /// text looks unchanged, since the target may still be racing ahead of
    /// the accessibility tree.
    pub fn observe(&mut self, raw: &str) {
        if self.state != PollState::Polling {
            return;
        }
        self.last_raw = Some(raw.to_string());

        if raw.starts_with(PROCESS_GONE_SENTINEL) {
            debug!(request_id = %self.request_id, "target process is gone, aborting");
            self.state = PollState::Aborted;
            return;
        }
        if raw.starts_with(ERROR_SENTINEL) {
            // Transient UI error. No state change, just re-poll.
            debug!(request_id = %self.request_id, "transient sampling error: {raw}");
            return;
        }

        let generating = self
            .markers
            .generating
            .iter()
            .any(|m| !m.is_empty() && raw.contains(m.as_str()));

        if let Some(candidate) =
            extract_reply(raw, &self.prompt, &self.markers, self.min_reply_len)
        {
            if self.last_candidate.as_deref() == Some(candidate.as_str()) {
                self.stable_count += 1;
            } else {
                debug!(
                    request_id = %self.request_id,
                    chars = candidate.chars().count(),
                    "candidate changed"
                );
                self.last_candidate = Some(candidate);
                self.stable_count = 1;
            }
        }

        if generating {
            self.stable_count = 0;
            return;
        }

        if self.last_candidate.is_some() && self.stable_count >= self.required_stable_checks {
            self.state = PollState::Stable;
        }
    }

    fn deadline(&self) -> Instant {
        self.started + self.timeout
    }

    fn mark_timed_out(&mut self) {
        if self.state == PollState::Polling {
            self.state = PollState::TimedOut;
        }
    }
}

/// Drive `session` against `sampler` until it leaves `Polling` or the
/// deadline passes. Strictly sequential: one sample in flight at a time,
/// with a fixed sleep between ticks. Cancellation short-circuits into the
/// same best-effort path as a timeout.
pub async fn poll_for_reply(
    sampler: &dyn Sampler,
    session: &mut PollSession,
    cancel: &CancellationToken,
) -> CaptureOutcome {
    info!(
        request_id = %session.request_id,
        timeout = ?session.timeout,
        interval = ?session.interval,
        "polling for reply"
    );

    let deadline = session.deadline();
    while !cancel.is_cancelled() && Instant::now() < deadline {
        let raw = sampler.sample().await;
        session.observe(&raw);

        match session.state() {
            PollState::Stable => {
                let reply = session
                    .last_candidate()
                    .expect("stable state implies a candidate")
                    .to_string();
                info!(request_id = %session.request_id, "reply stabilized");
                return CaptureOutcome::Reply(reply);
            }
            PollState::Aborted => return CaptureOutcome::Aborted,
            PollState::Polling => {}
            PollState::TimedOut => break,
        }

        let next_tick = Instant::now() + session.interval;
        tokio::select! {
            _ = tokio::time::sleep_until(next_tick.min(deadline)) => {}
            _ = cancel.cancelled() => {}
        }
    }

    session.mark_timed_out();
    match session.last_candidate() {
        Some(candidate) if !candidate.is_empty() => {
            info!(request_id = %session.request_id, "deadline passed, returning partial reply");
            CaptureOutcome::Partial(candidate.to_string())
        }
        _ => {
            info!(request_id = %session.request_id, "deadline passed with no reply captured");
            CaptureOutcome::NoReply
        }
    }
}
