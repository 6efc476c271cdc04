//! End-to-end capture flow over scripted backends: no osascript, no real
//! clipboard, paused tokio time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chatpipe::{
    AutomationError, CaptureEngine, CaptureRequest, Clipboard, Config, Sampler, ScriptEngine,
    ScriptRunner, NO_REPLY_FALLBACK, PROCESS_GONE_SENTINEL, SENT_WITHOUT_POLLING,
};

/// Script engine that answers the submitter's probe scripts and counts
/// every execution.
struct StubEngine {
    calls: AtomicUsize,
    app_running: bool,
    window_count: &'static str,
}

impl StubEngine {
    fn healthy() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            app_running: true,
            window_count: "1",
        }
    }

    fn not_running() -> Self {
        Self {
            app_running: false,
            ..Self::healthy()
        }
    }

    fn windowless() -> Self {
        Self {
            window_count: "0",
            ..Self::healthy()
        }
    }
}

#[async_trait]
impl ScriptEngine for StubEngine {
    async fn execute(&self, body: &str) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if body.contains("name of processes") {
            return Ok(if self.app_running { "true" } else { "false" }.to_string());
        }
        if body.contains("count windows") {
            return Ok(self.window_count.to_string());
        }
        Ok(String::new())
    }
}

/// Sampler that plays back a fixed sequence, repeating the last entry.
struct SequenceSampler {
    samples: Vec<String>,
    cursor: AtomicUsize,
    calls: AtomicUsize,
}

impl SequenceSampler {
    fn new(samples: &[&str]) -> Self {
        Self {
            samples: samples.iter().map(|s| s.to_string()).collect(),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Sampler for SequenceSampler {
    async fn sample(&self) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let i = self.cursor.fetch_add(1, Ordering::SeqCst);
        self.samples[i.min(self.samples.len() - 1)].clone()
    }
}

/// Sampler whose output keeps changing forever.
struct GrowingSampler {
    tick: AtomicUsize,
}

#[async_trait]
impl Sampler for GrowingSampler {
    async fn sample(&self) -> String {
        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        format!("the question\n\npartial reply through tick number {tick}")
    }
}

struct FakeClipboard {
    text: Mutex<String>,
}

impl FakeClipboard {
    fn with(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
        }
    }

    fn current(&self) -> String {
        self.text.lock().unwrap().clone()
    }
}

impl Clipboard for FakeClipboard {
    fn read_text(&self) -> anyhow::Result<String> {
        Ok(self.current())
    }

    fn write_text(&self, text: &str) -> anyhow::Result<()> {
        *self.text.lock().unwrap() = text.to_string();
        Ok(())
    }
}

/// Config with the fixed inter-step waits zeroed so tests only measure the
/// poll loop.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.timing.inter_step_delay_ms = 0;
    config.timing.window_check_delay_ms = 0;
    config.timing.window_check_attempts = 2;
    config.timing.settle_delay_ms = 0;
    config.timing.script_retry_delay_ms = 0;
    config
}

fn engine_with(
    config: Config,
    stub: Arc<StubEngine>,
    clipboard: Arc<FakeClipboard>,
    sampler: Arc<dyn Sampler>,
) -> CaptureEngine {
    let runner = Arc::new(ScriptRunner::new(stub, config.limits.max_script_len));
    CaptureEngine::with_sampler(config, runner, clipboard, sampler)
}

fn request(prompt: &str, timeout_ms: u64, interval_ms: u64, stable: u32) -> CaptureRequest {
    CaptureRequest {
        prompt: prompt.to_string(),
        conversation_id: None,
        timeout: Duration::from_millis(timeout_ms),
        interval: Duration::from_millis(interval_ms),
        required_stable_checks: stable,
    }
}

#[tokio::test(start_paused = true)]
async fn stable_reply_is_captured_within_two_ticks() {
    let sampler = Arc::new(SequenceSampler::new(&[
        "what is the answer\n\nHello! 42",
        "what is the answer\n\nHello! 42",
    ]));
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::healthy()),
        Arc::new(FakeClipboard::with("")),
        sampler,
    );

    let started = tokio::time::Instant::now();
    let reply = engine
        .capture(request("what is the answer", 5_000, 100, 2))
        .await
        .unwrap();

    assert_eq!(reply, "Hello! 42");
    // Two ticks with one interval sleep between them.
    assert!(started.elapsed() <= Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn endless_generation_yields_the_fallback_sentinel() {
    let sampler = Arc::new(SequenceSampler::new(&["▍ Thinking"]));
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::healthy()),
        Arc::new(FakeClipboard::with("")),
        sampler,
    );

    let started = tokio::time::Instant::now();
    let reply = engine
        .capture(request("the question", 500, 100, 2))
        .await
        .unwrap();

    assert_eq!(reply, NO_REPLY_FALLBACK);
    // The poll loop never runs past the deadline.
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(started.elapsed() <= Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn never_stable_reply_is_returned_as_partial() {
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::healthy()),
        Arc::new(FakeClipboard::with("")),
        Arc::new(GrowingSampler {
            tick: AtomicUsize::new(0),
        }),
    );

    let reply = engine
        .capture(request("the question", 500, 100, 2))
        .await
        .unwrap();

    assert!(reply.starts_with("partial reply through tick number"));
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_any_automation() {
    let stub = Arc::new(StubEngine::healthy());
    let engine = engine_with(
        fast_config(),
        stub.clone(),
        Arc::new(FakeClipboard::with("")),
        Arc::new(SequenceSampler::new(&[""])),
    );

    let err = engine.capture(request("   ", 500, 100, 2)).await.unwrap_err();

    assert!(matches!(err, AutomationError::InvalidInput(_)));
    assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn vanished_process_aborts_within_one_tick() {
    let sampler = Arc::new(SequenceSampler::new(&[PROCESS_GONE_SENTINEL]));
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::healthy()),
        Arc::new(FakeClipboard::with("")),
        sampler.clone(),
    );

    let started = tokio::time::Instant::now();
    let err = engine
        .capture(request("the question", 60_000, 100, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::TargetNotRunning(_)));
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn not_running_target_fails_before_sampling() {
    let sampler = Arc::new(SequenceSampler::new(&[""]));
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::not_running()),
        Arc::new(FakeClipboard::with("")),
        sampler.clone(),
    );

    let err = engine
        .capture(request("hello", 500, 100, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::TargetNotRunning(_)));
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_window_surfaces_window_not_found() {
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::windowless()),
        Arc::new(FakeClipboard::with("")),
        Arc::new(SequenceSampler::new(&[""])),
    );

    let err = engine
        .capture(request("hello", 500, 100, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::WindowNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn clipboard_is_restored_after_a_capture() {
    let clipboard = Arc::new(FakeClipboard::with("user data"));
    let engine = engine_with(
        fast_config(),
        Arc::new(StubEngine::healthy()),
        clipboard.clone(),
        Arc::new(SequenceSampler::new(&["hello\n\nthe reply text"])),
    );

    engine.capture(request("hello", 500, 100, 2)).await.unwrap();

    assert_eq!(clipboard.current(), "user data");
}

#[tokio::test(start_paused = true)]
async fn skip_polling_acknowledges_without_sampling() {
    let mut config = fast_config();
    config.skip_polling = true;
    let sampler = Arc::new(SequenceSampler::new(&[""]));
    let engine = engine_with(
        config,
        Arc::new(StubEngine::healthy()),
        Arc::new(FakeClipboard::with("")),
        sampler.clone(),
    );

    let reply = engine.capture(request("hello", 500, 100, 2)).await.unwrap();

    assert_eq!(reply, SENT_WITHOUT_POLLING);
    assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
}
