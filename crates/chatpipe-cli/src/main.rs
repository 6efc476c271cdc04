//! chatpipe CLI
//!
//! Thin front end over the capture engine: loads config, sets up logging,
//! builds the request, prints the string or the error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatpipe::{
    AxTextSampler, CaptureEngine, CaptureRequest, Config, OsaScript, Sampler, ScriptBudget,
    ScriptRunner,
};

use crate::cli::{AskArgs, Cli, Commands};
use crate::prompt::format_prompt;

mod cli;
mod prompt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let _log_guard = init_tracing(&config);

    match cli.command {
        Commands::Ask(args) => ask(config, args).await,
        Commands::Peek => peek(config).await,
    }
}

async fn ask(mut config: Config, args: AskArgs) -> Result<()> {
    if args.no_poll {
        config.skip_polling = true;
    }

    let mut request = CaptureRequest::new(format_prompt(args.flavor, &args.prompt), &config);
    if let Some(conversation) = args.conversation {
        request = request.with_conversation(conversation);
    }
    if let Some(ms) = args.timeout_ms {
        request.timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.interval_ms {
        request.interval = Duration::from_millis(ms);
    }
    if let Some(checks) = args.stable_checks {
        request.required_stable_checks = checks;
    }

    let engine = CaptureEngine::new(config);
    let reply = engine.capture(request).await?;

    if args.json {
        println!("{}", serde_json::json!({ "reply": reply }));
    } else {
        println!("{reply}");
    }
    Ok(())
}

/// One accessibility dump of the target window, for tuning chrome and
/// generating markers against the real application.
async fn peek(config: Config) -> Result<()> {
    let runner = Arc::new(ScriptRunner::new(
        Arc::new(OsaScript),
        config.limits.max_script_len,
    ));
    let budget = ScriptBudget {
        timeout: config.timing.script_timeout(),
        retries: config.timing.script_retries,
        retry_delay: config.timing.script_retry_delay(),
    };
    let sampler = AxTextSampler::new(runner, config.target.clone(), budget);
    println!("{}", sampler.sample().await);
    Ok(())
}

fn init_tracing(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "chatpipe.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
