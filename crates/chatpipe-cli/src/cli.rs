use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::prompt::Flavor;

#[derive(Parser)]
#[command(name = "chatpipe")]
#[command(about = "Capture replies from GUI chat applications through the accessibility tree")]
#[command(
    long_about = "chatpipe drives a desktop chat application with OS-level UI automation: it \
pastes a prompt into the app, submits it, then polls the window's accessibility text until \
the reply stops changing."
)]
pub struct Cli {
    /// Config file path. Defaults to the user config directory.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a prompt and print the captured reply
    Ask(AskArgs),
    /// Dump the target window's accessibility text once and exit
    Peek,
}

#[derive(Parser, Debug)]
pub struct AskArgs {
    /// The prompt text
    pub prompt: String,

    /// Conversation to select before sending, matched against titles
    #[clap(long, short = 'c')]
    pub conversation: Option<String>,

    /// Overall reply timeout in milliseconds
    #[clap(long)]
    pub timeout_ms: Option<u64>,

    /// Polling interval in milliseconds
    #[clap(long)]
    pub interval_ms: Option<u64>,

    /// Consecutive identical samples required to call the reply finished
    #[clap(long)]
    pub stable_checks: Option<u32>,

    /// How to wrap the prompt before sending
    #[clap(long, value_enum, default_value_t = Flavor::Ask)]
    pub flavor: Flavor,

    /// Deliver the prompt without polling for a reply
    #[clap(long)]
    pub no_poll: bool,

    /// Emit the result as JSON
    #[clap(long)]
    pub json: bool,
}
