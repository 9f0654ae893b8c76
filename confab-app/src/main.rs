//! confab example chat front-end.

mod chat;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "confab", version, about = "Chat with an LLM, tools included")]
struct Cli {
    /// Path to a .env file to load before startup.
    #[arg(short = 'e', long = "env", global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ModelArgs {
    /// Provider: openai, anthropic, openrouter, or a full URL of an
    /// OpenAI-compatible endpoint.
    #[arg(long, default_value = "openai")]
    provider: String,

    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// API key; falls back to the provider's environment variable.
    #[arg(long)]
    api_key: Option<String>,

    /// System prompt for the conversation.
    #[arg(long)]
    system: Option<String>,

    #[arg(long)]
    max_tokens: Option<u32>,

    /// Ceiling on model requests per tool-calling exchange.
    #[arg(long, default_value_t = 8)]
    budget: u32,

    /// Root directory for the filesystem tool. Defaults to the current
    /// directory; tools are disabled entirely with --no-tools.
    #[arg(long)]
    root: Option<PathBuf>,

    #[arg(long)]
    no_tools: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat session.
    Chat {
        #[command(flatten)]
        model: ModelArgs,
    },
    /// One-shot question, answer on stdout.
    Ask {
        prompt: String,
        #[command(flatten)]
        model: ModelArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    install_panic_hook();

    let cli = Cli::parse();
    if let Some(env_path) = &cli.env_file {
        dotenvy::from_path_override(env_path)
            .with_context(|| format!("failed to load env file: {}", env_path.display()))?;
    }

    match cli.command {
        Command::Chat { model } => chat::chat(model).await,
        Command::Ask { prompt, model } => chat::ask(model, &prompt).await,
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(v) => v,
        Err(_) => EnvFilter::new("warn,confab_llm=info,confab_tools=info,confab_app=info"),
    };
    let log_format = std::env::var("CONFAB_LOG_FORMAT")
        .unwrap_or_else(|_| "compact".to_string())
        .to_ascii_lowercase();

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .flatten_event(true)
                .init();
        }
        "pretty" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .pretty()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .compact()
                .init();
        }
        other => {
            return Err(anyhow::anyhow!(
                "unsupported CONFAB_LOG_FORMAT={other:?}; expected one of: json, pretty, compact"
            ));
        }
    }
    Ok(())
}

/// Routes panics through the log stream before the default hook prints
/// them, so crashes show up in structured output too.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(
            panic_location = %location,
            panic_payload = %payload,
            "panic captured"
        );
        default_hook(info);
    }));
}
