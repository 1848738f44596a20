use std::path::PathBuf;

use clap::Parser;

use crate::config::ChatConfig;
use crate::error::ChatError;

#[derive(Parser, Debug)]
#[command(name = "ws-chat")]
#[command(version)]
#[command(about = "A terminal chat client for a JSON-over-WebSocket chat server")]
pub struct Args {
    /// WebSocket endpoint of the chat server (default ws://localhost:8080/ws)
    #[arg(long, env = "WS_CHAT_URL")]
    pub url: Option<String>,

    /// Path to a TOML config file
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Stop reconnecting after this many consecutive failures (default: never)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Delay before the first reconnect attempt, in milliseconds
    #[arg(long)]
    pub initial_backoff_ms: Option<u64>,

    /// Upper bound on the delay between reconnect attempts, in milliseconds
    #[arg(long)]
    pub max_backoff_ms: Option<u64>,

    /// Number of most recent messages to display
    #[arg(long)]
    pub history_window: Option<usize>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// Build the effective config: defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> Result<ChatConfig, ChatError> {
        let mut config = match &self.config {
            Some(path) => ChatConfig::load(path)?,
            None => ChatConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(n) = self.max_attempts {
            config.reconnect.max_attempts = Some(n);
        }
        if let Some(ms) = self.initial_backoff_ms {
            config.reconnect.initial_delay_ms = ms;
        }
        if let Some(ms) = self.max_backoff_ms {
            config.reconnect.max_delay_ms = ms;
        }
        if let Some(n) = self.history_window {
            config.history_window = n;
        }
        if self.no_color {
            config.color = false;
        }

        config.validate()?;
        Ok(config)
    }
}
