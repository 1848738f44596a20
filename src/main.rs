use clap::Parser;
use tracing_subscriber::EnvFilter;

use ws_chat::cli::Args;
use ws_chat::ChatError;

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "ws_chat=info";

#[tokio::main]
async fn main() -> Result<(), ChatError> {
    let args = Args::parse();

    // Logs go to stderr so they stay out of the rendered chat on stdout.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = args.resolve_config()?;
    if !config.color {
        colored::control::set_override(false);
    }

    ws_chat::app::run(config).await
}
