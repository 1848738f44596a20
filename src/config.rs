//! Client configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, and command-line flags (the `--url` flag also reads
//! `WS_CHAT_URL`). Example file:
//!
//! ```toml
//! url = "ws://chat.example.com:8080/ws"
//! history_window = 50
//! color = true
//!
//! [reconnect]
//! initial_delay_ms = 500
//! max_delay_ms = 30000
//! multiplier = 2.0
//! jitter = 0.2
//! max_attempts = 20
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::http::Uri;

use crate::error::ChatError;
use crate::reconnect::ReconnectPolicy;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";

/// Number of most recent messages drawn in the message panel.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    /// WebSocket endpoint of the chat server.
    pub url: String,
    /// How many of the latest messages the view draws.
    pub history_window: usize,
    /// Emit ANSI colour codes.
    pub color: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            history_window: DEFAULT_HISTORY_WINDOW,
            color: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ChatConfig {
    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ChatError> {
        toml::from_str(text).map_err(|source| ChatError::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, ChatError> {
        let text = std::fs::read_to_string(path).map_err(|source| ChatError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Check every field, including the reconnect policy.
    pub fn validate(&self) -> Result<(), ChatError> {
        validate_url(&self.url)?;
        if self.history_window == 0 {
            return Err(ChatError::InvalidConfig {
                field: "history_window",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.reconnect.validate()
    }
}

/// Accept only absolute `ws://` or `wss://` URLs with a host.
pub fn validate_url(url: &str) -> Result<(), ChatError> {
    let invalid = |reason: &str| ChatError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|_| invalid("not a valid URL"))?;
    match uri.scheme_str() {
        Some("ws") | Some("wss") => {}
        Some(_) => return Err(invalid("scheme must be ws or wss")),
        None => return Err(invalid("missing ws:// or wss:// scheme")),
    }
    match uri.host() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(invalid("missing host")),
    }
}
