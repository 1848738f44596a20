//! Crate-level error type.
//!
//! Only the setup paths are fallible in a way the caller sees: parsing the
//! endpoint, loading the config file and talking to the terminal. Once the
//! chat loop is running, transport failures degrade to connection-state
//! transitions instead of errors.

use std::path::PathBuf;

/// Errors returned by the fallible setup and I/O paths of the client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The endpoint is not a `ws://` or `wss://` URL.
    #[error("invalid endpoint '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The config file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A config value is out of range.
    #[error("invalid config value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// Reading stdin or writing the rendered view failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
