//! Terminal client for a JSON-over-WebSocket chat server.
//!
//! The [`connection`] module owns the socket and reports typed events; the
//! [`chat_view`] module folds those events into what the user sees and turns
//! typed lines into outbound messages; [`app`] wires the two together.

pub mod app;
pub mod chat_view;
pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod reconnect;
pub mod render;

pub use chat_view::{ChatView, Key};
pub use config::ChatConfig;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionState, Outbox};
pub use error::ChatError;
pub use protocol::{decode_inbound, encode_outbound, ChatMessage, FrameError, InboundFrame};
pub use reconnect::{Backoff, ReconnectPolicy};
