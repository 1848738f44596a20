//! Chat wire format.
//!
//! Every frame is a JSON text frame. Outbound frames carry exactly one field:
//!
//! ```json
//! {"text": "hello"}
//! ```
//!
//! Inbound frames are expected to have the same shape. The server also
//! replies with `{"error": "..."}` when it rejects something we sent; that is
//! decoded as [`InboundFrame::ServerError`] so it can be reported without
//! entering the message history. Anything else is a protocol violation and
//! decodes to a [`FrameError`], which callers drop.

use serde::{Deserialize, Serialize};

/// A single chat message. Display order is arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A successfully decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// A chat message to append to the history.
    Message(ChatMessage),
    /// The server rejected a frame and told us why.
    ServerError(String),
}

/// Reasons an inbound frame is dropped.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no `text` field")]
    MissingText,
    #[error("`text` field is not a string")]
    TextNotString,
}

/// Serialise a message as an outbound text frame.
pub fn encode_outbound(message: &ChatMessage) -> Result<String, FrameError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode an inbound text frame.
///
/// A frame with a string `text` field is a message; extra fields are
/// ignored. A frame without `text` but with a string `error` field is a
/// server error notice. Every other shape is an error.
pub fn decode_inbound(raw: &str) -> Result<InboundFrame, FrameError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let obj = value.as_object().ok_or(FrameError::NotAnObject)?;

    match obj.get("text") {
        Some(serde_json::Value::String(text)) => {
            Ok(InboundFrame::Message(ChatMessage::new(text.as_str())))
        }
        Some(_) => Err(FrameError::TextNotString),
        None => match obj.get("error").and_then(|v| v.as_str()) {
            Some(err) => Ok(InboundFrame::ServerError(err.to_string())),
            None => Err(FrameError::MissingText),
        },
    }
}
