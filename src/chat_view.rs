//! Chat view state: the draft, the received history, and what the user sees
//! of the connection.
//!
//! The view never touches the socket. User intent goes out through an
//! [`Outbox`]; connection news comes in as [`ConnectionEvent`]s folded in with
//! [`ChatView::apply`].

use tracing::warn;

use crate::connection::{ConnectionEvent, ConnectionState, Outbox};
use crate::protocol::{decode_inbound, ChatMessage, InboundFrame};

/// Keys the view reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    /// The commit key; same as [`ChatView::on_submit`].
    Enter,
}

#[derive(Debug, Clone)]
pub struct ChatView {
    draft: String,
    messages: Vec<ChatMessage>,
    state: ConnectionState,
    /// Set once the connection manager stops reconnecting.
    gave_up_after: Option<u32>,
    /// Last `{"error": ...}` notice from the server.
    server_notice: Option<String>,
    dropped_frames: u64,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView {
    /// A freshly mounted view. The connection is dialing.
    pub fn new() -> Self {
        Self {
            draft: String::new(),
            messages: Vec::new(),
            state: ConnectionState::Connecting,
            gave_up_after: None,
            server_notice: None,
            dropped_frames: 0,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Every message received since mount, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn gave_up_after(&self) -> Option<u32> {
        self.gave_up_after
    }

    pub fn server_notice(&self) -> Option<&str> {
        self.server_notice.as_deref()
    }

    /// Inbound frames discarded as malformed.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Whether the send control is usable.
    pub fn is_send_enabled(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Whether the "connection lost" banner is visible.
    pub fn shows_banner(&self) -> bool {
        self.state != ConnectionState::Open
    }

    pub fn on_draft_change(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Send the draft if it has content and the connection is open, then
    /// clear it. Returns whether a message went out.
    ///
    /// Whitespace-only drafts are ignored. While not open this is a no-op and
    /// the draft is kept.
    pub fn on_submit(&mut self, outbox: &impl Outbox) -> bool {
        if !self.is_send_enabled() || self.draft.trim().is_empty() {
            return false;
        }
        let message = ChatMessage::new(std::mem::take(&mut self.draft));
        outbox.send(&message);
        true
    }

    pub fn on_key(&mut self, key: Key, outbox: &impl Outbox) {
        match key {
            Key::Char(c) => self.draft.push(c),
            Key::Backspace => {
                self.draft.pop();
            }
            Key::Enter => {
                self.on_submit(outbox);
            }
        }
    }

    /// Fold a connection event into the view.
    pub fn apply(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connecting { .. } => self.state = ConnectionState::Connecting,
            ConnectionEvent::Opened => {
                self.state = ConnectionState::Open;
                self.gave_up_after = None;
            }
            ConnectionEvent::Closing => self.state = ConnectionState::Closing,
            ConnectionEvent::Closed => self.state = ConnectionState::Closed,
            ConnectionEvent::GaveUp { attempts } => {
                self.state = ConnectionState::Closed;
                self.gave_up_after = Some(attempts);
            }
            ConnectionEvent::FrameReceived(raw) => self.receive(&raw),
        }
    }

    fn receive(&mut self, raw: &str) {
        match decode_inbound(raw) {
            Ok(InboundFrame::Message(message)) => self.messages.push(message),
            Ok(InboundFrame::ServerError(notice)) => {
                warn!(notice = %notice, "server reported an error");
                self.server_notice = Some(notice);
            }
            Err(e) => {
                self.dropped_frames += 1;
                warn!(error = %e, frame_len = raw.len(), "dropping malformed frame");
            }
        }
    }
}
