//! Connection manager: owns the single WebSocket connection.
//!
//! ## Design
//! - One tokio task owns the socket for its whole life; nothing else touches it
//! - Consumers talk to the task through a [`ConnectionHandle`]: outbound frames
//!   and shutdown go in over an mpsc command channel
//! - The task reports back with typed [`ConnectionEvent`]s on an unbounded
//!   channel, in transport order
//! - Readiness is published on a `watch` channel so [`ConnectionHandle::send`]
//!   can check it without awaiting
//!
//! ## Lifecycle
//! 1. `Connecting`: dialing the endpoint
//! 2. `Open`: frames flow both ways; the backoff counter resets
//! 3. `Closed`: dial failed or the peer went away; wait out the backoff and
//!    go back to 1, or emit `GaveUp` once `max_attempts` is used up
//! 4. `Closing` → `Closed`: local teardown via [`ConnectionHandle::close`]
//!    or by dropping the handle

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::{encode_outbound, ChatMessage};
use crate::reconnect::{Backoff, ReconnectPolicy};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Readiness of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open       => write!(f, "open"),
            ConnectionState::Closing    => write!(f, "closing"),
            ConnectionState::Closed     => write!(f, "closed"),
        }
    }
}

/// Everything the connection task reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Dialing the endpoint. `attempt` is 0 for the first dial after an open
    /// (or at startup) and counts up across consecutive failures.
    Connecting { attempt: u32 },
    Opened,
    /// Local teardown started.
    Closing,
    Closed,
    /// A text frame arrived. Parsing is the consumer's job.
    FrameReceived(String),
    /// Reconnects stopped after this many consecutive failed attempts.
    GaveUp { attempts: u32 },
}

/// Anything that can take an outbound chat message.
///
/// Sending is fire-and-forget: implementations drop the message when they
/// cannot deliver it and report trouble only through connection state.
pub trait Outbox {
    fn send(&self, message: &ChatMessage);
}

#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// Consumer side of a running connection task.
///
/// Dropping the handle shuts the task down as well; [`close`](Self::close)
/// additionally waits for the socket to be closed.
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Start the connection task for `url`.
    ///
    /// Returns the handle and the receiving end of the event stream. Must be
    /// called from within a tokio runtime.
    pub fn spawn(
        url: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let task = ConnectionTask {
            url: url.into(),
            backoff: Backoff::new(policy),
            commands: cmd_rx,
            events: event_tx,
            state: state_tx,
        };
        let join = tokio::spawn(task.run());

        let handle = ConnectionHandle {
            commands: cmd_tx,
            state: state_rx,
            task: join,
        };
        (handle, event_rx)
    }

    /// Current readiness.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that observes every readiness change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close the transport and wait for the task to finish.
    pub async fn close(self) {
        // The task may already be gone (after GaveUp); nothing to close then.
        let _ = self.commands.send(Command::Close);
        if let Err(e) = self.task.await {
            warn!(error = %e, "connection task ended abnormally");
        }
    }
}

impl Outbox for ConnectionHandle {
    /// Queue `message` for the socket. A no-op unless the connection is open.
    fn send(&self, message: &ChatMessage) {
        let state = self.state();
        if state != ConnectionState::Open {
            debug!(%state, "send ignored, connection not open");
            return;
        }
        match encode_outbound(message) {
            Ok(frame) => {
                let _ = self.commands.send(Command::Send(frame));
            }
            Err(e) => warn!(error = %e, "failed to encode outbound message"),
        }
    }
}

/// How an open session ended.
enum SessionEnd {
    /// Closed locally; do not reconnect.
    Shutdown,
    /// Peer closed, network error, or failed write; reconnect.
    Dropped,
}

struct ConnectionTask {
    url: String,
    backoff: Backoff,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);
            self.emit(ConnectionEvent::Connecting {
                attempt: self.backoff.attempts(),
            });

            let url = self.url.clone();
            let dialed = tokio::select! {
                res = tokio_tungstenite::connect_async(url.as_str()) => Some(res),
                () = wait_for_close(&mut self.commands) => None,
            };

            match dialed {
                None => {
                    self.set_state(ConnectionState::Closed);
                    self.emit(ConnectionEvent::Closed);
                    return;
                }
                Some(Ok((ws, _response))) => {
                    self.backoff.reset();
                    info!(url = %self.url, "Connected to WebSocket");
                    self.set_state(ConnectionState::Open);
                    self.emit(ConnectionEvent::Opened);

                    let end = self.pump(ws).await;

                    info!(url = %self.url, "WebSocket disconnected");
                    self.set_state(ConnectionState::Closed);
                    self.emit(ConnectionEvent::Closed);
                    if let SessionEnd::Shutdown = end {
                        return;
                    }
                }
                Some(Err(e)) => {
                    warn!(
                        error = %e,
                        url = %self.url,
                        attempt = self.backoff.attempts(),
                        "WebSocket connect failed"
                    );
                    self.set_state(ConnectionState::Closed);
                    self.emit(ConnectionEvent::Closed);
                }
            }

            let Some(delay) = self.backoff.next_delay() else {
                let attempts = self.backoff.attempts();
                warn!(url = %self.url, attempts, "giving up on reconnecting");
                self.emit(ConnectionEvent::GaveUp { attempts });
                return;
            };

            debug!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.backoff.attempts(),
                "reconnecting after backoff"
            );
            if !self.sleep_unless_closed(delay).await {
                return;
            }
        }
    }

    /// Shuttle frames until the session ends.
    async fn pump(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(frame)) => {
                        if let Err(e) = sink.send(WsMessage::Text(frame)).await {
                            warn!(error = %e, "WebSocket write failed");
                            return SessionEnd::Dropped;
                        }
                    }
                    Some(Command::Close) | None => {
                        self.set_state(ConnectionState::Closing);
                        self.emit(ConnectionEvent::Closing);
                        if let Err(e) = sink.close().await {
                            debug!(error = %e, "error while closing WebSocket");
                        }
                        return SessionEnd::Shutdown;
                    }
                },

                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(text))) => {
                        self.emit(ConnectionEvent::FrameReceived(text));
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "server closed the connection");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {} // binary, ping, pong
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket read failed");
                        return SessionEnd::Dropped;
                    }
                    None => return SessionEnd::Dropped,
                },
            }
        }
    }

    /// Wait out `delay`. Returns `false` if a close request arrived first.
    async fn sleep_unless_closed(&mut self, delay: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(delay) => true,
            () = wait_for_close(&mut self.commands) => false,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: ConnectionEvent) {
        // Consumer gone means nobody is listening; the task keeps its own
        // shutdown path through the command channel.
        let _ = self.events.send(event);
    }
}

/// Resolve once a close is requested or the handle is dropped. Outbound
/// frames queued while not open are discarded.
async fn wait_for_close(commands: &mut mpsc::UnboundedReceiver<Command>) {
    while let Some(cmd) = commands.recv().await {
        match cmd {
            Command::Send(_) => debug!("dropping outbound frame, connection not open"),
            Command::Close => return,
        }
    }
}
