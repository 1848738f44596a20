//! Shared helpers for integration tests: a bare tokio-tungstenite server and
//! timeouts around event channels.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use ws_chat::render::TITLE;
use ws_chat::{ConnectionEvent, ReconnectPolicy};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub type ServerSocket = WebSocketStream<TcpStream>;

/// Bind a listener on an ephemeral port and return it with its ws:// URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}/ws"))
}

/// A ws:// URL on a port nothing listens on.
pub async fn dead_url() -> String {
    let (listener, url) = bind().await;
    drop(listener);
    url
}

/// Accept one TCP connection and complete the WebSocket handshake.
pub async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = tokio::time::timeout(STEP_TIMEOUT, listener.accept())
        .await
        .expect("timed out waiting for client")
        .unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// Next text frame from the client, skipping control frames.
pub async fn next_text(socket: &mut ServerSocket) -> String {
    loop {
        let msg = tokio::time::timeout(STEP_TIMEOUT, socket.next())
            .await
            .expect("timed out waiting for frame")
            .expect("client went away")
            .unwrap();
        match msg {
            Message::Text(text) => return text,
            Message::Close(_) => panic!("client closed while a text frame was expected"),
            _ => continue,
        }
    }
}

/// Whether the client closed the connection: a close frame, a reset, or EOF.
pub async fn client_closed(socket: &mut ServerSocket) -> bool {
    loop {
        match tokio::time::timeout(STEP_TIMEOUT, socket.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(Message::Text(_)))) => return false,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

pub async fn next_event(events: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(STEP_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event channel closed")
}

/// Skip events until one equals `wanted`; return the ones skipped.
pub async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<ConnectionEvent>,
    wanted: ConnectionEvent,
) -> Vec<ConnectionEvent> {
    let mut skipped = Vec::new();
    loop {
        let event = next_event(events).await;
        if event == wanted {
            return skipped;
        }
        skipped.push(event);
    }
}

/// Short delays so reconnect tests finish quickly.
pub fn fast_policy(max_attempts: Option<u32>) -> ReconnectPolicy {
    ReconnectPolicy {
        initial_delay_ms: 10,
        max_delay_ms: 50,
        multiplier: 2.0,
        jitter: 0.0,
        max_attempts,
    }
}

/// Screen output shared between the app task and the test.
///
/// Each draw is a single write, so the buffer always ends on a whole frame.
#[derive(Clone, Default)]
pub struct SharedScreen(Arc<Mutex<Vec<u8>>>);

impl Write for SharedScreen {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedScreen {
    /// Everything drawn so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// The most recent frame, from its title line on.
    pub fn last_frame(&self) -> String {
        let contents = self.contents();
        match contents.rfind(TITLE) {
            Some(start) => contents[start..].to_string(),
            None => String::new(),
        }
    }

    /// Poll until the latest frame satisfies `done`, and return that frame.
    pub async fn wait_for_frame(&self, done: impl Fn(&str) -> bool) -> String {
        let poll = async {
            loop {
                let frame = self.last_frame();
                if done(&frame) {
                    return frame;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        match tokio::time::timeout(STEP_TIMEOUT, poll).await {
            Ok(frame) => frame,
            Err(_) => panic!("timed out waiting for frame; last drawn:\n{}", self.last_frame()),
        }
    }
}
