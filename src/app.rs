//! The event loop tying stdin, the connection and the screen together.
//!
//! Input is line-oriented: each line read is the draft at the moment Enter
//! was pressed. Lines are split on raw bytes; invalid UTF-8 is replaced
//! rather than ending the session. Connection events and input lines are handled one at a time
//! on this task, so the view needs no locking.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::SplitStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::chat_view::{ChatView, Key};
use crate::config::ChatConfig;
use crate::connection::ConnectionHandle;
use crate::error::ChatError;
use crate::render::Screen;

/// Run the chat client on stdin/stdout until EOF or Ctrl-C.
pub async fn run(config: ChatConfig) -> Result<(), ChatError> {
    let input = BufReader::new(tokio::io::stdin());
    let screen = Screen::stdout(config.history_window);
    run_with(config, input, screen, shutdown_signal()).await
}

/// Run the chat client against arbitrary input and output.
///
/// Returns when `input` reaches EOF, when `shutdown` resolves, or on an I/O
/// error. The connection is closed before returning in every case.
pub async fn run_with<R, W, S>(
    config: ChatConfig,
    input: R,
    mut screen: Screen<W>,
    shutdown: S,
) -> Result<(), ChatError>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    S: std::future::Future<Output = ()>,
{
    let (handle, mut events) = ConnectionHandle::spawn(config.url.clone(), config.reconnect);
    info!(url = %config.url, "chat client started");

    let mut view = ChatView::new();
    let mut lines = SplitStream::new(input.split(b'\n'));
    tokio::pin!(shutdown);

    let result = loop {
        if let Err(e) = screen.draw(&view) {
            break Err(ChatError::from(e));
        }

        tokio::select! {
            Some(event) = events.recv() => view.apply(event),
            line = lines.next() => match line {
                Some(Ok(bytes)) => {
                    view.on_draft_change(decode_line(bytes));
                    view.on_key(Key::Enter, &handle);
                }
                Some(Err(e)) => break Err(ChatError::from(e)),
                None => break Ok(()),
            },
            () = &mut shutdown => break Ok(()),
        }
    };

    handle.close().await;
    info!("chat client stopped");
    result
}

/// One input line as text, without its line ending.
fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "input line is not valid UTF-8, replacing invalid bytes");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; rely on EOF instead.
        std::future::pending::<()>().await;
    }
}
