//! Terminal rendering of a [`ChatView`].
//!
//! `render` builds the whole screen as a `String`; [`Screen`] writes it out,
//! clearing the terminal first when stdout is a TTY. Text that comes from
//! the server or the user has its control characters escaped, so one
//! message is always one line and cannot move the cursor or clear the screen.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{self, Write};

use colored::*;

use crate::chat_view::ChatView;
use crate::connection::ConnectionState;

pub const TITLE: &str = "WebSocket Chat";
pub const BANNER: &str = "Connection to server lost...";
pub const PROMPT_HINT: &str = "Type a message and press Enter";

const RULE_WIDTH: usize = 50;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Render the view. Only the newest `window` messages are drawn.
pub fn render(view: &ChatView, window: usize) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "{}", TITLE.bright_cyan().bold());
    let _ = writeln!(out, "{}: {}", "Status".bright_yellow(), status_label(view.state()));
    let _ = writeln!(out, "{}", rule.bright_blue());

    let messages = view.messages();
    let hidden = messages.len().saturating_sub(window);
    if hidden > 0 {
        let _ = writeln!(out, "{}", format!("({hidden} earlier messages)").dimmed());
    }
    if messages.is_empty() {
        let _ = writeln!(out, "{}", "(no messages yet)".dimmed());
    }
    for message in &messages[hidden..] {
        let _ = writeln!(out, "{} {}", "›".bright_blue(), printable(&message.text));
    }

    let _ = writeln!(out, "{}", rule.bright_blue());

    if view.shows_banner() {
        let _ = writeln!(out, "{}", BANNER.bright_red().bold());
    }
    if let Some(attempts) = view.gave_up_after() {
        let _ = writeln!(
            out,
            "{}",
            format!("Stopped reconnecting after {attempts} attempts.").bright_red()
        );
    }
    if let Some(notice) = view.server_notice() {
        let _ = writeln!(out, "{}: {}", "Server".bright_magenta(), printable(notice));
    }

    let send = if view.is_send_enabled() {
        "[send]".bright_green().bold()
    } else {
        "[send disabled]".dimmed()
    };
    if view.draft().is_empty() {
        let _ = writeln!(out, "{} {}", send, PROMPT_HINT.dimmed());
    } else {
        let draft = printable(view.draft());
        let _ = writeln!(out, "{} {} {}", send, "Draft:".bright_yellow(), draft);
    }
    let _ = write!(out, "{} ", ">".bright_white().bold());

    out
}

/// `text` with every control character replaced by its escape sequence
/// (`\n`, `\u{1b}`, ...).
fn printable(text: &str) -> Cow<'_, str> {
    if !text.chars().any(char::is_control) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn status_label(state: ConnectionState) -> ColoredString {
    let label = state.to_string();
    match state {
        ConnectionState::Open => label.bright_green(),
        ConnectionState::Connecting | ConnectionState::Closing => label.bright_yellow(),
        ConnectionState::Closed => label.bright_red(),
    }
}

/// Where rendered frames go.
pub struct Screen<W: Write> {
    out: W,
    window: usize,
    clear: bool,
}

impl Screen<io::Stdout> {
    /// Draw to stdout, clearing between frames when attached to a terminal.
    pub fn stdout(window: usize) -> Self {
        use std::io::IsTerminal;
        let out = io::stdout();
        let clear = out.is_terminal();
        Screen { out, window, clear }
    }
}

impl<W: Write> Screen<W> {
    /// Draw to an arbitrary writer without clearing.
    pub fn new(out: W, window: usize) -> Self {
        Screen {
            out,
            window,
            clear: false,
        }
    }

    pub fn draw(&mut self, view: &ChatView) -> io::Result<()> {
        if self.clear {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(render(view, self.window).as_bytes())?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
