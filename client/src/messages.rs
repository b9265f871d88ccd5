//! Renders server print messages into in-game text lines.
//!
//! Lines carry `~N` color escapes understood by the game's text renderer:
//! `~2` plain, `~3` location, `~4` player, `~9` item.

use shared::{PrintKind, PrintMessage};

/// Renders a server message as one line with `~N` color escapes.
pub fn format_message(message: &PrintMessage) -> String {
    match &message.kind {
        PrintKind::ItemSend { item, recv_player } => {
            format!("~9{}~2 was sent to ~4{}", item, recv_player)
        }
        PrintKind::ItemRecv { item, send_player } => {
            format!("~2Received ~9{}~2 from ~4{}", item, send_player)
        }
        PrintKind::Hint {
            item,
            send_player,
            recv_player,
            location,
            checked,
        } => format!(
            "~9{}~2 from ~4{}~2 to ~4{}~2 at ~3{}{}",
            item,
            send_player,
            recv_player,
            location,
            if *checked { " (Checked)" } else { " (Unchecked)" }
        ),
        PrintKind::Chat | PrintKind::Generic => format!("~2{}", message.text),
    }
}

/// Removes `~N` color escapes, for hosts that print to a terminal.
pub fn plain_text(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' && chars.peek().map_or(false, char::is_ascii_digit) {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

/// Lines produced before the session finished initializing.
/// They are released to the host in arrival order on the first update after.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    cached: Vec<String>,
}

impl MessageBuffer {
    pub fn push(&mut self, line: String) {
        self.cached.push(line);
    }

    /// Removes and returns every buffered line, oldest first.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.cached)
    }

    pub fn len(&self) -> usize {
        self.cached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cached.is_empty()
    }
}
