// tunebot-core/src/services/commands.rs
//
// Classifies a chat line: a `!` command, a playlist link, or a search query.

use url::Url;

pub const COMMAND_PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!skip [N]` / `!s [N]`
    Skip(Option<i64>),
    /// `!queue` / `!q`
    Queue,
    /// `!history [page]` / `!his [page]`, 1-based
    History(u32),
    /// `!clear_messages` / `!cm`
    ClearMessages,
    /// `!restart` / `!rs`
    Restart,
    /// `!disconnect` / `!dc` / `!l`
    Disconnect,
    Pause,
    Resume,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Command(Command),
    /// Message carrying a playlist link (`list=` query parameter).
    Playlist(String),
    Search(String),
    Empty,
}

pub fn parse_input(text: &str) -> ChatInput {
    let text = text.trim();
    if text.is_empty() {
        return ChatInput::Empty;
    }
    if let Some(rest) = text.strip_prefix(COMMAND_PREFIX) {
        return ChatInput::Command(parse_command(rest));
    }
    if is_playlist_link(text) {
        return ChatInput::Playlist(text.to_string());
    }
    ChatInput::Search(text.to_string())
}

/// A URL with a `list` query parameter. Lines that are not a single URL
/// still count when they carry `list=` somewhere.
fn is_playlist_link(text: &str) -> bool {
    match Url::parse(text) {
        Ok(url) => url.query_pairs().any(|(k, v)| k == "list" && !v.is_empty()),
        Err(_) => text.contains("list="),
    }
}

fn parse_command(rest: &str) -> Command {
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next();

    match name.as_str() {
        "skip" | "s" => Command::Skip(arg.and_then(|a| a.parse::<i64>().ok())),
        "queue" | "q" => Command::Queue,
        "history" | "his" => {
            let page = arg.and_then(|a| a.parse::<u32>().ok()).unwrap_or(1).max(1);
            Command::History(page)
        }
        "clear_messages" | "cm" => Command::ClearMessages,
        "restart" | "rs" => Command::Restart,
        "disconnect" | "dc" | "l" => Command::Disconnect,
        "pause" => Command::Pause,
        "resume" => Command::Resume,
        _ => Command::Unknown(name),
    }
}
