//! Platform-neutral shapes of the inbound gateway events the bot reacts to.
//! Snowflakes are carried as raw `u64`s so nothing here depends on twilight.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    /// Account name; search results are keyed by it.
    pub author_name: String,
    /// Server display name, used in mentions and as "added by".
    pub author_display_name: String,
    pub author_is_bot: bool,
    /// Voice channel the author sat in when the message arrived.
    pub author_voice_channel: Option<u64>,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReaction {
    pub message_id: u64,
    pub channel_id: u64,
    pub user_id: u64,
    pub user_name: String,
    pub user_display_name: String,
    pub user_is_bot: bool,
    pub user_voice_channel: Option<u64>,
    /// Unicode emoji; custom emojis are dropped at the gateway.
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceMember {
    pub user_id: u64,
    pub is_bot: bool,
}

/// A member moved out of `left_channel`. `remaining` is who is still there
/// afterwards, the bot included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePresenceChange {
    pub user_id: u64,
    pub left_channel: u64,
    pub remaining: Vec<VoiceMember>,
}

impl VoicePresenceChange {
    pub fn non_bot_remaining(&self) -> usize {
        self.remaining.iter().filter(|m| !m.is_bot).count()
    }
}
