// File: tunebot-common/src/models/mod.rs
pub mod track;
pub mod history;
pub mod playback;
pub mod discord;
pub mod reaction;

pub use track::{Candidate, Track};
pub use history::{CarryoverItem, HistoryEntry, HistoryPage};
pub use playback::{PlaybackState, QueueLine, QueueView};
pub use discord::{InboundMessage, InboundReaction, VoiceMember, VoicePresenceChange};
