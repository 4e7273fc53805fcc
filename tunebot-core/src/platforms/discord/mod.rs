// File: src/platforms/discord/mod.rs

pub mod chat;
pub mod runtime;
pub mod voice;

pub use chat::TwilightChatGateway;
pub use runtime::DiscordPlatform;
pub use voice::SongbirdVoiceGateway;
