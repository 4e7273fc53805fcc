// File: tunebot-core/src/test_utils/mod.rs

pub mod helpers;
pub mod mocks;

pub use helpers::{clean_database, setup_test_database};
pub use mocks::{
    InMemoryHistoryRepository, RecordingChat, RecordingVoiceGateway, SentMessage, VoiceCall,
    TEST_GUILD_ID,
};
