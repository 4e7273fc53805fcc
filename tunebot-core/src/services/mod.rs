// File: src/services/mod.rs

pub mod commands;
pub mod dispatcher;
pub mod media;
pub mod menu_index;
pub mod playback;
pub mod search_registry;

pub use dispatcher::{DispatcherSettings, MusicDispatcher};
pub use menu_index::{MenuIndex, MenuRef};
pub use playback::{PlaybackService, SessionSettings};
pub use search_registry::SearchRegistry;
