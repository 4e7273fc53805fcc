use async_trait::async_trait;

use crate::error::Error;

/// An established voice connection in one guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceHandle {
    pub guild_id: u64,
    pub channel_id: u64,
}

/// Completion callback handed to [`VoiceGateway::play`].
pub type OnFinished = Box<dyn FnOnce() + Send + 'static>;

/// Voice connection and audio playback, as the playback session sees it.
///
/// Implementations must invoke the `on_finished` callback of every successful
/// `play` exactly once: on natural end, on `stop`, and on a playback error alike.
/// If `play` returns an error the callback is dropped without being called.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(&self, channel_id: u64) -> Result<VoiceHandle, Error>;

    /// Relocate an existing connection; returns the updated handle.
    async fn move_to(&self, handle: &VoiceHandle, channel_id: u64) -> Result<VoiceHandle, Error>;

    async fn is_connected(&self, handle: &VoiceHandle) -> bool;

    async fn play(
        &self,
        handle: &VoiceHandle,
        stream_url: &str,
        on_finished: OnFinished,
    ) -> Result<(), Error>;

    async fn stop(&self, handle: &VoiceHandle) -> Result<(), Error>;

    async fn pause(&self, handle: &VoiceHandle) -> Result<(), Error>;

    async fn resume(&self, handle: &VoiceHandle) -> Result<(), Error>;

    async fn disconnect(&self, handle: &VoiceHandle) -> Result<(), Error>;
}
