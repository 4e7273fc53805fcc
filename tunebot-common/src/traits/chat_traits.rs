use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;

/// Outbound side of the bot's text channel.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Posts `text`; when `delete_after` is set the message removes itself later.
    /// Returns the new message id.
    async fn send(&self, text: &str, delete_after: Option<Duration>) -> Result<u64, Error>;

    async fn add_reactions(&self, message_id: u64, emojis: &[&str]) -> Result<(), Error>;

    async fn delete_message(&self, message_id: u64, delay: Option<Duration>) -> Result<(), Error>;

    /// Deletes up to `limit` of the most recent messages; returns how many went.
    async fn purge(&self, limit: usize) -> Result<usize, Error>;

    async fn channel_name(&self) -> Result<String, Error>;
}
