// File: src/platforms/discord/chat.rs
//
// ChatGateway over twilight's HTTP client, bound to the bot's text channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_http::Client as HttpClient;
use twilight_model::id::marker::{ChannelMarker, MessageMarker};
use twilight_model::id::Id;

use tunebot_common::traits::ChatGateway;

use crate::Error;

/// Discord refuses bulk deletes of more than 100 messages at a time.
const BULK_DELETE_MAX: u16 = 100;

fn platform_err<E: std::fmt::Display>(what: &str, e: E) -> Error {
    Error::Platform(format!("{what}: {e}"))
}

fn to_message_id(id: u64) -> Result<Id<MessageMarker>, Error> {
    Id::new_checked(id).ok_or_else(|| Error::Platform(format!("invalid message id {id}")))
}

#[derive(Clone)]
pub struct TwilightChatGateway {
    http: Arc<HttpClient>,
    channel_id: Id<ChannelMarker>,
}

impl TwilightChatGateway {
    pub fn new(http: Arc<HttpClient>, channel_id: u64) -> Result<Self, Error> {
        let channel_id = Id::new_checked(channel_id)
            .ok_or_else(|| Error::Config(format!("invalid text channel id {channel_id}")))?;
        Ok(Self { http, channel_id })
    }

    fn schedule_delete(&self, id: Id<MessageMarker>, delay: Duration) {
        let http = Arc::clone(&self.http);
        let channel_id = self.channel_id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = http.delete_message(channel_id, id).await {
                debug!("Delayed delete of {} failed: {}", id, e);
            }
        });
    }
}

#[async_trait]
impl ChatGateway for TwilightChatGateway {
    async fn send(&self, text: &str, delete_after: Option<Duration>) -> Result<u64, Error> {
        let message = self
            .http
            .create_message(self.channel_id)
            .content(text)
            .await
            .map_err(|e| platform_err("Error sending Discord message", e))?
            .model()
            .await
            .map_err(|e| platform_err("Error reading sent message", e))?;

        if let Some(delay) = delete_after {
            self.schedule_delete(message.id, delay);
        }
        Ok(message.id.get())
    }

    async fn add_reactions(&self, message_id: u64, emojis: &[&str]) -> Result<(), Error> {
        let id = to_message_id(message_id)?;
        for emoji in emojis {
            self.http
                .create_reaction(self.channel_id, id, &RequestReactionType::Unicode { name: emoji })
                .await
                .map_err(|e| platform_err("Error adding reaction", e))?;
        }
        Ok(())
    }

    async fn delete_message(&self, message_id: u64, delay: Option<Duration>) -> Result<(), Error> {
        let id = to_message_id(message_id)?;
        match delay {
            Some(delay) => self.schedule_delete(id, delay),
            None => {
                self.http
                    .delete_message(self.channel_id, id)
                    .await
                    .map_err(|e| platform_err("Error deleting message", e))?;
            }
        }
        Ok(())
    }

    async fn purge(&self, limit: usize) -> Result<usize, Error> {
        let mut deleted = 0usize;
        let mut before: Option<Id<MessageMarker>> = None;

        while deleted < limit {
            let batch = (limit - deleted).min(BULK_DELETE_MAX as usize) as u16;
            let request = self.http.channel_messages(self.channel_id);
            let response = match before {
                Some(id) => request.before(id).limit(batch).await,
                None => request.limit(batch).await,
            }
            .map_err(|e| platform_err("Error listing messages", e))?;
            let messages = response
                .models()
                .await
                .map_err(|e| platform_err("Error reading message list", e))?;

            if messages.is_empty() {
                break;
            }
            let ids: Vec<Id<MessageMarker>> = messages.iter().map(|m| m.id).collect();
            before = ids.last().copied();

            if ids.len() >= 2 && self.http.delete_messages(self.channel_id, &ids).await.is_ok() {
                deleted += ids.len();
            } else {
                // bulk delete rejects single ids and messages older than two weeks
                for id in &ids {
                    match self.http.delete_message(self.channel_id, *id).await {
                        Ok(_) => deleted += 1,
                        Err(e) => warn!("Could not delete message {}: {}", id, e),
                    }
                }
            }

            if messages.len() < batch as usize {
                break;
            }
        }
        Ok(deleted)
    }

    async fn channel_name(&self) -> Result<String, Error> {
        let channel = self
            .http
            .channel(self.channel_id)
            .await
            .map_err(|e| platform_err("Error fetching channel", e))?
            .model()
            .await
            .map_err(|e| platform_err("Error parsing channel", e))?;
        Ok(channel.name.unwrap_or_else(|| self.channel_id.to_string()))
    }
}
