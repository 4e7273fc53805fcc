use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use songbird::shards::TwilightMap;
use songbird::Songbird;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_cache_inmemory::{InMemoryCache, ResourceType};
use twilight_gateway::{
    self as gateway,
    CloseFrame,
    Config,
    Event,
    EventTypeFlags,
    Intents,
    MessageSender,
    Shard,
    StreamExt,
};
use twilight_http::Client as HttpClient;
use twilight_http::client::ClientBuilder;
use twilight_model::channel::message::EmojiReactionType;
use twilight_model::gateway::payload::incoming::Ready as ReadyPayload;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, UserMarker};
use twilight_model::id::Id;

use tunebot_common::models::discord::{
    InboundMessage, InboundReaction, VoiceMember, VoicePresenceChange,
};

use crate::eventbus::{BotEvent, EventBus};
use crate::platforms::discord::chat::TwilightChatGateway;
use crate::platforms::{ConnectionStatus, PlatformAuth, PlatformIntegration};
use crate::Error;

/// Everything a shard runner needs besides the shard itself.
#[derive(Clone)]
struct ShardContext {
    guild_id: Id<GuildMarker>,
    bot_user_id: Id<UserMarker>,
    cache: Arc<InMemoryCache>,
    songbird: Arc<Songbird>,
    event_bus: EventBus,
}

impl ShardContext {
    fn voice_channel_of(&self, user_id: Id<UserMarker>) -> Option<u64> {
        self.cache
            .voice_state(user_id, self.guild_id)
            .map(|vs| vs.channel_id().get())
    }

    fn is_bot(&self, user_id: Id<UserMarker>) -> bool {
        self.cache.user(user_id).map(|u| u.bot).unwrap_or(false)
    }

    fn nick_of(&self, user_id: Id<UserMarker>) -> Option<String> {
        self.cache
            .member(self.guild_id, user_id)
            .and_then(|m| m.nick().map(str::to_string))
    }

    fn members_in(&self, channel_id: Id<ChannelMarker>) -> Vec<VoiceMember> {
        match self.cache.voice_channel_states(channel_id) {
            Some(states) => states
                .map(|vs| VoiceMember {
                    user_id: vs.user_id().get(),
                    is_bot: self.is_bot(vs.user_id()),
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Pulls events off one shard:
///   - feeds every event to songbird (voice server/state updates)
///   - updates the in-memory cache
///   - publishes messages, reactions and voice departures of our guild on the bus.
async fn shard_runner(mut shard: Shard, ctx: ShardContext) {
    let shard_id = shard.id().number();
    info!("(ShardRunner) Shard {shard_id} started. Listening for events.");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };

        ctx.songbird.process(&event).await;

        // 1) where was the member before this update? Must be read before the cache moves on.
        let previous_channel = match &event {
            Event::VoiceStateUpdate(vs) if vs.guild_id == Some(ctx.guild_id) => ctx
                .cache
                .voice_state(vs.user_id, ctx.guild_id)
                .map(|s| s.channel_id()),
            _ => None,
        };

        // 2) let the cache catch up
        ctx.cache.update(&event);

        // 3) translate
        match &event {
            Event::Ready(ready) => {
                let data: &ReadyPayload = ready.as_ref();
                info!(
                    "Shard {shard_id} => READY as {}#{} (ID={})",
                    data.user.name, data.user.discriminator, data.user.id
                );
                ctx.event_bus
                    .publish(BotEvent::SystemMessage(format!("shard {shard_id} ready")))
                    .await;
            }
            Event::MessageCreate(msg) => {
                if msg.guild_id != Some(ctx.guild_id) {
                    continue;
                }
                let display_name = msg
                    .member
                    .as_ref()
                    .and_then(|m| m.nick.clone())
                    .or_else(|| msg.author.global_name.clone())
                    .unwrap_or_else(|| msg.author.name.clone());

                let inbound = InboundMessage {
                    message_id: msg.id.get(),
                    channel_id: msg.channel_id.get(),
                    author_id: msg.author.id.get(),
                    author_name: msg.author.name.clone(),
                    author_display_name: display_name,
                    author_is_bot: msg.author.bot,
                    author_voice_channel: ctx.voice_channel_of(msg.author.id),
                    content: msg.content.clone(),
                };
                ctx.event_bus.publish(BotEvent::ChatMessage(inbound)).await;
            }
            Event::ReactionAdd(reaction) => {
                if reaction.guild_id != Some(ctx.guild_id) {
                    continue;
                }
                let EmojiReactionType::Unicode { name } = &reaction.emoji else {
                    trace!("Ignoring custom emoji reaction");
                    continue;
                };

                let member_user = reaction.member.as_ref().map(|m| &m.user);
                let (user_name, global_name, is_bot) = match member_user {
                    Some(u) => (u.name.clone(), u.global_name.clone(), u.bot),
                    None => match ctx.cache.user(reaction.user_id) {
                        Some(u) => (u.name.clone(), u.global_name.clone(), u.bot),
                        None => (reaction.user_id.to_string(), None, false),
                    },
                };
                let display_name = reaction
                    .member
                    .as_ref()
                    .and_then(|m| m.nick.clone())
                    .or_else(|| ctx.nick_of(reaction.user_id))
                    .or(global_name)
                    .unwrap_or_else(|| user_name.clone());

                let inbound = InboundReaction {
                    message_id: reaction.message_id.get(),
                    channel_id: reaction.channel_id.get(),
                    user_id: reaction.user_id.get(),
                    user_name,
                    user_display_name: display_name,
                    user_is_bot: is_bot,
                    user_voice_channel: ctx.voice_channel_of(reaction.user_id),
                    emoji: name.clone(),
                };
                ctx.event_bus.publish(BotEvent::ReactionAdded(inbound)).await;
            }
            Event::VoiceStateUpdate(vs) => {
                if vs.user_id == ctx.bot_user_id {
                    continue;
                }
                let Some(left) = previous_channel else {
                    continue;
                };
                if vs.channel_id == Some(left) {
                    // mute/deafen toggles keep the member where they were
                    continue;
                }
                debug!("Voice State change detected: {} left {}", vs.user_id, left);
                let change = VoicePresenceChange {
                    user_id: vs.user_id.get(),
                    left_channel: left.get(),
                    remaining: ctx.members_in(left),
                };
                ctx.event_bus.publish(BotEvent::VoicePresence(change)).await;
            }
            _ => {
                trace!("Shard {shard_id} => unhandled event: {:?}", event.kind());
            }
        }
    }

    warn!("(ShardRunner) Shard {shard_id} event loop ended.");
}

/// Gateway connection for one guild: shards, cache, HTTP client and the
/// songbird voice manager all live here.
pub struct DiscordPlatform {
    pub token: String,
    pub guild_id: u64,
    pub connection_status: ConnectionStatus,

    pub shard_tasks: Vec<JoinHandle<()>>,
    pub shard_senders: Vec<MessageSender>,

    pub http: Option<Arc<HttpClient>>,
    pub cache: Option<Arc<InMemoryCache>>,
    pub songbird: Option<Arc<Songbird>>,
    pub event_bus: EventBus,
}

impl DiscordPlatform {
    pub fn new(token: String, guild_id: u64, event_bus: EventBus) -> Self {
        Self {
            token,
            guild_id,
            connection_status: ConnectionStatus::Disconnected,
            shard_tasks: Vec::new(),
            shard_senders: Vec::new(),
            http: None,
            cache: None,
            songbird: None,
            event_bus,
        }
    }

    /// Voice manager; only available after `connect`.
    pub fn songbird(&self) -> Result<Arc<Songbird>, Error> {
        self.songbird
            .clone()
            .ok_or_else(|| Error::Platform("Discord platform is not connected".into()))
    }

    /// Chat gateway bound to `text_channel_id`; only available after `connect`.
    pub fn chat_gateway(&self, text_channel_id: u64) -> Result<TwilightChatGateway, Error> {
        let http = self
            .http
            .clone()
            .ok_or_else(|| Error::Platform("Discord platform is not connected".into()))?;
        TwilightChatGateway::new(http, text_channel_id)
    }
}

#[async_trait]
impl PlatformAuth for DiscordPlatform {
    async fn authenticate(&mut self) -> Result<(), Error> {
        if self.token.is_empty() {
            return Err(Error::Config("Discord token is empty".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PlatformIntegration for DiscordPlatform {
    async fn connect(&mut self) -> Result<(), Error> {
        if matches!(self.connection_status, ConnectionStatus::Connected) {
            info!("(DiscordPlatform) Already connected => skipping");
            return Ok(());
        }
        self.authenticate().await?;

        let guild_id = Id::<GuildMarker>::new_checked(self.guild_id)
            .ok_or_else(|| Error::Config(format!("invalid guild id {}", self.guild_id)))?;

        // 1) HTTP client + our own user id (songbird needs it)
        let http_client = Arc::new(
            ClientBuilder::new()
                .token(self.token.clone())
                .timeout(Duration::from_secs(30))
                .build()
        );
        let bot_user = http_client
            .current_user()
            .await
            .map_err(|e| Error::Platform(format!("current_user error: {e}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("current_user body error: {e}")))?;
        self.http = Some(http_client.clone());

        // 2) cache: voice states and users are what the auto-leave check reads
        let cache = Arc::new(
            InMemoryCache::builder()
                .resource_types(
                    ResourceType::GUILD
                        | ResourceType::CHANNEL
                        | ResourceType::MEMBER
                        | ResourceType::USER
                        | ResourceType::VOICE_STATE,
                )
                .build()
        );
        self.cache = Some(cache.clone());

        // 3) shards
        let config = Config::new(
            self.token.clone(),
            Intents::GUILDS
                | Intents::GUILD_MESSAGES
                | Intents::MESSAGE_CONTENT
                | Intents::GUILD_MESSAGE_REACTIONS
                | Intents::GUILD_VOICE_STATES,
        );
        let shards: Vec<Shard> = gateway::create_recommended(&http_client, config, |_, b| b.build())
            .await
            .map_err(|e| Error::Platform(format!("create_recommended error: {e}")))?
            .collect();

        // 4) songbird speaks to the gateway through the shards' senders
        let senders: HashMap<u32, MessageSender> = shards
            .iter()
            .map(|s| (s.id().number(), s.sender()))
            .collect();
        let songbird = Arc::new(Songbird::twilight(Arc::new(TwilightMap::new(senders)), bot_user.id));
        self.songbird = Some(songbird.clone());

        let ctx = ShardContext {
            guild_id,
            bot_user_id: bot_user.id,
            cache,
            songbird,
            event_bus: self.event_bus.clone(),
        };

        for shard in shards {
            self.shard_senders.push(shard.sender());
            let handle = tokio::spawn(shard_runner(shard, ctx.clone()));
            self.shard_tasks.push(handle);
        }

        info!("(DiscordPlatform) Connected as {} for guild {}", bot_user.name, self.guild_id);
        self.connection_status = ConnectionStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        self.connection_status = ConnectionStatus::Disconnected;

        for sender in &self.shard_senders {
            let _ = sender.close(CloseFrame::NORMAL);
        }
        for task in &mut self.shard_tasks {
            let _ = task.await;
        }

        self.shard_senders.clear();
        self.shard_tasks.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_token_is_rejected_before_any_network_call() {
        let mut platform = DiscordPlatform::new(String::new(), 1, EventBus::new());
        assert!(matches!(platform.connect().await, Err(Error::Config(_))));
        assert_eq!(platform.connection_status, ConnectionStatus::Disconnected);
        assert!(platform.songbird().is_err());
        assert!(platform.chat_gateway(5).is_err());
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_a_no_op() -> Result<(), Error> {
        let mut platform = DiscordPlatform::new("token".into(), 1, EventBus::new());
        platform.disconnect().await?;
        assert_eq!(platform.connection_status, ConnectionStatus::Disconnected);
        assert!(platform.shard_tasks.is_empty());
        Ok(())
    }
}
