// tunebot-core/src/services/dispatcher.rs
//
// Turns inbound gateway events into registry lookups, queue commands and
// outbound chat messages.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tunebot_common::models::discord::{InboundMessage, InboundReaction, VoicePresenceChange};
use tunebot_common::models::history::HistoryPage;
use tunebot_common::models::reaction::{ordinal_for_emoji, NUMBER_EMOJIS, SEARCH_EMOJIS};
use tunebot_common::models::track::Candidate;
use tunebot_common::traits::repository_traits::HISTORY_PAGE_SIZE;
use tunebot_common::traits::{ChatGateway, HistoryRepository, MediaResolver, ResolvedMedia};

use crate::eventbus::{BotEvent, EventBus};
use crate::services::commands::{parse_input, ChatInput, Command};
use crate::services::menu_index::{MenuIndex, MenuRef};
use crate::services::playback::{PlaybackService, SkipOutcome};
use crate::services::search_registry::{SearchRegistry, MAX_CANDIDATES};
use crate::Error;

pub const PURGE_LIMIT: usize = 300;
pub const HISTORY_MENU_TTL: Duration = Duration::from_secs(60);

const COMMAND_DELETE_DELAY: Duration = Duration::from_secs(5);
const SHORT_DELETE_DELAY: Duration = Duration::from_secs(2);
const SEARCHING_NOTICE_TTL: Duration = Duration::from_secs(10);
const NOTICE_TTL: Duration = Duration::from_secs(5);
const SKIP_NOTICE_TTL: Duration = Duration::from_secs(4);
const RESTART_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    /// The only text channel the bot listens to.
    pub text_channel_id: u64,
    /// Channel names in which `!clear_messages` is allowed to purge.
    pub purge_channel_names: Vec<String>,
    /// Upper bound for any single media resolver call.
    pub resolve_timeout: Duration,
}

pub struct MusicDispatcher {
    chat: Arc<dyn ChatGateway>,
    resolver: Arc<dyn MediaResolver>,
    history: Arc<dyn HistoryRepository>,
    playback: PlaybackService,
    registry: SearchRegistry,
    menus: MenuIndex,
    event_bus: EventBus,
    settings: DispatcherSettings,
}

impl MusicDispatcher {
    pub fn new(
        chat: Arc<dyn ChatGateway>,
        resolver: Arc<dyn MediaResolver>,
        history: Arc<dyn HistoryRepository>,
        playback: PlaybackService,
        registry: SearchRegistry,
        event_bus: EventBus,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            chat,
            resolver,
            history,
            playback,
            registry,
            menus: MenuIndex::new(),
            event_bus,
            settings,
        }
    }

    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    pub fn menus(&self) -> &MenuIndex {
        &self.menus
    }

    pub fn playback(&self) -> &PlaybackService {
        &self.playback
    }

    /// Consumes bus events until the bus shuts down or the channel closes.
    pub fn spawn(self: Arc<Self>, mut rx: mpsc::Receiver<BotEvent>) -> JoinHandle<()> {
        let mut shutdown_rx = self.event_bus.shutdown_rx.clone();
        tokio::spawn(async move {
            info!("Dispatcher started for text channel {}", self.settings.text_channel_id);
            loop {
                tokio::select! {
                    biased;
                    Ok(_) = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Dispatcher shutting down => break from loop.");
                            break;
                        }
                    },
                    maybe_event = rx.recv() => {
                        match maybe_event {
                            Some(event) => {
                                let kind = event.event_type();
                                if let Err(e) = self.handle_event(event).await {
                                    error!("Error handling {} event: {:?}", kind, e);
                                }
                            }
                            None => {
                                info!("Dispatcher channel closed => break from loop.");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    pub async fn handle_event(&self, event: BotEvent) -> Result<(), Error> {
        match event {
            BotEvent::ChatMessage(msg) => self.handle_message(&msg).await,
            BotEvent::ReactionAdded(reaction) => self.handle_reaction(&reaction).await,
            BotEvent::VoicePresence(change) => self.handle_voice_presence(change).await,
            BotEvent::SystemMessage(text) => {
                debug!("system: {}", text);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub async fn handle_message(&self, msg: &InboundMessage) -> Result<(), Error> {
        if msg.author_is_bot || msg.channel_id != self.settings.text_channel_id {
            return Ok(());
        }

        match parse_input(&msg.content) {
            ChatInput::Command(cmd) => self.handle_command(msg, cmd).await?,
            ChatInput::Playlist(url) => {
                self.delete_later(msg.message_id, COMMAND_DELETE_DELAY).await;
                self.enqueue_playlist(msg, url);
            }
            ChatInput::Search(query) => {
                self.delete_later(msg.message_id, COMMAND_DELETE_DELAY).await;
                self.search(msg, &query).await?;
            }
            ChatInput::Empty => {}
        }
        Ok(())
    }

    async fn handle_command(&self, msg: &InboundMessage, cmd: Command) -> Result<(), Error> {
        let delete_delay = match cmd {
            Command::Restart | Command::Disconnect => SHORT_DELETE_DELAY,
            _ => COMMAND_DELETE_DELAY,
        };
        self.delete_later(msg.message_id, delete_delay).await;

        match cmd {
            Command::Skip(count) => {
                if self.playback.skip(count).await? == SkipOutcome::NothingPlaying {
                    self.notice("Nothing to skip", SKIP_NOTICE_TTL).await;
                }
            }
            Command::Queue => {
                let view = self.playback.describe().await?;
                self.notice(&view.render(), NOTICE_TTL).await;
            }
            Command::History(page) => self.show_history(page).await?,
            Command::ClearMessages => self.clear_messages().await?,
            Command::Restart => {
                info!("Restart requested by {}", msg.author_name);
                self.notice("Restarting Bot!", SHORT_DELETE_DELAY).await;
                sleep(RESTART_GRACE).await;
                self.event_bus.shutdown();
            }
            Command::Disconnect => {
                self.notice("Disconnecting from Voice Channel!", SHORT_DELETE_DELAY).await;
                self.playback.disconnect().await?;
            }
            Command::Pause => {
                // toggles, like a pause button
                if !self.playback.pause().await? && !self.playback.resume().await? {
                    self.notice("Nothing is playing", NOTICE_TTL).await;
                }
            }
            Command::Resume => {
                if !self.playback.resume().await? {
                    self.notice("Playback is not paused", NOTICE_TTL).await;
                }
            }
            Command::Unknown(name) => {
                debug!("Ignoring unknown command '{}' from {}", name, msg.author_name);
            }
        }
        Ok(())
    }

    async fn search(&self, msg: &InboundMessage, query: &str) -> Result<(), Error> {
        self.notice(
            &format!("@{}, searching for \"{}\"", msg.author_display_name, query),
            SEARCHING_NOTICE_TTL,
        )
        .await;
        debug!("New search query by {}: '{}'", msg.author_name, query);

        let candidates = match timeout(
            self.settings.resolve_timeout,
            self.resolver.search(query, MAX_CANDIDATES),
        )
        .await
        {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                warn!("Search for '{}' failed: {:?}", query, e);
                self.notice(&format!("Search for \"{}\" failed", query), NOTICE_TTL).await;
                return Ok(());
            }
            Err(_) => {
                warn!("Search for '{}' timed out", query);
                self.notice(&format!("Search for \"{}\" failed", query), NOTICE_TTL).await;
                return Ok(());
            }
        };

        let candidates: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !c.age_restricted)
            .take(MAX_CANDIDATES)
            .collect();
        if candidates.is_empty() {
            self.notice(&format!("No results for \"{}\"", query), NOTICE_TTL).await;
            return Ok(());
        }

        let search_id = self.registry.register(&msg.author_name, candidates.clone());
        debug!("{}: '{}': {}", msg.author_name, query, search_id);

        let menu = render_search_menu(&msg.author_display_name, &candidates, &search_id);
        let ttl = self.registry.ttl();
        let menu_id = self.chat.send(&menu, Some(ttl)).await?;
        self.menus.insert(
            menu_id,
            MenuRef::Search {
                requester: msg.author_name.clone(),
                search_id,
            },
            ttl,
        );
        self.chat
            .add_reactions(menu_id, &SEARCH_EMOJIS[..candidates.len()])
            .await?;
        Ok(())
    }

    /// Expands and enqueues a playlist on its own task so commands keep
    /// flowing while the entries resolve one by one.
    pub fn enqueue_playlist(&self, msg: &InboundMessage, url: String) -> JoinHandle<()> {
        let loader = PlaylistLoader {
            chat: self.chat.clone(),
            resolver: self.resolver.clone(),
            playback: self.playback.clone(),
            resolve_timeout: self.settings.resolve_timeout,
            shutdown_rx: self.event_bus.shutdown_rx.clone(),
        };
        let requester = msg.author_name.clone();
        let display_name = msg.author_display_name.clone();
        let voice_channel = msg.author_voice_channel;
        tokio::spawn(async move {
            if let Err(e) = loader.run(&requester, &display_name, voice_channel, &url).await {
                error!("Playlist '{}' from {} stopped: {:?}", url, requester, e);
            }
        })
    }

    async fn show_history(&self, page: u32) -> Result<(), Error> {
        let page = self.history.page(page).await?;
        let text = render_history_page(&page);
        let menu_id = self.chat.send(&text, Some(HISTORY_MENU_TTL)).await?;

        if page.entries.is_empty() {
            return Ok(());
        }
        let search_ids = page.entries.iter().map(|e| e.search_id.clone()).collect();
        self.menus
            .insert(menu_id, MenuRef::History { search_ids }, HISTORY_MENU_TTL);
        self.chat
            .add_reactions(menu_id, &NUMBER_EMOJIS[..page.entries.len().min(NUMBER_EMOJIS.len())])
            .await?;
        Ok(())
    }

    async fn clear_messages(&self) -> Result<(), Error> {
        self.notice("Clearing Messages in Text Channel", NOTICE_TTL).await;
        let name = self.chat.channel_name().await?;
        if !self.settings.purge_channel_names.iter().any(|n| n == &name) {
            debug!("Refusing to purge channel '{}'", name);
            return Ok(());
        }
        let purged = self.chat.purge(PURGE_LIMIT).await?;
        info!("Purged {} messages from '{}'", purged, name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reactions
    // ------------------------------------------------------------------

    pub async fn handle_reaction(&self, reaction: &InboundReaction) -> Result<(), Error> {
        if reaction.user_is_bot || reaction.channel_id != self.settings.text_channel_id {
            return Ok(());
        }
        let Some(ordinal) = ordinal_for_emoji(&reaction.emoji) else {
            return Ok(());
        };
        let Some(menu) = self.menus.get(reaction.message_id) else {
            return Ok(());
        };

        match menu {
            MenuRef::Search { requester, search_id } => {
                if requester != reaction.user_name {
                    debug!("{} reacted to a menu owned by {}", reaction.user_name, requester);
                    return Ok(());
                }
                let Some(candidate) = self.registry.resolve(&requester, &search_id, ordinal) else {
                    return Ok(());
                };
                self.play_selected(&candidate.watch_url, &search_id, reaction).await
            }
            MenuRef::History { search_ids } => {
                let Some(search_id) = search_ids.get(ordinal - 1) else {
                    return Ok(());
                };
                let Some(entry) = self.history.get_by_search_id(search_id).await? else {
                    return Ok(());
                };
                self.play_selected(&entry.watch_url, search_id, reaction).await
            }
        }
    }

    async fn play_selected(
        &self,
        watch_url: &str,
        search_id: &str,
        reaction: &InboundReaction,
    ) -> Result<(), Error> {
        let resolved = match self.resolve_media(watch_url).await {
            Ok(r) => r,
            Err(e) => {
                warn!("{}: could not resolve {}: {:?}", search_id, watch_url, e);
                self.notice("Could not load the selected track", NOTICE_TTL).await;
                return Ok(());
            }
        };
        let track = resolved.candidate.into_track(
            search_id,
            &reaction.user_display_name,
            resolved.stream_url,
        );
        self.playback.enqueue(track, reaction.user_voice_channel).await
    }

    // ------------------------------------------------------------------
    // Voice presence
    // ------------------------------------------------------------------

    pub async fn handle_voice_presence(&self, change: VoicePresenceChange) -> Result<(), Error> {
        let left = self.playback.voice_presence_changed(change).await?;
        if left {
            debug!("Session left its voice channel after abandonment");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // helpers
    // ------------------------------------------------------------------

    async fn resolve_media(&self, watch_url: &str) -> Result<ResolvedMedia, Error> {
        timeout(self.settings.resolve_timeout, self.resolver.resolve(watch_url)).await?
    }

    async fn notice(&self, text: &str, ttl: Duration) {
        if let Err(e) = self.chat.send(text, Some(ttl)).await {
            warn!("Could not post notice: {:?}", e);
        }
    }

    async fn delete_later(&self, message_id: u64, delay: Duration) {
        if let Err(e) = self.chat.delete_message(message_id, Some(delay)).await {
            warn!("Could not schedule deletion of message {}: {:?}", message_id, e);
        }
    }
}

struct PlaylistLoader {
    chat: Arc<dyn ChatGateway>,
    resolver: Arc<dyn MediaResolver>,
    playback: PlaybackService,
    resolve_timeout: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl PlaylistLoader {
    async fn run(
        &self,
        requester: &str,
        display_name: &str,
        voice_channel: Option<u64>,
        url: &str,
    ) -> Result<(), Error> {
        let entries = match timeout(self.resolve_timeout, self.resolver.playlist(url)).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!("Playlist '{}' could not be expanded: {:?}", url, e);
                self.notice("Invalid playlist link").await;
                return Ok(());
            }
            Err(_) => {
                warn!("Playlist '{}' expansion timed out", url);
                self.notice("Invalid playlist link").await;
                return Ok(());
            }
        };
        info!("{} queued a playlist with {} entries", requester, entries.len());

        for entry in entries.into_iter().filter(|c| !c.age_restricted) {
            if *self.shutdown_rx.borrow() {
                debug!("Shutdown during playlist '{}', dropping the rest", url);
                break;
            }
            let resolved = match timeout(self.resolve_timeout, self.resolver.resolve(&entry.watch_url)).await {
                Ok(Ok(resolved)) => resolved,
                Ok(Err(e)) => {
                    warn!("Skipping playlist entry '{}': {:?}", entry.watch_url, e);
                    continue;
                }
                Err(_) => {
                    warn!("Skipping playlist entry '{}': resolve timed out", entry.watch_url);
                    continue;
                }
            };
            let track_id = Uuid::new_v4().to_string();
            let track = resolved
                .candidate
                .into_track(&track_id, display_name, resolved.stream_url);
            self.playback.enqueue(track, voice_channel).await?;
        }
        Ok(())
    }

    async fn notice(&self, text: &str) {
        if let Err(e) = self.chat.send(text, Some(NOTICE_TTL)).await {
            warn!("Could not post notice: {:?}", e);
        }
    }
}

pub fn render_search_menu(display_name: &str, candidates: &[Candidate], search_id: &str) -> String {
    let lines: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} - {} - {}", i + 1, c.title, c.uploader_name))
        .collect();
    format!(
        "@{}, Select one of the following (as reaction):\n{}\nSearch ID: {}",
        display_name,
        lines.join("\n"),
        search_id
    )
}

pub fn render_history_page(page: &HistoryPage) -> String {
    let offset = u64::from(page.page.saturating_sub(1)) * u64::from(HISTORY_PAGE_SIZE);
    let lines: Vec<String> = page
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            format!(
                "{}) {} - {} (Added by {}) (ID: {})",
                offset + i as u64 + 1,
                e.title,
                e.uploader_name,
                e.added_by,
                e.search_id
            )
        })
        .collect();
    format!(
        "Playback history (Page {} out of {}): \n{}",
        page.page,
        page.total_pages,
        lines.join("\n")
    )
}
