// tunebot-core/src/services/playback/session.rs
//
// The playback session actor. One task owns the PlaybackQueue and the voice
// handle; everything else talks to it through PlaybackService, a cheap clone
// of the command channel's sender. Voice completions come back in through the
// same channel, tagged with the generation of the play that produced them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use tunebot_common::models::discord::VoicePresenceChange;
use tunebot_common::models::playback::{PlaybackState, QueueView};
use tunebot_common::models::track::Track;
use tunebot_common::traits::{ChatGateway, HistoryRepository, OnFinished, VoiceGateway, VoiceHandle};

use crate::services::playback::queue::PlaybackQueue;
use crate::Error;

const ADDED_NOTICE_TTL: Duration = Duration::from_secs(5);
const NOW_PLAYING_TTL: Duration = Duration::from_secs(10);
const SKIPPED_NOTICE_TTL: Duration = Duration::from_secs(4);
const CONNECT_NOTICE_TTL: Duration = Duration::from_secs(5);
const AUTO_LEAVE_NOTICE_TTL: Duration = Duration::from_secs(5);

pub const AUTO_LEAVE_NOTICE: &str = "Leaving Voice Channel as all other users left!";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upper bound for joining or moving between voice channels.
    pub connect_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
        }
    }
}

/// What a skip request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The current stream was stopped; `count` slots are behind us.
    Skipped { count: usize },
    /// No stream attached to a live voice connection.
    NothingPlaying,
}

/// Point-in-time view of the session, for queries and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub current_index: Option<usize>,
    pub len: usize,
    pub voice: Option<VoiceHandle>,
    pub generation: u64,
}

#[derive(Debug)]
pub enum PlaybackCommand {
    Enqueue {
        track: Track,
        voice_channel: Option<u64>,
        done: oneshot::Sender<()>,
    },
    TrackFinished {
        generation: u64,
    },
    Skip {
        count: Option<i64>,
        reply: oneshot::Sender<SkipOutcome>,
    },
    Pause {
        reply: oneshot::Sender<bool>,
    },
    Resume {
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        done: oneshot::Sender<()>,
    },
    VoicePresenceChanged {
        change: VoicePresenceChange,
        reply: oneshot::Sender<bool>,
    },
    Describe {
        reply: oneshot::Sender<QueueView>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Handle to the playback session task.
#[derive(Clone)]
pub struct PlaybackService {
    tx: mpsc::UnboundedSender<PlaybackCommand>,
}

impl PlaybackService {
    /// Starts the session task. It runs until every `PlaybackService` clone
    /// is dropped.
    pub fn spawn(
        voice: Arc<dyn VoiceGateway>,
        chat: Arc<dyn ChatGateway>,
        history: Arc<dyn HistoryRepository>,
        settings: SessionSettings,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = PlaybackSession {
            queue: PlaybackQueue::new(),
            voice,
            chat,
            history,
            settings,
            handle: None,
            generation: 0,
            completions: tx.downgrade(),
        };
        let join = tokio::spawn(session.run(rx));
        (Self { tx }, join)
    }

    fn send(&self, cmd: PlaybackCommand) -> Result<(), Error> {
        self.tx
            .send(cmd)
            .map_err(|_| Error::Session("playback session is gone".into()))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> PlaybackCommand,
    ) -> Result<T, Error> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await
            .map_err(|_| Error::Session("playback session dropped the request".into()))
    }

    /// Appends `track`; starts playback in `voice_channel` if the session was idle.
    pub async fn enqueue(&self, track: Track, voice_channel: Option<u64>) -> Result<(), Error> {
        self.request(|done| PlaybackCommand::Enqueue { track, voice_channel, done }).await
    }

    pub async fn skip(&self, count: Option<i64>) -> Result<SkipOutcome, Error> {
        self.request(|reply| PlaybackCommand::Skip { count, reply }).await
    }

    pub async fn pause(&self) -> Result<bool, Error> {
        self.request(|reply| PlaybackCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<bool, Error> {
        self.request(|reply| PlaybackCommand::Resume { reply }).await
    }

    pub async fn disconnect(&self) -> Result<(), Error> {
        self.request(|done| PlaybackCommand::Disconnect { done }).await
    }

    /// Returns `true` when the change made the session leave its channel.
    pub async fn voice_presence_changed(&self, change: VoicePresenceChange) -> Result<bool, Error> {
        self.request(|reply| PlaybackCommand::VoicePresenceChanged { change, reply }).await
    }

    pub async fn describe(&self) -> Result<QueueView, Error> {
        self.request(|reply| PlaybackCommand::Describe { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, Error> {
        self.request(|reply| PlaybackCommand::Snapshot { reply }).await
    }
}

/// True when a member leaving `change.left_channel` abandons the bot there.
pub fn abandons_bot(change: &VoicePresenceChange, bot_channel: Option<u64>) -> bool {
    match bot_channel {
        Some(channel) if channel == change.left_channel => {
            change.remaining.len() <= 2 && change.non_bot_remaining() == 0
        }
        _ => false,
    }
}

struct PlaybackSession {
    queue: PlaybackQueue,
    voice: Arc<dyn VoiceGateway>,
    chat: Arc<dyn ChatGateway>,
    history: Arc<dyn HistoryRepository>,
    settings: SessionSettings,
    handle: Option<VoiceHandle>,
    /// Bumped on every play and on disconnect; completions from older plays are dropped.
    generation: u64,
    completions: mpsc::WeakUnboundedSender<PlaybackCommand>,
}

impl PlaybackSession {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PlaybackCommand>) {
        info!("Playback session started");
        while let Some(cmd) = rx.recv().await {
            self.handle_command(cmd).await;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.voice.disconnect(&handle).await {
                warn!("Voice disconnect on session shutdown failed: {:?}", e);
            }
        }
        info!("Playback session stopped");
    }

    async fn handle_command(&mut self, cmd: PlaybackCommand) {
        match cmd {
            PlaybackCommand::Enqueue { track, voice_channel, done } => {
                self.enqueue(track, voice_channel).await;
                let _ = done.send(());
            }
            PlaybackCommand::TrackFinished { generation } => {
                self.on_track_finished(generation).await;
            }
            PlaybackCommand::Skip { count, reply } => {
                let outcome = self.skip(count).await;
                let _ = reply.send(outcome);
            }
            PlaybackCommand::Pause { reply } => {
                let _ = reply.send(self.pause().await);
            }
            PlaybackCommand::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            }
            PlaybackCommand::Disconnect { done } => {
                self.disconnect().await;
                let _ = done.send(());
            }
            PlaybackCommand::VoicePresenceChanged { change, reply } => {
                let left = self.on_voice_presence(change).await;
                let _ = reply.send(left);
            }
            PlaybackCommand::Describe { reply } => {
                let _ = reply.send(self.queue.describe());
            }
            PlaybackCommand::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot {
                    state: self.queue.state(),
                    current_index: self.queue.current_index(),
                    len: self.queue.len(),
                    voice: self.handle,
                    generation: self.generation,
                });
            }
        }
    }

    async fn notify(&self, text: &str, ttl: Duration) {
        if let Err(e) = self.chat.send(text, Some(ttl)).await {
            warn!("Could not post notice '{}': {:?}", text, e);
        }
    }

    async fn enqueue(&mut self, track: Track, voice_channel: Option<u64>) {
        let title = track.title.clone();
        let was_idle = self.queue.push(track, voice_channel);
        debug!("enqueue: '{}' (len={}, was_idle={})", title, self.queue.len(), was_idle);
        self.notify(&format!("Added to queue: {}", title), ADDED_NOTICE_TTL).await;
        if was_idle {
            self.advance().await;
        }
    }

    async fn advance(&mut self) {
        let slot = match self.queue.advance() {
            Some(slot) => slot.clone(),
            None => {
                debug!("advance: end of queue, session idle");
                return;
            }
        };

        let handle = match self.ensure_connection(slot.voice_channel).await {
            Ok(h) => h,
            Err(e) => {
                error!("Failed to connect to Voice Client: {:?}", e);
                self.queue.mark_idle();
                let notice = match e {
                    Error::NotInVoiceChannel => "Requester not connected to any voice channel",
                    _ => "Could not connect to the voice channel",
                };
                self.notify(notice, CONNECT_NOTICE_TTL).await;
                return;
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let completions = self.completions.clone();
        let on_finished: OnFinished = Box::new(move || {
            if let Some(tx) = completions.upgrade() {
                let _ = tx.send(PlaybackCommand::TrackFinished { generation });
            }
        });

        let track = &slot.track;
        if let Err(e) = self.voice.play(&handle, &track.stream_url, on_finished).await {
            error!("Could not start '{}': {:?}", track.title, e);
            self.queue.mark_idle();
            self.notify(&format!("Could not play {}", track.title), CONNECT_NOTICE_TTL).await;
            return;
        }
        debug!(
            "advance: playing slot {:?} '{}' (generation {})",
            self.queue.current_index(),
            track.title,
            generation
        );

        self.notify(
            &format!("Now playing: {} - (Channel: {})", track.title, track.uploader_name),
            NOW_PLAYING_TTL,
        )
        .await;

        if let Err(e) = self.history.record(track).await {
            error!("Could not record '{}' in history: {:?}", track.title, e);
        }
    }

    /// Live handle in `target` (or wherever we already are when `target` is unknown).
    async fn ensure_connection(&mut self, target: Option<u64>) -> Result<VoiceHandle, Error> {
        let live = self.active_handle().await;

        let handle = match (live, target) {
            (Some(h), Some(channel)) if h.channel_id != channel => {
                debug!("Moving voice connection {} -> {}", h.channel_id, channel);
                timeout(self.settings.connect_timeout, self.voice.move_to(&h, channel)).await??
            }
            (Some(h), _) => h,
            (None, Some(channel)) => {
                debug!("Connecting to voice channel {}", channel);
                timeout(self.settings.connect_timeout, self.voice.connect(channel)).await??
            }
            (None, None) => return Err(Error::NotInVoiceChannel),
        };
        self.handle = Some(handle);
        Ok(handle)
    }

    async fn on_track_finished(&mut self, generation: u64) {
        if generation != self.generation || !self.queue.state().is_active() {
            debug!(
                "Ignoring stale completion (generation {}, active {}, state {})",
                generation,
                self.generation,
                self.queue.state()
            );
            return;
        }
        self.advance().await;
    }

    async fn active_handle(&self) -> Option<VoiceHandle> {
        let handle = self.handle?;
        if self.voice.is_connected(&handle).await {
            Some(handle)
        } else {
            None
        }
    }

    async fn skip(&mut self, count: Option<i64>) -> SkipOutcome {
        let handle = match self.active_handle().await {
            Some(h) if self.queue.state().is_active() => h,
            _ => return SkipOutcome::NothingPlaying,
        };

        let amount = self.queue.skip_amount(count);
        self.queue.pre_advance(amount);
        debug!("skip: pre-advanced {} to {:?}", amount, self.queue.current_index());

        // The completion of the stopped play performs the advance.
        if let Err(e) = self.voice.stop(&handle).await {
            error!("Stopping playback failed: {:?}", e);
        }
        self.notify(&format!("Skipped {} songs", amount + 1), SKIPPED_NOTICE_TTL).await;
        SkipOutcome::Skipped { count: amount + 1 }
    }

    async fn pause(&mut self) -> bool {
        let Some(handle) = self.active_handle().await else {
            return false;
        };
        if !self.queue.pause() {
            return false;
        }
        if let Err(e) = self.voice.pause(&handle).await {
            error!("Pausing playback failed: {:?}", e);
            self.queue.resume();
            return false;
        }
        true
    }

    async fn resume(&mut self) -> bool {
        let Some(handle) = self.active_handle().await else {
            return false;
        };
        if !self.queue.resume() {
            return false;
        }
        if let Err(e) = self.voice.resume(&handle).await {
            error!("Resuming playback failed: {:?}", e);
            self.queue.pause();
            return false;
        }
        true
    }

    async fn disconnect(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.voice.disconnect(&handle).await {
                warn!("Voice disconnect failed: {:?}", e);
            }
        }
        self.queue.reset();
        self.generation += 1;
        info!("Playback session reset");
    }

    async fn on_voice_presence(&mut self, change: VoicePresenceChange) -> bool {
        let bot_channel = self.handle.map(|h| h.channel_id);
        if !abandons_bot(&change, bot_channel) {
            return false;
        }
        info!(
            "All non-bot members left voice channel {}; disconnecting",
            change.left_channel
        );
        self.disconnect().await;
        self.notify(AUTO_LEAVE_NOTICE, AUTO_LEAVE_NOTICE_TTL).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunebot_common::models::discord::VoiceMember;

    fn member(user_id: u64, is_bot: bool) -> VoiceMember {
        VoiceMember { user_id, is_bot }
    }

    fn change(left: u64, remaining: Vec<VoiceMember>) -> VoicePresenceChange {
        VoicePresenceChange { user_id: 7, left_channel: left, remaining }
    }

    #[test]
    fn abandonment_needs_the_bot_channel() {
        let c = change(10, vec![member(1, true)]);
        assert!(abandons_bot(&c, Some(10)));
        assert!(!abandons_bot(&c, Some(11)));
        assert!(!abandons_bot(&c, None));
    }

    #[test]
    fn remaining_humans_keep_the_bot() {
        assert!(!abandons_bot(&change(10, vec![member(1, true), member(2, false)]), Some(10)));
        assert!(abandons_bot(&change(10, vec![member(1, true), member(3, true)]), Some(10)));
        assert!(!abandons_bot(
            &change(10, vec![member(1, true), member(3, true), member(4, true)]),
            Some(10)
        ));
        assert!(abandons_bot(&change(10, vec![]), Some(10)));
    }
}
