//! voice.rs
//!
//! VoiceGateway on top of songbird: joins, moves and leaves the guild's voice
//! channel and streams ffmpeg output into it.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use songbird::tracks::TrackHandle;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use twilight_model::id::marker::{ChannelMarker, GuildMarker};
use twilight_model::id::Id;

use tunebot_common::traits::{OnFinished, VoiceGateway, VoiceHandle};

use crate::services::media::FfmpegTransport;
use crate::Error;

/// Fires the wrapped callback the first time any of its registered events hits.
#[derive(Clone)]
struct FinishNotifier {
    callback: Arc<StdMutex<Option<OnFinished>>>,
}

impl FinishNotifier {
    fn new(on_finished: OnFinished) -> Self {
        Self {
            callback: Arc::new(StdMutex::new(Some(on_finished))),
        }
    }

    fn fire(&self) {
        let callback = match self.callback.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(cb) = callback {
            cb();
        }
    }
}

#[async_trait]
impl VoiceEventHandler for FinishNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                debug!("Track ended in state {:?}", state.playing);
            }
        }
        self.fire();
        None
    }
}

pub struct SongbirdVoiceGateway {
    songbird: Arc<Songbird>,
    guild_id: Id<GuildMarker>,
    transport: FfmpegTransport,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdVoiceGateway {
    pub fn new(songbird: Arc<Songbird>, guild_id: u64, transport: FfmpegTransport) -> Result<Self, Error> {
        let guild_id = Id::new_checked(guild_id)
            .ok_or_else(|| Error::Config(format!("invalid guild id {guild_id}")))?;
        Ok(Self {
            songbird,
            guild_id,
            transport,
            current: Mutex::new(None),
        })
    }

    async fn join(&self, channel_id: u64) -> Result<VoiceHandle, Error> {
        let channel: Id<ChannelMarker> = Id::new_checked(channel_id)
            .ok_or_else(|| Error::Voice(format!("invalid voice channel id {channel_id}")))?;
        self.songbird
            .join(self.guild_id, channel)
            .await
            .map_err(|e| Error::Voice(format!("join {channel_id} failed: {e}")))?;
        Ok(VoiceHandle {
            guild_id: self.guild_id.get(),
            channel_id,
        })
    }

    async fn current_track(&self) -> Result<TrackHandle, Error> {
        self.current
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::Voice("no track is playing".into()))
    }
}

#[async_trait]
impl VoiceGateway for SongbirdVoiceGateway {
    async fn connect(&self, channel_id: u64) -> Result<VoiceHandle, Error> {
        self.join(channel_id).await
    }

    async fn move_to(&self, _handle: &VoiceHandle, channel_id: u64) -> Result<VoiceHandle, Error> {
        // joining again with a live call relocates it
        self.join(channel_id).await
    }

    async fn is_connected(&self, handle: &VoiceHandle) -> bool {
        let Some(call) = self.songbird.get(self.guild_id) else {
            return false;
        };
        let current = call.lock().await.current_channel();
        current.map(|c| c.0.get()) == Some(handle.channel_id)
    }

    async fn play(
        &self,
        _handle: &VoiceHandle,
        stream_url: &str,
        on_finished: OnFinished,
    ) -> Result<(), Error> {
        let call = self
            .songbird
            .get(self.guild_id)
            .ok_or_else(|| Error::Voice("not in a voice channel".into()))?;
        let input = self.transport.open(stream_url)?;

        let track = call.lock().await.play_only_input(input);
        let notifier = FinishNotifier::new(on_finished);
        for kind in [TrackEvent::End, TrackEvent::Error] {
            if let Err(e) = track.add_event(Event::Track(kind), notifier.clone()) {
                let _ = track.stop();
                return Err(Error::Voice(format!("could not watch track: {e}")));
            }
        }
        *self.current.lock().await = Some(track);
        Ok(())
    }

    async fn stop(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        let track = self.current_track().await?;
        track
            .stop()
            .map_err(|e| Error::Voice(format!("stop failed: {e}")))
    }

    async fn pause(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.current_track()
            .await?
            .pause()
            .map_err(|e| Error::Voice(format!("pause failed: {e}")))
    }

    async fn resume(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.current_track()
            .await?
            .play()
            .map_err(|e| Error::Voice(format!("resume failed: {e}")))
    }

    async fn disconnect(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.current.lock().await.take();
        if self.songbird.get(self.guild_id).is_none() {
            return Ok(());
        }
        if let Err(e) = self.songbird.remove(self.guild_id).await {
            warn!("Leaving voice failed: {}", e);
            return Err(Error::Voice(format!("leave failed: {e}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notifier_fires_once_across_clones() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let notifier = FinishNotifier::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let end = notifier.clone();
        let error = notifier.clone();

        end.fire();
        error.fire();
        notifier.fire();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
