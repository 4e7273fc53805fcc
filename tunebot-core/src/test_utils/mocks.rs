// File: tunebot-core/src/test_utils/mocks.rs
//
// Recording fakes for the collaborator traits. They keep everything they are
// asked to do so tests can assert on the exact side effects.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use tunebot_common::models::history::{HistoryEntry, HistoryPage};
use tunebot_common::traits::repository_traits::HISTORY_PAGE_SIZE;
use tunebot_common::traits::{ChatGateway, HistoryRepository, OnFinished, VoiceGateway, VoiceHandle};

use crate::Error;

pub const TEST_GUILD_ID: u64 = 4242;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCall {
    Connect(u64),
    MoveTo(u64),
    Play(String),
    Stop,
    Pause,
    Resume,
    Disconnect,
}

/// Voice gateway that records every call.
///
/// Like the real driver, starting a new play, stopping, or leaving ends the
/// current track and fires its completion callback.
#[derive(Default)]
pub struct RecordingVoiceGateway {
    calls: Mutex<Vec<VoiceCall>>,
    connected: Mutex<Option<VoiceHandle>>,
    pending: Mutex<Option<OnFinished>>,
    pub fail_connect: AtomicBool,
    pub fail_play: AtomicBool,
}

impl RecordingVoiceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<VoiceCall> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, pred: impl Fn(&VoiceCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    pub fn played(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                VoiceCall::Play(url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn connected_channel(&self) -> Option<u64> {
        lock(&self.connected).map(|h| h.channel_id)
    }

    /// The current track ran to its natural end.
    pub fn finish_current(&self) {
        self.fire_pending();
    }

    fn fire_pending(&self) {
        let pending = lock(&self.pending).take();
        if let Some(cb) = pending {
            cb();
        }
    }

    fn record(&self, call: VoiceCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl VoiceGateway for RecordingVoiceGateway {
    async fn connect(&self, channel_id: u64) -> Result<VoiceHandle, Error> {
        self.record(VoiceCall::Connect(channel_id));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::Voice("connect refused".into()));
        }
        let handle = VoiceHandle { guild_id: TEST_GUILD_ID, channel_id };
        *lock(&self.connected) = Some(handle);
        Ok(handle)
    }

    async fn move_to(&self, _handle: &VoiceHandle, channel_id: u64) -> Result<VoiceHandle, Error> {
        self.record(VoiceCall::MoveTo(channel_id));
        let handle = VoiceHandle { guild_id: TEST_GUILD_ID, channel_id };
        *lock(&self.connected) = Some(handle);
        Ok(handle)
    }

    async fn is_connected(&self, handle: &VoiceHandle) -> bool {
        *lock(&self.connected) == Some(*handle)
    }

    async fn play(
        &self,
        _handle: &VoiceHandle,
        stream_url: &str,
        on_finished: OnFinished,
    ) -> Result<(), Error> {
        self.record(VoiceCall::Play(stream_url.to_string()));
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::Voice("play refused".into()));
        }
        self.fire_pending();
        *lock(&self.pending) = Some(on_finished);
        Ok(())
    }

    async fn stop(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.record(VoiceCall::Stop);
        self.fire_pending();
        Ok(())
    }

    async fn pause(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.record(VoiceCall::Pause);
        Ok(())
    }

    async fn resume(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.record(VoiceCall::Resume);
        Ok(())
    }

    async fn disconnect(&self, _handle: &VoiceHandle) -> Result<(), Error> {
        self.record(VoiceCall::Disconnect);
        *lock(&self.connected) = None;
        self.fire_pending();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub id: u64,
    pub text: String,
    pub delete_after: Option<Duration>,
}

/// Chat gateway that keeps every message, reaction and deletion.
pub struct RecordingChat {
    next_id: AtomicU64,
    sent: Mutex<Vec<SentMessage>>,
    reactions: DashMap<u64, Vec<String>>,
    deletions: Mutex<Vec<(u64, Option<Duration>)>>,
    purges: Mutex<Vec<usize>>,
    channel_name: String,
    fail_sends: AtomicBool,
}

impl Default for RecordingChat {
    fn default() -> Self {
        Self::with_channel_name("youtube-music-bot")
    }
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel_name(name: &str) -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            sent: Mutex::new(Vec::new()),
            reactions: DashMap::new(),
            deletions: Mutex::new(Vec::new()),
            purges: Mutex::new(Vec::new()),
            channel_name: name.to_string(),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn texts(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|m| m.text.clone()).collect()
    }

    pub fn last(&self) -> Option<SentMessage> {
        lock(&self.sent).last().cloned()
    }

    /// Messages containing `needle`.
    pub fn containing(&self, needle: &str) -> Vec<SentMessage> {
        lock(&self.sent)
            .iter()
            .filter(|m| m.text.contains(needle))
            .cloned()
            .collect()
    }

    pub fn reactions_on(&self, message_id: u64) -> Vec<String> {
        self.reactions
            .get(&message_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn deletions(&self) -> Vec<(u64, Option<Duration>)> {
        lock(&self.deletions).clone()
    }

    pub fn purges(&self) -> Vec<usize> {
        lock(&self.purges).clone()
    }

    /// While set, every `send` fails as if the channel were unreachable.
    pub fn set_send_failure(&self, on: bool) {
        self.fail_sends.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatGateway for RecordingChat {
    async fn send(&self, text: &str, delete_after: Option<Duration>) -> Result<u64, Error> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Platform("send refused".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.sent).push(SentMessage {
            id,
            text: text.to_string(),
            delete_after,
        });
        Ok(id)
    }

    async fn add_reactions(&self, message_id: u64, emojis: &[&str]) -> Result<(), Error> {
        self.reactions
            .entry(message_id)
            .or_default()
            .extend(emojis.iter().map(|e| e.to_string()));
        Ok(())
    }

    async fn delete_message(&self, message_id: u64, delay: Option<Duration>) -> Result<(), Error> {
        lock(&self.deletions).push((message_id, delay));
        Ok(())
    }

    async fn purge(&self, limit: usize) -> Result<usize, Error> {
        lock(&self.purges).push(limit);
        Ok(0)
    }

    async fn channel_name(&self) -> Result<String, Error> {
        Ok(self.channel_name.clone())
    }
}

/// History kept in memory, with the same upsert-by-watch-URL rule as SQLite.
#[derive(Default)]
pub struct InMemoryHistoryRepository {
    entries: Mutex<Vec<HistoryEntry>>,
    pub fail_writes: AtomicBool,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        lock(&self.entries).clone()
    }

    pub fn seed(&self, entry: HistoryEntry) {
        lock(&self.entries).push(entry);
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn upsert(&self, entry: &HistoryEntry) -> Result<(), Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Session("history store unavailable".into()));
        }
        let mut entries = lock(&self.entries);
        match entries.iter_mut().find(|e| e.watch_url == entry.watch_url) {
            Some(existing) => existing.added_at = entry.added_at,
            None => entries.push(entry.clone()),
        }
        Ok(())
    }

    async fn page(&self, page: u32) -> Result<HistoryPage, Error> {
        let page = page.max(1);
        let mut entries = lock(&self.entries).clone();
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        let size = HISTORY_PAGE_SIZE as usize;
        let total_pages = entries.len().div_ceil(size) as u32;
        let entries = entries
            .into_iter()
            .skip((page as usize - 1).saturating_mul(size))
            .take(size)
            .collect();
        Ok(HistoryPage { page, total_pages, entries })
    }

    async fn get_by_search_id(&self, search_id: &str) -> Result<Option<HistoryEntry>, Error> {
        Ok(lock(&self.entries)
            .iter()
            .filter(|e| e.search_id == search_id)
            .max_by_key(|e| e.added_at)
            .cloned())
    }
}
