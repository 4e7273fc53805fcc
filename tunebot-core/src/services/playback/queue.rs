// tunebot-core/src/services/playback/queue.rs
//
// The playback queue proper: slots, cursor and session state. Everything in
// here is synchronous bookkeeping; the session task decides when to call
// which transition and performs the voice side effects around it.

use uuid::Uuid;

use tunebot_common::models::playback::{PlaybackState, QueueLine, QueueView};
use tunebot_common::models::track::Track;

/// How many slots the queue listing shows, starting at the cursor.
pub const QUEUE_VIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSlot {
    pub slot_id: String,
    pub track: Track,
    /// Voice channel the requester was in when the track was queued.
    pub voice_channel: Option<u64>,
}

/// Ordered slots plus a cursor at the slot that most recently started.
///
/// The cursor starts before the first slot (`None`) and never passes the last
/// slot. Skipped slots stay in the list; only the cursor jumps over them.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    slots: Vec<QueueSlot>,
    current_index: Option<usize>,
    state: PlaybackState,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[QueueSlot] {
        &self.slots
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn current(&self) -> Option<&QueueSlot> {
        self.current_index.and_then(|i| self.slots.get(i))
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// True when the cursor sits on the last slot (or there are no slots).
    pub fn is_at_end(&self) -> bool {
        match self.current_index {
            Some(i) => i + 1 >= self.slots.len(),
            None => self.slots.is_empty(),
        }
    }

    /// Appends a slot. Returns `true` when the session was idle, meaning the
    /// caller has to start playback with [`PlaybackQueue::advance`].
    pub fn push(&mut self, track: Track, voice_channel: Option<u64>) -> bool {
        self.slots.push(QueueSlot {
            slot_id: Uuid::new_v4().to_string(),
            track,
            voice_channel,
        });
        self.state == PlaybackState::Idle
    }

    /// Moves the cursor to the next slot and marks the session playing.
    /// At the end of the queue it goes idle, leaves the cursor alone and
    /// returns `None`.
    pub fn advance(&mut self) -> Option<&QueueSlot> {
        if self.is_at_end() {
            self.state = PlaybackState::Idle;
            return None;
        }
        let next = self.current_index.map_or(0, |i| i + 1);
        self.current_index = Some(next);
        self.state = PlaybackState::Playing;
        self.slots.get(next)
    }

    /// Playback for the slot at the cursor could not start or was torn down.
    pub fn mark_idle(&mut self) {
        self.state = PlaybackState::Idle;
    }

    /// How far to move the cursor before stopping the current stream.
    ///
    /// Stopping fires one natural advance, so `skip N` pre-advances `N - 1`.
    /// The amount is clamped so that the advance which follows lands on the
    /// last slot at most. Absent or non-positive counts skip only the current
    /// track.
    pub fn skip_amount(&self, count: Option<i64>) -> usize {
        let requested = match count {
            Some(n) if n > 0 => (n - 1) as usize,
            _ => 0,
        };
        let remaining = match self.current_index {
            Some(i) => self.slots.len().saturating_sub(i + 1),
            None => self.slots.len(),
        };
        requested.min(remaining.saturating_sub(1))
    }

    /// Moves the cursor forward by `amount` without starting anything.
    /// Only meaningful while a slot is active.
    pub fn pre_advance(&mut self, amount: usize) {
        if let Some(i) = self.current_index {
            let last = self.slots.len().saturating_sub(1);
            self.current_index = Some((i + amount).min(last));
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
            true
        } else {
            false
        }
    }

    /// Empties the playlist, rewinds the cursor and goes idle.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.current_index = None;
        self.state = PlaybackState::Idle;
    }

    /// Up to [`QUEUE_VIEW_LIMIT`] slots from the cursor on, the active slot marked.
    pub fn describe(&self) -> QueueView {
        let active = self.state.is_active();
        if self.is_at_end() && !active {
            return QueueView::Empty;
        }
        let start = self.current_index.unwrap_or(0);
        let lines: Vec<QueueLine> = self
            .slots
            .iter()
            .enumerate()
            .skip(start)
            .take(QUEUE_VIEW_LIMIT)
            .map(|(i, slot)| QueueLine {
                slot_index: i,
                title: slot.track.title.clone(),
                is_current: active && Some(i) == self.current_index,
            })
            .collect();

        if lines.is_empty() {
            QueueView::Empty
        } else {
            QueueView::Lines(lines)
        }
    }
}
