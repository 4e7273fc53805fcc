use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::track::Track;

/// One persisted row of play history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub search_id: String,
    pub added_by: String,
    pub title: String,
    pub uploader_name: String,
    pub watch_url: String,
    pub added_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_track(track: &Track, added_at: DateTime<Utc>) -> Self {
        Self {
            search_id: track.track_id.clone(),
            added_by: track.added_by.clone(),
            title: track.title.clone(),
            uploader_name: track.uploader_name.clone(),
            watch_url: track.watch_url.clone(),
            added_at,
        }
    }
}

/// A page of history, newest first.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// 1-based page number that was requested.
    pub page: u32,
    pub total_pages: u32,
    pub entries: Vec<HistoryEntry>,
}

/// Un-played playlist item kept across restarts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarryoverItem {
    pub title: String,
    pub watch_url: String,
    pub added_at: DateTime<Utc>,
}
