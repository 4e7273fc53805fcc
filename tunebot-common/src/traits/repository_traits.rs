use async_trait::async_trait;
use chrono::Utc;

use crate::error::Error;
use crate::models::history::{CarryoverItem, HistoryEntry, HistoryPage};
use crate::models::track::Track;

pub const HISTORY_PAGE_SIZE: u32 = 10;

#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Inserts `entry`, or refreshes `added_at` of the row with the same watch URL.
    /// Afterwards drops every row older than the retention window, measured from
    /// `entry.added_at`.
    async fn upsert(&self, entry: &HistoryEntry) -> Result<(), Error>;

    /// Newest first, [`HISTORY_PAGE_SIZE`] rows per page, `page` is 1-based.
    async fn page(&self, page: u32) -> Result<HistoryPage, Error>;

    async fn get_by_search_id(&self, search_id: &str) -> Result<Option<HistoryEntry>, Error>;

    async fn record(&self, track: &Track) -> Result<(), Error> {
        self.upsert(&HistoryEntry::from_track(track, Utc::now())).await
    }
}

#[async_trait]
pub trait CarryoverRepository: Send + Sync {
    async fn insert(&self, item: &CarryoverItem) -> Result<(), Error>;
    async fn list_newest_first(&self) -> Result<Vec<CarryoverItem>, Error>;
    async fn delete_oldest(&self) -> Result<(), Error>;
}
