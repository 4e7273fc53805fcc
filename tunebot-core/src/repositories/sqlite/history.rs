// tunebot-core/src/repositories/sqlite/history.rs
//
// Rolling play history in the `play_history` table. A row is written (or its
// timestamp refreshed) every time a track starts playing, and every write
// trims rows that fell out of the retention window.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{Pool, Row, Sqlite};
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use tunebot_common::models::history::{HistoryEntry, HistoryPage};
use tunebot_common::traits::repository_traits::{HistoryRepository, HISTORY_PAGE_SIZE};

use crate::utils::time::{from_epoch_micros, to_epoch_micros};
use crate::Error;

pub const DEFAULT_RETENTION_DAYS: i64 = 7;

#[derive(Clone)]
pub struct SqliteHistoryRepository {
    pool: Pool<Sqlite>,
    retention: Duration,
}

impl SqliteHistoryRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            retention: Duration::days(DEFAULT_RETENTION_DAYS),
        }
    }

    pub fn with_retention_days(pool: Pool<Sqlite>, days: i64) -> Self {
        Self {
            pool,
            retention: Duration::days(days),
        }
    }

    pub async fn count(&self) -> Result<i64, Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM play_history")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("n")?)
    }
}

fn row_to_entry(r: &SqliteRow) -> Result<HistoryEntry, Error> {
    let added_at: i64 = r.try_get("added_at")?;
    Ok(HistoryEntry {
        search_id:     r.try_get("search_id")?,
        added_by:      r.try_get("added_by")?,
        title:         r.try_get("title")?,
        uploader_name: r.try_get("uploader_name")?,
        watch_url:     r.try_get("watch_url")?,
        added_at:      from_epoch_micros(added_at)?,
    })
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn upsert(&self, entry: &HistoryEntry) -> Result<(), Error> {
        let now_us = to_epoch_micros(entry.added_at);
        let cutoff_us = to_epoch_micros(Utc::now() - self.retention);

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT 1 FROM play_history WHERE watch_url = ? LIMIT 1")
            .bind(&entry.watch_url)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            sqlx::query("UPDATE play_history SET added_at = ? WHERE watch_url = ?")
                .bind(now_us)
                .bind(&entry.watch_url)
                .execute(&mut *tx)
                .await?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO play_history (
                    search_id, added_by, title, uploader_name, watch_url, added_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                "#
            )
                .bind(&entry.search_id)
                .bind(&entry.added_by)
                .bind(&entry.title)
                .bind(&entry.uploader_name)
                .bind(&entry.watch_url)
                .bind(now_us)
                .execute(&mut *tx)
                .await?;
        }

        let purged = sqlx::query("DELETE FROM play_history WHERE added_at <= ?")
            .bind(cutoff_us)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if purged > 0 {
            debug!("Purged {} expired history rows", purged);
        }
        Ok(())
    }

    async fn page(&self, page: u32) -> Result<HistoryPage, Error> {
        let page = page.max(1);
        let total = self.count().await?;
        let total_pages = u32::try_from((total + HISTORY_PAGE_SIZE as i64 - 1) / HISTORY_PAGE_SIZE as i64)
            .unwrap_or(u32::MAX);
        let offset = (i64::from(page) - 1) * i64::from(HISTORY_PAGE_SIZE);

        let rows = sqlx::query(
            r#"
            SELECT search_id, added_by, title, uploader_name, watch_url, added_at
            FROM play_history
            ORDER BY added_at DESC
            LIMIT ? OFFSET ?
            "#
        )
            .bind(HISTORY_PAGE_SIZE as i64)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for r in &rows {
            entries.push(row_to_entry(r)?);
        }

        Ok(HistoryPage {
            page,
            total_pages,
            entries,
        })
    }

    async fn get_by_search_id(&self, search_id: &str) -> Result<Option<HistoryEntry>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT search_id, added_by, title, uploader_name, watch_url, added_at
            FROM play_history
            WHERE search_id = ?
            ORDER BY added_at DESC
            LIMIT 1
            "#
        )
            .bind(search_id)
            .fetch_optional(&self.pool)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(row_to_entry(&r)?)),
            None => Ok(None),
        }
    }
}
