// tunebot-core/src/repositories/sqlite/carryover.rs

use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

use tunebot_common::models::history::CarryoverItem;
use tunebot_common::traits::repository_traits::CarryoverRepository;

use crate::utils::time::{from_epoch_micros, to_epoch_micros};
use crate::Error;

/// Playlist items that were queued but never played, kept in `playlist_carryover`.
#[derive(Clone)]
pub struct SqliteCarryoverRepository {
    pool: Pool<Sqlite>,
}

impl SqliteCarryoverRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CarryoverRepository for SqliteCarryoverRepository {
    async fn insert(&self, item: &CarryoverItem) -> Result<(), Error> {
        sqlx::query("INSERT INTO playlist_carryover (title, watch_url, added_at) VALUES (?, ?, ?)")
            .bind(&item.title)
            .bind(&item.watch_url)
            .bind(to_epoch_micros(item.added_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_newest_first(&self) -> Result<Vec<CarryoverItem>, Error> {
        let rows = sqlx::query(
            "SELECT title, watch_url, added_at FROM playlist_carryover ORDER BY added_at DESC"
        )
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let added_at: i64 = r.try_get("added_at")?;
            out.push(CarryoverItem {
                title: r.try_get("title")?,
                watch_url: r.try_get("watch_url")?,
                added_at: from_epoch_micros(added_at)?,
            });
        }
        Ok(out)
    }

    async fn delete_oldest(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            DELETE FROM playlist_carryover
            WHERE rowid = (
                SELECT rowid FROM playlist_carryover ORDER BY added_at ASC LIMIT 1
            )
            "#
        )
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
