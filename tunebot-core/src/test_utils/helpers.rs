// File: tunebot-core/src/test_utils/helpers.rs

use sqlx::{Pool, Sqlite};

use crate::db::Database;
use crate::Error;

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Sqlite>) -> Result<(), Error> {
    sqlx::query("DELETE FROM play_history").execute(pool).await?;
    sqlx::query("DELETE FROM playlist_carryover").execute(pool).await?;
    Ok(())
}

/// Returns a migrated, empty in-memory database.
pub async fn setup_test_database() -> Result<Database, Error> {
    let db = Database::new(":memory:").await?;
    db.migrate().await?;
    clean_database(db.pool()).await?;
    Ok(db)
}
