// tunebot-core/src/db/mod.rs

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::Error;

/// SQLite-backed database handle shared by every repository.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Opens (creating if needed) the database at `database_url`.
    ///
    /// Accepts a plain file path, a `sqlite:` URL, or `:memory:`. An in-memory
    /// database lives inside a single connection, so the pool is pinned to one
    /// connection that is never recycled.
    pub async fn new(database_url: &str) -> Result<Self, Error> {
        let is_memory = database_url == ":memory:" || database_url == "sqlite::memory:";

        let options = if is_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            let url = if database_url.starts_with("sqlite:") {
                database_url.to_string()
            } else {
                if let Some(parent) = std::path::Path::new(database_url).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                format!("sqlite://{database_url}")
            };
            SqliteConnectOptions::from_str(&url)?.create_if_missing(true)
        };

        let mut pool_opts = SqlitePoolOptions::new();
        pool_opts = if is_memory {
            pool_opts
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_opts.max_connections(5)
        };

        let pool = pool_opts.connect_with(options).await?;
        info!("Connected to SQLite database at {}", database_url);
        Ok(Self { pool })
    }

    /// Run migrations in the `migrations/` folder.
    pub async fn migrate(&self) -> Result<(), Error> {
        info!("Applying migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations applied successfully.");
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}
