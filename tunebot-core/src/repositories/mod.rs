// tunebot-core/src/repositories/mod.rs

pub mod sqlite;

pub use sqlite::{SqliteCarryoverRepository, SqliteHistoryRepository};
pub use tunebot_common::traits::repository_traits::{
    CarryoverRepository, HistoryRepository, HISTORY_PAGE_SIZE,
};
