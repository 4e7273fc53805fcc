pub mod carryover;
pub mod history;

pub use carryover::SqliteCarryoverRepository;
pub use history::SqliteHistoryRepository;
