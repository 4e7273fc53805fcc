// src/lib.rs

pub mod config;
pub mod db;
pub mod repositories;
pub mod platforms;
pub mod tasks;
pub mod eventbus;
pub mod services;
pub mod utils;
pub mod test_utils;

pub use config::BotConfig;
pub use db::Database;
pub use tunebot_common::error::Error;
