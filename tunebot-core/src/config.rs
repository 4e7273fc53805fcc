// tunebot-core/src/config.rs

use std::time::Duration;

use crate::services::dispatcher::DispatcherSettings;
use crate::services::playback::SessionSettings;
use crate::Error;

pub const DEFAULT_PURGE_CHANNELS: &[&str] = &["youtube-music-bot", "bot_test"];

/// Runtime settings of the bot, filled in by the binary from CLI/env.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub guild_id: u64,
    pub text_channel_id: u64,
    pub database_url: String,
    pub yt_dlp_path: String,
    pub ffmpeg_path: String,
    pub search_expiry: Duration,
    pub history_retention_days: i64,
    pub connect_timeout: Duration,
    pub resolve_timeout: Duration,
    pub purge_channel_names: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: 0,
            text_channel_id: 0,
            database_url: "history.db".to_string(),
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            search_expiry: Duration::from_secs(30),
            history_retention_days: 7,
            connect_timeout: Duration::from_secs(15),
            resolve_timeout: Duration::from_secs(60),
            purge_channel_names: DEFAULT_PURGE_CHANNELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.discord_token.trim().is_empty() {
            return Err(Error::Config("DISCORD_API_KEY is empty".into()));
        }
        if self.guild_id == 0 {
            return Err(Error::Config("GUILD_ID must be a non-zero snowflake".into()));
        }
        if self.text_channel_id == 0 {
            return Err(Error::Config("TEXT_CHANNEL_ID must be a non-zero snowflake".into()));
        }
        if self.search_expiry.is_zero() {
            return Err(Error::Config("SEARCH_EXPIRY_SECS must be positive".into()));
        }
        if self.history_retention_days <= 0 {
            return Err(Error::Config("HISTORY_RETENTION_DAYS must be positive".into()));
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            connect_timeout: self.connect_timeout,
        }
    }

    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            text_channel_id: self.text_channel_id,
            purge_channel_names: self.purge_channel_names.clone(),
            resolve_timeout: self.resolve_timeout,
        }
    }
}

/// Splits a comma separated list, dropping blanks.
pub fn parse_name_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
