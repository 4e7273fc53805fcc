use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use tunebot_core::eventbus::EventBus;
use tunebot_core::platforms::discord::{DiscordPlatform, SongbirdVoiceGateway};
use tunebot_core::platforms::PlatformIntegration;
use tunebot_core::repositories::SqliteHistoryRepository;
use tunebot_core::services::media::{FfmpegTransport, YtDlpResolver};
use tunebot_core::services::{MusicDispatcher, PlaybackService, SearchRegistry};
use tunebot_core::{config, BotConfig, Database, Error};

#[derive(Parser, Debug, Clone)]
#[command(name = "tunebot")]
#[command(author, version, about = "TuneBot - Discord music bot for a single guild")]
struct Args {
    /// Discord bot token.
    #[arg(long, env = "DISCORD_API_KEY", hide_env_values = true)]
    discord_token: String,

    /// Guild the bot serves.
    #[arg(long, env = "GUILD_ID")]
    guild_id: u64,

    /// The one text channel the bot reads commands from and posts to.
    #[arg(long, env = "TEXT_CHANNEL_ID")]
    text_channel_id: u64,

    /// SQLite file (or `sqlite:` URL) for play history.
    #[arg(long, env = "DATABASE_URL", default_value = "history.db")]
    database_url: String,

    #[arg(long, env = "YT_DLP_PATH", default_value = "yt-dlp")]
    yt_dlp_path: String,

    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    ffmpeg_path: String,

    /// How long a search menu accepts a reaction.
    #[arg(long, env = "SEARCH_EXPIRY_SECS", default_value_t = 30)]
    search_expiry_secs: u64,

    #[arg(long, env = "HISTORY_RETENTION_DAYS", default_value_t = 7)]
    history_retention_days: i64,

    #[arg(long, env = "CONNECT_TIMEOUT_SECS", default_value_t = 15)]
    connect_timeout_secs: u64,

    #[arg(long, env = "RESOLVE_TIMEOUT_SECS", default_value_t = 60)]
    resolve_timeout_secs: u64,

    /// Comma separated channel names in which `!cm` may purge.
    #[arg(long, env = "PURGE_CHANNEL_NAMES", default_value = "youtube-music-bot,bot_test")]
    purge_channel_names: String,
}

impl Args {
    fn into_config(self) -> BotConfig {
        BotConfig {
            discord_token: self.discord_token,
            guild_id: self.guild_id,
            text_channel_id: self.text_channel_id,
            database_url: self.database_url,
            yt_dlp_path: self.yt_dlp_path,
            ffmpeg_path: self.ffmpeg_path,
            search_expiry: Duration::from_secs(self.search_expiry_secs),
            history_retention_days: self.history_retention_days,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            resolve_timeout: Duration::from_secs(self.resolve_timeout_secs),
            purge_channel_names: config::parse_name_list(&self.purge_channel_names),
        }
    }
}

fn init_tracing() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge already installed: {e}");
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tunebot=info,tunebot_core=info,tunebot_server=info"));
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {e}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = args.into_config();
    config.validate()?;

    info!(
        "TuneBot starting. guild={}, text_channel={}, db={}",
        config.guild_id, config.text_channel_id, config.database_url
    );

    if let Err(e) = run_bot(config).await {
        error!("Bot error: {:?}", e);
        return Err(e.into());
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_bot(config: BotConfig) -> Result<(), Error> {
    // 1) history store
    let db = Database::new(&config.database_url).await?;
    db.migrate().await?;
    let history = Arc::new(SqliteHistoryRepository::with_retention_days(
        db.pool().clone(),
        config.history_retention_days,
    ));

    // 2) event bus + gateway
    let event_bus = EventBus::new();
    let dispatcher_rx = event_bus.subscribe(None).await;

    let mut discord = DiscordPlatform::new(
        config.discord_token.clone(),
        config.guild_id,
        event_bus.clone(),
    );
    discord.connect().await?;

    // 3) collaborators
    let voice = Arc::new(SongbirdVoiceGateway::new(
        discord.songbird()?,
        config.guild_id,
        FfmpegTransport::new(config.ffmpeg_path.clone()),
    )?);
    let chat = Arc::new(discord.chat_gateway(config.text_channel_id)?);
    let resolver = Arc::new(YtDlpResolver::new(config.yt_dlp_path.clone()));

    let (playback, session_task) = PlaybackService::spawn(
        voice,
        chat.clone(),
        history.clone(),
        config.session_settings(),
    );

    let dispatcher = Arc::new(MusicDispatcher::new(
        chat,
        resolver,
        history,
        playback,
        SearchRegistry::new(config.search_expiry),
        event_bus.clone(),
        config.dispatcher_settings(),
    ));
    let dispatcher_task = dispatcher.spawn(dispatcher_rx);

    info!("TuneBot is up; listening in channel {}", config.text_channel_id);

    // 4) run until ctrl-c or `!restart`
    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            match res {
                Ok(()) => info!("Ctrl-C received => shutting down."),
                Err(e) => warn!("Could not listen for Ctrl-C: {:?}", e),
            }
            event_bus.shutdown();
        }
        _ = shutdown_rx.changed() => {
            info!("Shutdown requested from chat.");
        }
    }

    if let Err(e) = dispatcher_task.await {
        warn!("Dispatcher task ended abnormally: {:?}", e);
    }
    // the dispatcher owned the last PlaybackService, so the session winds down now
    if let Err(e) = session_task.await {
        warn!("Playback session ended abnormally: {:?}", e);
    }
    match tokio::time::timeout(Duration::from_secs(10), discord.disconnect()).await {
        Ok(Ok(())) => info!("Discord gateway closed."),
        Ok(Err(e)) => warn!("Discord disconnect failed: {:?}", e),
        Err(_) => warn!("Discord disconnect timed out."),
    }
    db.pool().close().await;
    Ok(())
}
