// tunebot-core/src/services/media/ytdlp.rs
//
// MediaResolver backed by the yt-dlp command line tool. Every call spawns one
// yt-dlp process and parses its JSON output. User text always goes after `--`.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use tunebot_common::models::track::Candidate;
use tunebot_common::traits::{MediaResolver, ResolvedMedia};

use crate::Error;

/// yt-dlp's per-video JSON, reduced to the fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// Flat playlist entries only carry `url`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub age_limit: Option<u32>,
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamFormat {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    /// Audio bitrate in kbit/s.
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PlaylistInfo {
    #[serde(default)]
    entries: Vec<VideoInfo>,
}

fn has_codec(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if c != "none")
}

impl StreamFormat {
    pub fn is_audio_only(&self) -> bool {
        has_codec(&self.acodec) && !has_codec(&self.vcodec)
    }

    pub fn is_progressive(&self) -> bool {
        has_codec(&self.acodec) && has_codec(&self.vcodec)
    }
}

/// Highest-bitrate audio-only stream; without one, the tallest progressive stream.
pub fn select_stream(formats: &[StreamFormat]) -> Option<&StreamFormat> {
    let with_url = || formats.iter().filter(|f| f.url.is_some());

    let best_audio = with_url()
        .filter(|f| f.is_audio_only())
        .max_by(|a, b| a.abr.unwrap_or(0.0).total_cmp(&b.abr.unwrap_or(0.0)));
    if best_audio.is_some() {
        return best_audio;
    }

    with_url()
        .filter(|f| f.is_progressive())
        .max_by_key(|f| f.height.unwrap_or(0))
}

impl VideoInfo {
    fn watch_url(&self) -> Option<String> {
        if let Some(u) = &self.webpage_url {
            return Some(u.clone());
        }
        match (&self.url, &self.id) {
            (Some(u), _) if u.starts_with("http") => Some(u.clone()),
            (_, Some(id)) => Some(format!("https://www.youtube.com/watch?v={}", id)),
            _ => None,
        }
    }

    pub fn to_candidate(&self) -> Option<Candidate> {
        let watch_url = self.watch_url()?;
        let title = self.title.clone().unwrap_or_else(|| watch_url.clone());
        let uploader = self
            .uploader
            .clone()
            .or_else(|| self.channel.clone())
            .unwrap_or_else(|| "Unknown".to_string());
        let mut candidate = Candidate::new(title, uploader, watch_url);
        candidate.age_restricted = self.age_limit.unwrap_or(0) > 0;
        Some(candidate)
    }
}

/// Parses yt-dlp's `--dump-json` output: one JSON document per line.
pub fn parse_json_lines(stdout: &str) -> Result<Vec<VideoInfo>, Error> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str::<VideoInfo>(l).map_err(Error::from))
        .collect()
}

#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    binary: String,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<String, Error> {
        debug!("{} {}", self.binary, args.join(" "));
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Media(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, Error> {
        let target = format!("ytsearch{}:{}", limit, query);
        let stdout = self
            .run(&["--dump-json", "--skip-download", "--no-warnings", "--", target.as_str()])
            .await?;

        let candidates: Vec<Candidate> = parse_json_lines(&stdout)?
            .iter()
            .filter_map(VideoInfo::to_candidate)
            .filter(|c| !c.age_restricted)
            .take(limit)
            .collect();
        Ok(candidates)
    }

    async fn resolve(&self, watch_url: &str) -> Result<ResolvedMedia, Error> {
        let stdout = self
            .run(&["--dump-single-json", "--no-playlist", "--no-warnings", "--", watch_url])
            .await?;
        let info: VideoInfo = serde_json::from_str(stdout.trim())?;

        let stream = select_stream(&info.formats)
            .and_then(|f| f.url.clone())
            .ok_or_else(|| Error::Media(format!("no playable stream for {}", watch_url)))?;
        if info.formats.iter().any(StreamFormat::is_audio_only) {
            debug!("{}: found audio only stream", watch_url);
        } else {
            debug!("{}: no audio only stream, using progressive stream", watch_url);
        }

        let mut candidate = info
            .to_candidate()
            .ok_or_else(|| Error::Media(format!("yt-dlp returned no url for {}", watch_url)))?;
        candidate.watch_url = watch_url.to_string();
        Ok(ResolvedMedia { candidate, stream_url: stream })
    }

    async fn playlist(&self, url: &str) -> Result<Vec<Candidate>, Error> {
        let stdout = self
            .run(&["--flat-playlist", "--dump-single-json", "--no-warnings", "--", url])
            .await?;
        let info: PlaylistInfo = serde_json::from_str(stdout.trim())?;

        let total = info.entries.len();
        let entries: Vec<Candidate> = info.entries.iter().filter_map(VideoInfo::to_candidate).collect();
        if entries.len() < total {
            warn!("{}: {} playlist entries had no url", url, total - entries.len());
        }
        Ok(entries)
    }
}
