// tunebot-core/src/services/media/transport.rs
//
// Opens a remote stream URL as raw PCM via an ffmpeg child process.

use std::process::{Command, Stdio};

use songbird::input::core::io::ReadOnlySource;
use songbird::input::{ChildContainer, Input, RawAdapter};

use crate::Error;

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u32 = 2;

/// ffmpeg arguments: bounded reconnects, audio only, interleaved f32le on stdout.
pub fn ffmpeg_args(stream_url: &str) -> Vec<String> {
    let rate = SAMPLE_RATE.to_string();
    let channels = CHANNELS.to_string();
    [
        "-reconnect", "1",
        "-reconnect_streamed", "1",
        "-reconnect_delay_max", "5",
        "-i", stream_url,
        "-vn",
        "-f", "f32le",
        "-ar", rate.as_str(),
        "-ac", channels.as_str(),
        "-loglevel", "error",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct FfmpegTransport {
    binary: String,
}

impl FfmpegTransport {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    /// Spawns ffmpeg for `stream_url` and wraps its stdout as a songbird input.
    pub fn open(&self, stream_url: &str) -> Result<Input, Error> {
        let child = Command::new(&self.binary)
            .args(ffmpeg_args(stream_url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Media(format!("could not start {}: {}", self.binary, e)))?;

        let source = RawAdapter::new(ReadOnlySource::new(ChildContainer::from(child)), SAMPLE_RATE, CHANNELS);
        Ok(source.into())
    }
}
