use async_trait::async_trait;
use mockall::automock;

use crate::error::Error;
use crate::models::track::Candidate;

/// A watch URL resolved down to something the audio transport can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub candidate: Candidate,
    pub stream_url: String,
}

#[automock]
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Top `limit` hits for free text, age-restricted results removed.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, Error>;

    /// Best audio-only stream for a watch URL, else the best progressive stream.
    async fn resolve(&self, watch_url: &str) -> Result<ResolvedMedia, Error>;

    /// Entries of a playlist URL, in playlist order.
    async fn playlist(&self, url: &str) -> Result<Vec<Candidate>, Error>;
}
