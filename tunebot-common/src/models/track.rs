use serde::{Deserialize, Serialize};

/// A search hit that has not been resolved to a playable stream yet.
///
/// Candidates are what the selection menus show; once a member picks one,
/// its watch URL is resolved and it becomes a [`Track`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub title: String,
    pub uploader_name: String,
    pub watch_url: String,
    #[serde(default)]
    pub age_restricted: bool,
}

impl Candidate {
    pub fn new(
        title: impl Into<String>,
        uploader_name: impl Into<String>,
        watch_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            uploader_name: uploader_name.into(),
            watch_url: watch_url.into(),
            age_restricted: false,
        }
    }

    /// Turns the candidate into a queueable [`Track`] once the stream URL is known.
    pub fn into_track(self, track_id: &str, added_by: &str, stream_url: String) -> Track {
        Track {
            track_id: track_id.to_string(),
            added_by: added_by.to_string(),
            uploader_name: self.uploader_name,
            title: self.title,
            stream_url,
            watch_url: self.watch_url,
        }
    }
}

/// A resolved, playable media item. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// The search id (or history id) the track was selected under.
    pub track_id: String,
    /// Display name of the member who picked it.
    pub added_by: String,
    pub uploader_name: String,
    pub title: String,
    /// Direct media URL; usually short-lived.
    pub stream_url: String,
    pub watch_url: String,
}
