use std::fmt;

/// Where the playback session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    /// Playing or paused: a stream is attached to the voice connection.
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLine {
    pub slot_index: usize,
    pub title: String,
    pub is_current: bool,
}

/// Snapshot of the upcoming part of the queue, built fresh on every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueView {
    Empty,
    Lines(Vec<QueueLine>),
}

impl QueueView {
    pub fn render(&self) -> String {
        match self {
            QueueView::Empty => "Queue empty".to_string(),
            QueueView::Lines(lines) => {
                let mut out = String::from("Playlist:\n");
                for line in lines {
                    if line.is_current {
                        out.push_str("► ");
                    }
                    out.push_str(&line.title);
                    out.push('\n');
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_marks_current_line() {
        let view = QueueView::Lines(vec![
            QueueLine { slot_index: 2, title: "C".into(), is_current: true },
            QueueLine { slot_index: 3, title: "D".into(), is_current: false },
        ]);
        assert_eq!(view.render(), "Playlist:\n► C\nD\n");
        assert_eq!(QueueView::Empty.render(), "Queue empty");
    }

    #[test]
    fn paused_counts_as_active() {
        assert!(PlaybackState::Paused.is_active());
        assert!(!PlaybackState::Idle.is_active());
        assert!(!PlaybackState::Paused.is_playing());
    }
}
