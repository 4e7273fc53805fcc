// tunebot-core/src/services/search_registry.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use tunebot_common::models::track::Candidate;

use crate::tasks::expiry::spawn_expiry;

pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(30);
pub const MAX_CANDIDATES: usize = 3;

#[derive(Debug, Clone)]
struct PendingSearch {
    candidates: Vec<Candidate>,
    expires_at: Instant,
}

type RequesterSearches = HashMap<String, PendingSearch>;

/// Short-lived store of search results waiting for a reaction.
///
/// Keyed `requester -> search_id -> candidates`, so concurrent searches by
/// different members never see each other's menus. Every entry is dropped a
/// fixed TTL after it was registered; reads do not extend it.
#[derive(Clone)]
pub struct SearchRegistry {
    entries: Arc<DashMap<String, RequesterSearches>>,
    ttl: Duration,
}

impl Default for SearchRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_TTL)
    }
}

impl SearchRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores up to [`MAX_CANDIDATES`] candidates and returns the fresh search id.
    /// Must be called from inside a tokio runtime; the expiry timer is spawned here.
    pub fn register(&self, requester: &str, mut candidates: Vec<Candidate>) -> String {
        candidates.truncate(MAX_CANDIDATES);
        let search_id = Uuid::new_v4().to_string();

        self.entries
            .entry(requester.to_string())
            .or_default()
            .insert(
                search_id.clone(),
                PendingSearch {
                    candidates,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        debug!("{}: registered search {}", requester, search_id);

        let entries = Arc::clone(&self.entries);
        let requester = requester.to_string();
        let id = search_id.clone();
        spawn_expiry(self.ttl, move || remove_entry(&entries, &requester, &id));

        search_id
    }

    /// Candidate at 1-based `ordinal`, or `None` if the search expired, never
    /// existed, belongs to someone else, or has no such position.
    pub fn resolve(&self, requester: &str, search_id: &str, ordinal: usize) -> Option<Candidate> {
        if ordinal == 0 || ordinal > MAX_CANDIDATES {
            return None;
        }
        let per_requester = self.entries.get(requester)?;
        let pending = per_requester.get(search_id)?;
        if Instant::now() >= pending.expires_at {
            return None;
        }
        pending.candidates.get(ordinal - 1).cloned()
    }

    /// Number of live search ids held for `requester`.
    pub fn pending_for(&self, requester: &str) -> usize {
        self.entries.get(requester).map(|m| m.len()).unwrap_or(0)
    }
}

fn remove_entry(entries: &DashMap<String, RequesterSearches>, requester: &str, search_id: &str) {
    let now_empty = match entries.get_mut(requester) {
        Some(mut per_requester) => {
            if per_requester.remove(search_id).is_some() {
                debug!("Deleting expired search result with ID: {}, requested by {}", search_id, requester);
            }
            per_requester.is_empty()
        }
        None => return,
    };
    if now_empty {
        entries.remove_if(requester, |_, v| v.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(n: usize) -> Vec<Candidate> {
        (1..=n)
            .map(|i| Candidate::new(format!("Song {i}"), "Uploader", format!("https://yt/watch?v={i}")))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_by_one_based_ordinal() {
        let reg = SearchRegistry::default();
        let id = reg.register("alice", candidates(3));

        assert_eq!(reg.resolve("alice", &id, 1).unwrap().title, "Song 1");
        assert_eq!(reg.resolve("alice", &id, 3).unwrap().title, "Song 3");
        assert!(reg.resolve("alice", &id, 0).is_none());
        assert!(reg.resolve("alice", &id, 4).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_at_most_three_candidates() {
        let reg = SearchRegistry::default();
        let id = reg.register("alice", candidates(5));
        assert!(reg.resolve("alice", &id, 3).is_some());
        assert!(reg.resolve("alice", &id, 4).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn short_result_list_misses_high_ordinals() {
        let reg = SearchRegistry::default();
        let id = reg.register("alice", candidates(2));
        assert!(reg.resolve("alice", &id, 2).is_some());
        assert!(reg.resolve("alice", &id, 3).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn other_requesters_cannot_pick_from_a_menu() {
        let reg = SearchRegistry::default();
        let id = reg.register("alice", candidates(3));
        assert!(reg.resolve("bob", &id, 1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl_regardless_of_reads() {
        let reg = SearchRegistry::default();
        let id = reg.register("alice", candidates(3));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(reg.resolve("alice", &id, 1).is_some());

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(reg.resolve("alice", &id, 1).is_none());

        // let the timer task run and clean up
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(reg.pending_for("alice"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn several_searches_per_requester_coexist_until_expiry() {
        let reg = SearchRegistry::default();
        let first = reg.register("alice", candidates(3));
        tokio::time::sleep(Duration::from_secs(10)).await;
        let second = reg.register("alice", candidates(2));
        assert_eq!(reg.pending_for("alice"), 2);

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert!(reg.resolve("alice", &first, 1).is_none());
        assert!(reg.resolve("alice", &second, 1).is_some());
        assert_eq!(reg.pending_for("alice"), 1);
    }

    #[test]
    fn expiry_tolerates_missing_entries() {
        let entries: DashMap<String, RequesterSearches> = DashMap::new();
        remove_entry(&entries, "nobody", "nothing");
        assert!(entries.is_empty());
    }
}
