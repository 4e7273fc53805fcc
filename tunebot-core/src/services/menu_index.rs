// tunebot-core/src/services/menu_index.rs

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::tasks::expiry::spawn_expiry;

/// What a menu message that members react to refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuRef {
    /// A search result menu; only `requester` may pick from it.
    Search { requester: String, search_id: String },
    /// A history page; position `n` in `search_ids` is selector `n + 1`.
    History { search_ids: Vec<String> },
}

/// Side table from a sent menu's message id to what the menu lists.
///
/// Entries live as long as the menu message itself and are then forgotten.
#[derive(Clone, Default)]
pub struct MenuIndex {
    menus: Arc<DashMap<u64, (MenuRef, Instant)>>,
}

impl MenuIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, message_id: u64, menu: MenuRef, ttl: Duration) {
        self.menus.insert(message_id, (menu, Instant::now() + ttl));
        let menus = Arc::clone(&self.menus);
        spawn_expiry(ttl, move || {
            menus.remove(&message_id);
        });
    }

    pub fn get(&self, message_id: u64) -> Option<MenuRef> {
        let entry = self.menus.get(&message_id)?;
        let (menu, expires_at) = entry.value();
        if Instant::now() >= *expires_at {
            return None;
        }
        Some(menu.clone())
    }

    pub fn len(&self) -> usize {
        self.menus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.menus.is_empty()
    }
}
