/// Keycap emojis used as menu selectors, in ordinal order.
pub const NUMBER_EMOJIS: [&str; 10] = [
    "1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣", "6️⃣", "7️⃣", "8️⃣", "9️⃣", "🔟",
];

/// Search menus only offer the first three selectors.
pub const SEARCH_EMOJIS: [&str; 3] = ["1️⃣", "2️⃣", "3️⃣"];

/// Maps a selector emoji to its 1-based ordinal.
pub fn ordinal_for_emoji(emoji: &str) -> Option<usize> {
    NUMBER_EMOJIS
        .iter()
        .position(|e| *e == emoji)
        .map(|idx| idx + 1)
}
