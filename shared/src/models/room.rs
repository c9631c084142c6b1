//! Room Model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Room used when nothing was entered
pub const DEFAULT_ROOM: &str = "moca-2026";

/// Characters that cannot appear in a storage path segment
const UNSAFE_CHARS: &[char] = &['/', '\\', '#', '[', ']', '.'];

/// Normalized room identifier
///
/// Every recipe, order and counter lives under `rooms/{room}/`. The value is
/// case-sensitive and always safe to use as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Normalize raw user input into a room id
    ///
    /// Trims, collapses whitespace runs into `-`, replaces path separators and
    /// brackets with `-`. Empty input yields [`DEFAULT_ROOM`].
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        let mut out = String::with_capacity(trimmed.len());
        let mut in_space = false;
        for ch in trimmed.chars() {
            if ch.is_whitespace() {
                if !in_space {
                    out.push('-');
                }
                in_space = true;
                continue;
            }
            in_space = false;
            if UNSAFE_CHARS.contains(&ch) {
                out.push('-');
            } else {
                out.push(ch);
            }
        }
        if out.is_empty() {
            return Self::default();
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(DEFAULT_ROOM.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RoomId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
