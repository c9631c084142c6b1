//! RoomResolver - 房间号解析
//!
//! A device picks its room once: the first `resolve()` asks the
//! [`RoomPrompt`], stores the answer in the local settings and every later
//! call returns the stored value. Resolution never fails; settings errors
//! are logged and the value at hand is used.

pub mod settings;

pub use settings::{LocalSettings, SettingsStore};

use std::sync::Arc;

use shared::models::RoomId;

use crate::utils::AppResult;

/// Settings key holding the raw room id
pub const ROOM_KEY: &str = "moca_room_id_v1";

/// Interactive source of a room id
pub trait RoomPrompt: Send + Sync {
    /// `None` means cancelled
    fn ask(&self, suggestion: &RoomId) -> Option<String>;
}

impl<F> RoomPrompt for F
where
    F: Fn(&RoomId) -> Option<String> + Send + Sync,
{
    fn ask(&self, suggestion: &RoomId) -> Option<String> {
        self(suggestion)
    }
}

/// Always accepts the suggestion (headless clients)
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptDefault;

impl RoomPrompt for AcceptDefault {
    fn ask(&self, _suggestion: &RoomId) -> Option<String> {
        None
    }
}

pub struct RoomResolver {
    settings: Arc<dyn SettingsStore>,
    prompt: Arc<dyn RoomPrompt>,
    default_room: RoomId,
}

impl RoomResolver {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        prompt: Arc<dyn RoomPrompt>,
        default_room: RoomId,
    ) -> Self {
        Self {
            settings,
            prompt,
            default_room,
        }
    }

    /// Normalize raw input into a path-safe room id
    pub fn normalize(raw: &str) -> RoomId {
        RoomId::normalize(raw)
    }

    pub fn default_room(&self) -> &RoomId {
        &self.default_room
    }

    /// Stored room, without prompting
    pub fn current(&self) -> Option<RoomId> {
        match self.settings.get(ROOM_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => Some(RoomId::normalize(&raw)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Failed to read stored room id: {e}");
                None
            }
        }
    }

    /// Stored room, or ask once and remember the answer
    pub fn resolve(&self) -> RoomId {
        if let Some(room) = self.current() {
            return room;
        }

        let answer = self.prompt.ask(&self.default_room).unwrap_or_default();
        let raw = match answer.trim() {
            "" => self.default_room.as_str().to_string(),
            trimmed => trimmed.to_string(),
        };

        if let Err(e) = self.settings.set(ROOM_KEY, &raw) {
            tracing::warn!(room = %raw, "Failed to persist room id: {e}");
        }

        let room = RoomId::normalize(&raw);
        tracing::info!(room = %room, "Room resolved");
        room
    }

    /// Switch rooms explicitly
    pub fn set_room(&self, raw: &str) -> AppResult<RoomId> {
        let raw = match raw.trim() {
            "" => self.default_room.as_str(),
            trimmed => trimmed,
        };
        self.settings.set(ROOM_KEY, raw)?;
        let room = RoomId::normalize(raw);
        tracing::info!(room = %room, "Room switched");
        Ok(room)
    }
}
