//! Single-slot durable store for the playback snapshot.

use std::sync::Arc;

use bridge_traits::{Clock, LocalStorage, SystemClock};
use core_runtime::config::PlaybackConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use tracing::{debug, warn};

use crate::snapshot::{PlaybackSnapshot, PlaybackState};

/// Reads and writes the playback snapshot.
///
/// Every operation is synchronous so it can run from a teardown handler.
/// None of them fail: unreadable snapshots are absent and failed writes are
/// logged.
pub struct PlaybackStateStore {
    storage: Arc<dyn LocalStorage>,
    clock: Arc<dyn Clock>,
    key: String,
    events: Option<EventBus>,
}

impl PlaybackStateStore {
    pub fn new(storage: Arc<dyn LocalStorage>, config: &PlaybackConfig) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            key: config.storage_key.clone(),
            events: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// The stored snapshot, if there is a valid one.
    pub fn get(&self) -> Option<PlaybackSnapshot> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!(key = %self.key, error = %error, "Failed to read playback state");
                return None;
            }
        };

        match PlaybackSnapshot::from_json(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                debug!(key = %self.key, error = %error, "Ignoring stored playback state");
                None
            }
        }
    }

    /// Overwrite the stored snapshot with `state`, stamped with the current
    /// time. Returns what was written, or `None` if the write failed.
    pub fn save(&self, state: &PlaybackState) -> Option<PlaybackSnapshot> {
        let snapshot = PlaybackSnapshot::from_state(state, self.clock.unix_timestamp_millis());
        let written = snapshot
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| {
                self.storage
                    .set_item(&self.key, &json)
                    .map_err(|e| e.to_string())
            });

        if let Err(error) = written {
            warn!(key = %self.key, error = %error, "Failed to save playback state");
            return None;
        }

        debug!(
            playlist_id = %snapshot.playlist_id,
            song_index = snapshot.song_index,
            current_time = snapshot.current_time,
            "Saved playback state"
        );
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Playback(PlaybackEvent::SnapshotSaved {
                playlist_id: snapshot.playlist_id.to_string(),
                song_index: snapshot.song_index,
                current_time: snapshot.current_time,
            }));
        }
        Some(snapshot)
    }

    /// Remove the stored snapshot.
    pub fn clear(&self) {
        if let Err(error) = self.storage.remove_item(&self.key) {
            warn!(key = %self.key, error = %error, "Failed to clear playback state");
        }
    }

    /// Whether a valid snapshot is stored.
    pub fn has_history(&self) -> bool {
        self.get().is_some()
    }
}
