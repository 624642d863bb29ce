//! The persisted playback snapshot.
//!
//! Stored as a single JSON object with camelCase keys:
//!
//! ```json
//! { "playlistId": "7", "songIndex": 2, "track": 2, "currentTime": 41.5, "volume": 0.6, "savedAt": 1718000000000 }
//! ```
//!
//! Reading is lenient about optional fields and strict about the two that
//! identify a position: `playlistId` must be present and non-empty and
//! `songIndex` must be a number. Anything else reads as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PlaybackError, Result};
use crate::models::{PlaylistId, Track};

/// What the player asks the store to persist. Missing fields take the
/// defaults: track 1, time 0, volume 1.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    pub playlist_id: PlaylistId,
    pub song_index: usize,
    pub track: Option<Track>,
    pub current_time: Option<f64>,
    pub volume: Option<f64>,
}

impl PlaybackState {
    pub fn new(playlist_id: impl Into<PlaylistId>, song_index: usize) -> Self {
        Self {
            playlist_id: playlist_id.into(),
            song_index,
            track: None,
            current_time: None,
            volume: None,
        }
    }

    pub fn track(mut self, track: Track) -> Self {
        self.track = Some(track);
        self
    }

    pub fn current_time(mut self, seconds: f64) -> Self {
        self.current_time = Some(seconds);
        self
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// A complete snapshot as written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub playlist_id: PlaylistId,
    pub song_index: usize,
    pub track: Track,
    /// Seconds into the track.
    pub current_time: f64,
    pub volume: f64,
    /// Milliseconds since the Unix epoch.
    pub saved_at: i64,
}

impl PlaybackSnapshot {
    /// Fill in defaults and stamp the save time.
    pub fn from_state(state: &PlaybackState, saved_at: i64) -> Self {
        Self {
            playlist_id: state.playlist_id.clone(),
            song_index: state.song_index,
            track: state.track.unwrap_or_default(),
            current_time: state.current_time.filter(|t| t.is_finite() && *t > 0.0).unwrap_or(0.0),
            volume: state.volume.filter(|v| v.is_finite()).unwrap_or(1.0),
            saved_at,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored value.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Validate and normalise a stored value.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| invalid("not a JSON object"))?;

        let playlist_id = match object.get("playlistId") {
            Some(Value::String(s)) if !s.is_empty() => PlaylistId::new(s.clone()),
            Some(Value::Number(n)) => PlaylistId::new(n.to_string()),
            _ => return Err(invalid("missing playlistId")),
        };

        let song_index = object
            .get("songIndex")
            .and_then(Value::as_f64)
            .filter(|i| i.is_finite() && *i >= 0.0)
            .ok_or_else(|| invalid("songIndex is not a non-negative number"))?
            .floor() as usize;

        let track = match object.get("track").and_then(Value::as_u64) {
            Some(2) => Track::Two,
            _ => Track::One,
        };

        let current_time = object
            .get("currentTime")
            .and_then(Value::as_f64)
            .filter(|t| t.is_finite() && *t > 0.0)
            .unwrap_or(0.0);

        let volume = object
            .get("volume")
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .unwrap_or(1.0);

        let saved_at = object.get("savedAt").and_then(Value::as_i64).unwrap_or(0);

        Ok(Self {
            playlist_id,
            song_index,
            track,
            current_time,
            volume,
            saved_at,
        })
    }

    /// Volume as applied to the audio output.
    pub fn clamped_volume(&self) -> f64 {
        self.volume.clamp(0.0, 1.0)
    }
}

fn invalid(reason: &str) -> PlaybackError {
    PlaybackError::InvalidSnapshot(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_applied() {
        let snapshot = PlaybackSnapshot::from_state(&PlaybackState::new("7", 0), 10);
        assert_eq!(snapshot.track, Track::One);
        assert_eq!(snapshot.current_time, 0.0);
        assert_eq!(snapshot.volume, 1.0);
        assert_eq!(snapshot.saved_at, 10);
    }

    #[test]
    fn test_zero_volume_is_kept() {
        let state = PlaybackState::new("7", 0).volume(0.0);
        assert_eq!(PlaybackSnapshot::from_state(&state, 0).volume, 0.0);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let state = PlaybackState::new("7", 2)
            .track(Track::Two)
            .current_time(41.5)
            .volume(0.6);
        let value: Value =
            serde_json::from_str(&PlaybackSnapshot::from_state(&state, 1_700_000_000_000).to_json().unwrap())
                .unwrap();

        assert_eq!(
            value,
            json!({
                "playlistId": "7",
                "songIndex": 2,
                "track": 2,
                "currentTime": 41.5,
                "volume": 0.6,
                "savedAt": 1_700_000_000_000i64
            })
        );
    }

    #[test]
    fn test_numeric_playlist_id_accepted() {
        let snapshot =
            PlaybackSnapshot::from_value(&json!({ "playlistId": 7, "songIndex": 1 })).unwrap();
        assert_eq!(snapshot.playlist_id, PlaylistId::from(7));
    }

    #[test]
    fn test_required_fields() {
        for value in [
            json!({ "track": 1 }),
            json!({ "playlistId": "7" }),
            json!({ "playlistId": "", "songIndex": 0 }),
            json!({ "playlistId": null, "songIndex": 0 }),
            json!({ "playlistId": "7", "songIndex": "2" }),
            json!({ "playlistId": "7", "songIndex": -1 }),
            json!([1, 2]),
        ] {
            assert!(
                matches!(
                    PlaybackSnapshot::from_value(&value),
                    Err(PlaybackError::InvalidSnapshot(_))
                ),
                "accepted {}",
                value
            );
        }
    }

    #[test]
    fn test_unparsable_json() {
        assert!(matches!(
            PlaybackSnapshot::from_json("{not json"),
            Err(PlaybackError::Serialization(_))
        ));
    }

    #[test]
    fn test_out_of_range_volume_clamped_on_apply() {
        let snapshot = PlaybackSnapshot::from_value(
            &json!({ "playlistId": "7", "songIndex": 0, "volume": 3.5 }),
        )
        .unwrap();
        assert_eq!(snapshot.clamped_volume(), 1.0);
    }
}
