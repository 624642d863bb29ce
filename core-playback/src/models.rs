//! Playlist data as delivered by the REST API.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PlaybackError;

/// Playlist identifier.
///
/// The API sends numeric ids while persisted snapshots may carry strings;
/// both are normalised to their string form so `7` and `"7"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PlaylistId(String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PlaylistId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for PlaylistId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for PlaylistId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => PlaylistId(s),
            Raw::Number(n) => PlaylistId(n.to_string()),
        })
    }
}

/// One of the two renditions every generated song has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Track {
    #[default]
    One,
    Two,
}

impl Track {
    pub fn number(self) -> u8 {
        match self {
            Track::One => 1,
            Track::Two => 2,
        }
    }
}

impl TryFrom<u8> for Track {
    type Error = PlaybackError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Track::One),
            2 => Ok(Track::Two),
            other => Err(PlaybackError::InvalidTrack(other)),
        }
    }
}

impl From<Track> for u8 {
    fn from(track: Track) -> Self {
        track.number()
    }
}

/// Entry of the playlist list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    #[serde(default)]
    pub name: String,
}

/// A playlist with its ordered songs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDetail {
    pub id: PlaylistId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub songs: Vec<Song>,
}

impl PlaylistDetail {
    pub fn song(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}

/// A song with up to two renditions. The archived copy is preferred over the
/// generator's download link, which may expire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Song {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub archived_url_1: Option<String>,
    #[serde(default)]
    pub download_url_1: Option<String>,
    #[serde(default)]
    pub archived_url_2: Option<String>,
    #[serde(default)]
    pub download_url_2: Option<String>,
}

impl Song {
    /// Playable URL for a rendition, if any.
    pub fn audio_url(&self, track: Track) -> Option<&str> {
        let (archived, download) = match track {
            Track::One => (&self.archived_url_1, &self.download_url_1),
            Track::Two => (&self.archived_url_2, &self.download_url_2),
        };
        non_empty(archived).or_else(|| non_empty(download))
    }

    pub fn has_track(&self, track: Track) -> bool {
        self.audio_url(track).is_some()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_id_accepts_numbers_and_strings() {
        let from_number: PlaylistId = serde_json::from_str("7").unwrap();
        let from_string: PlaylistId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(serde_json::to_string(&from_number).unwrap(), "\"7\"");
    }

    #[test]
    fn test_track_serde() {
        assert_eq!(serde_json::to_string(&Track::Two).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Track>("1").unwrap(), Track::One);
        assert!(serde_json::from_str::<Track>("3").is_err());
        assert!(matches!(Track::try_from(0), Err(PlaybackError::InvalidTrack(0))));
    }

    #[test]
    fn test_audio_url_prefers_archive() {
        let song = Song {
            archived_url_1: Some("https://x.blob.core.windows.net/1.mp3".into()),
            download_url_1: Some("https://cdn1.suno.ai/1.mp3".into()),
            archived_url_2: Some(String::new()),
            download_url_2: Some("https://cdn1.suno.ai/2.mp3".into()),
            ..Song::default()
        };

        assert_eq!(
            song.audio_url(Track::One),
            Some("https://x.blob.core.windows.net/1.mp3")
        );
        assert_eq!(song.audio_url(Track::Two), Some("https://cdn1.suno.ai/2.mp3"));
        assert!(!Song::default().has_track(Track::One));
    }

    #[test]
    fn test_playlist_detail_from_api() {
        let detail: PlaylistDetail = serde_json::from_str(
            r#"{"id": 3, "name": "Demos", "songs": [{"id": 1, "title": "A", "download_url_1": "https://cdn/a.mp3"}]}"#,
        )
        .unwrap();
        assert_eq!(detail.id, PlaylistId::from(3));
        assert_eq!(detail.len(), 1);
        assert_eq!(detail.song(0).unwrap().audio_url(Track::One), Some("https://cdn/a.mp3"));
    }
}
