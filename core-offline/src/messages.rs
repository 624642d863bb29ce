//! Control messages from the application to the worker.
//!
//! Messages cross the boundary as JSON objects `{ "type": ..., "payload": ... }`.
//! Unknown or malformed messages are ignored by the worker.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{OfflineError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Take control immediately instead of waiting for old clients to close.
    SkipWaiting,
    /// Pre-cache these audio URLs into the bounded audio namespace.
    CacheAudio {
        #[serde(deserialize_with = "audio_urls")]
        urls: Vec<String>,
    },
    /// Delete the audio namespace entirely.
    ClearAudioCache,
}

impl ControlMessage {
    /// Decode a message. `CACHE_AUDIO` without a `payload.urls` array is
    /// rejected.
    pub fn from_value(value: &Value) -> Result<Self> {
        Self::deserialize(value).map_err(|e| OfflineError::InvalidMessage(e.to_string()))
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| OfflineError::InvalidMessage(e.to_string()))
    }
}

/// Non-string and empty entries are dropped.
fn audio_urls<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<Value>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(url) if !url.trim().is_empty() => Some(url),
            _ => None,
        })
        .collect())
}
