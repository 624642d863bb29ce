//! # Event Bus System
//!
//! Typed notifications from the offline worker and the playback store, fanned
//! out over `tokio::sync::broadcast`.
//!
//! ```text
//! ┌───────────────┐   emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ OfflineWorker ├─────────>│           ├────────────>│ Subscriber │
//! └───────────────┘          │ EventBus  │             └────────────┘
//! ┌───────────────┐   emit   │           │  subscribe  ┌────────────┐
//! │ PlayerSession ├─────────>│           ├────────────>│ Subscriber │
//! └───────────────┘          └───────────┘             └────────────┘
//! ```
//!
//! Emitting never blocks and never fails the emitter: with no subscribers the
//! event is simply dropped. Slow subscribers receive `RecvError::Lagged` and
//! can keep reading.
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//! bus.emit(CoreEvent::Cache(CacheEvent::AudioCacheCleared)).ok();
//! assert_eq!(rx.try_recv().unwrap(), CoreEvent::Cache(CacheEvent::AudioCacheCleared));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Offline cache manager events
    Cache(CacheEvent),
    /// Playback state events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Cache(CacheEvent::InstallFailed { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::AudioPrecacheFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::Installed { .. })
            | CoreEvent::Cache(CacheEvent::Activated { .. })
            | CoreEvent::Playback(PlaybackEvent::RestorationCompleted { .. }) => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events emitted by the offline cache manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// The static namespace was pre-warmed for a new version.
    Installed { version: String, assets: usize },
    /// Pre-warming failed; the host should retry installation.
    InstallFailed { version: String, reason: String },
    /// Stale namespaces were purged and the version took control.
    Activated { version: String, purged: usize },
    /// A single stale namespace was deleted.
    NamespacePurged { name: String },
    /// A new audio entry was stored.
    AudioCached { url: String },
    /// An audio entry was evicted to respect the bound.
    AudioEvicted { url: String },
    /// A pre-cache request for a URL failed and was skipped.
    AudioPrecacheFailed { url: String, reason: String },
    /// The audio namespace was deleted.
    AudioCacheCleared,
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::Installed { .. } => "Offline cache installed",
            CacheEvent::InstallFailed { .. } => "Offline cache install failed",
            CacheEvent::Activated { .. } => "Offline cache activated",
            CacheEvent::NamespacePurged { .. } => "Stale cache namespace purged",
            CacheEvent::AudioCached { .. } => "Audio cached",
            CacheEvent::AudioEvicted { .. } => "Audio evicted",
            CacheEvent::AudioPrecacheFailed { .. } => "Audio pre-cache failed",
            CacheEvent::AudioCacheCleared => "Audio cache cleared",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback state store and player session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A snapshot was written to durable storage.
    SnapshotSaved {
        playlist_id: String,
        song_index: usize,
        current_time: f64,
    },
    /// A saved snapshot matched a loaded playlist; restoring.
    RestorationStarted { playlist_id: String },
    /// No usable snapshot; the player starts fresh.
    RestorationSkipped { reason: String },
    /// The saved position was applied.
    RestorationCompleted {
        playlist_id: String,
        song_index: usize,
        auto_play: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SnapshotSaved { .. } => "Playback snapshot saved",
            PlaybackEvent::RestorationStarted { .. } => "Playback restoration started",
            PlaybackEvent::RestorationSkipped { .. } => "Playback restoration skipped",
            PlaybackEvent::RestorationCompleted { .. } => "Playback restored",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let cache_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Cache(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next matching event.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Receives a matching event without waiting. `None` if nothing is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(10);
        assert!(bus
            .emit(CoreEvent::Cache(CacheEvent::AudioCacheCleared))
            .is_err());
    }

    #[tokio::test]
    async fn test_all_subscribers_receive() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = CoreEvent::Cache(CacheEvent::AudioEvicted {
            url: "https://cdn.example/1.mp3".to_string(),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_stream_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|e| matches!(e, CoreEvent::Playback(_)));

        bus.emit(CoreEvent::Cache(CacheEvent::AudioCacheCleared))
            .unwrap();
        bus.emit(CoreEvent::Playback(PlaybackEvent::RestorationSkipped {
            reason: "no snapshot".to_string(),
        }))
        .unwrap();

        let received = stream.recv().await.unwrap();
        assert!(matches!(
            received,
            CoreEvent::Playback(PlaybackEvent::RestorationSkipped { .. })
        ));
        assert!(stream.try_recv().is_none());
    }

    #[test]
    fn test_severity() {
        let failed = CoreEvent::Cache(CacheEvent::InstallFailed {
            version: "v4".to_string(),
            reason: "404".to_string(),
        });
        assert_eq!(failed.severity(), EventSeverity::Error);
        assert_eq!(failed.description(), "Offline cache install failed");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Cache(CacheEvent::NamespacePurged {
            name: "aiamusic-audio-v3".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Cache");
        assert_eq!(json["payload"]["event"], "NamespacePurged");
    }
}
