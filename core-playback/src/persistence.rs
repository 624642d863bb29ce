//! Timed saves of the playback snapshot.
//!
//! Two independent timers feed the same single-slot store:
//!
//! - a debounced save: each request cancels and replaces the pending one, so
//!   only the last state in a burst is written
//! - a periodic save while playing
//!
//! [`SaveScheduler::flush`] writes synchronously for teardown.
//!
//! Scheduling spawns onto the current tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use core_runtime::config::PlaybackConfig;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

use crate::snapshot::{PlaybackSnapshot, PlaybackState};
use crate::store::PlaybackStateStore;

/// Produces the state to persist on a periodic tick, or `None` to skip it.
pub type StateSource = Arc<dyn Fn() -> Option<PlaybackState> + Send + Sync>;

pub struct SaveScheduler {
    store: Arc<PlaybackStateStore>,
    debounce: Duration,
    interval: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl SaveScheduler {
    pub fn new(store: Arc<PlaybackStateStore>, config: &PlaybackConfig) -> Self {
        Self {
            store,
            debounce: config.save_debounce(),
            interval: config.periodic_save_interval(),
            pending: Mutex::new(None),
            periodic: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<PlaybackStateStore> {
        &self.store
    }

    /// Save `state` after the debounce delay unless another request comes
    /// first.
    pub fn schedule(&self, state: PlaybackState) {
        let store = Arc::clone(&self.store);
        let delay = self.debounce;
        let task = tokio::spawn(async move {
            time::sleep(delay).await;
            store.save(&state);
        });

        if let Some(previous) = self.pending.lock().replace(task) {
            trace!("Replacing pending playback save");
            previous.abort();
        }
    }

    /// Drop the pending debounced save, if any.
    pub fn cancel_pending(&self) {
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Write now, superseding any pending debounced save.
    pub fn flush(&self, state: &PlaybackState) -> Option<PlaybackSnapshot> {
        self.cancel_pending();
        self.store.save(state)
    }

    /// Save whatever `source` returns every interval until stopped. Starting
    /// again replaces the running timer.
    pub fn start_periodic(&self, source: StateSource) {
        let store = Arc::clone(&self.store);
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Some(state) = source() {
                    store.save(&state);
                }
            }
        });

        if let Some(previous) = self.periodic.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn stop_periodic(&self) {
        if let Some(task) = self.periodic.lock().take() {
            task.abort();
        }
    }

    pub fn is_periodic_running(&self) -> bool {
        self.periodic.lock().is_some()
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        self.cancel_pending();
        self.stop_periodic();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryLocalStorage;
    use bridge_traits::LocalStorage;

    fn scheduler() -> (Arc<MemoryLocalStorage>, SaveScheduler) {
        let storage = Arc::new(MemoryLocalStorage::new());
        let config = PlaybackConfig::default();
        let store = Arc::new(PlaybackStateStore::new(storage.clone(), &config));
        (storage, SaveScheduler::new(store, &config))
    }

    fn stored(storage: &MemoryLocalStorage) -> Option<String> {
        storage.get_item("aiamusic_playback_state").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounced_save_waits() {
        let (storage, scheduler) = scheduler();
        scheduler.schedule(PlaybackState::new("7", 1));

        time::sleep(Duration::from_millis(499)).await;
        assert!(stored(&storage).is_none());
        assert!(scheduler.has_pending());

        time::sleep(Duration::from_millis(2)).await;
        assert!(stored(&storage).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_supersedes_pending() {
        let (storage, scheduler) = scheduler();
        scheduler.schedule(PlaybackState::new("7", 1));
        scheduler.flush(&PlaybackState::new("7", 2));

        time::sleep(Duration::from_secs(1)).await;
        let snapshot = scheduler.store().get().unwrap();
        assert_eq!(snapshot.song_index, 2);
        assert!(stored(&storage).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_save() {
        let (_, scheduler) = scheduler();
        let ticks = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&ticks);

        scheduler.start_periodic(Arc::new(move || {
            let mut n = counter.lock();
            *n += 1;
            Some(PlaybackState::new("7", 0).current_time(*n as f64 * 5.0))
        }));

        time::sleep(Duration::from_millis(10_100)).await;
        assert_eq!(*ticks.lock(), 2);
        assert_eq!(scheduler.store().get().unwrap().current_time, 10.0);

        scheduler.stop_periodic();
        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(*ticks.lock(), 2);
    }
}
