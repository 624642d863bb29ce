//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, response
//! caches, local storage, clock) into the offline cache worker and the
//! playback state store. Desktop apps typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`); other hosts build a
//! [`CoreDependencies`] from their own adapters.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{CacheStorage, Clock, HttpClient, LocalStorage, SystemClock};
use core_offline::{OfflineWorker, WorkerHandle, WorkerState};
use core_playback::{PlaybackStateStore, PlayerSession};
use core_runtime::config::{CoreConfig, DeviceClass};
use core_runtime::events::{EventBus, EventStream};
use tokio::task::JoinHandle;
use tracing::info;

pub use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub cache_storage: Arc<dyn CacheStorage>,
    pub local_storage: Arc<dyn LocalStorage>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles, using the
    /// system clock.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        cache_storage: Arc<dyn CacheStorage>,
        local_storage: Arc<dyn LocalStorage>,
    ) -> Self {
        Self {
            http_client,
            cache_storage,
            local_storage,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    deps: Arc<CoreDependencies>,
    events: EventBus,
    worker: Arc<OfflineWorker>,
    playback_store: Arc<PlaybackStateStore>,
}

impl CoreService {
    /// Create a new service from the provided configuration and dependencies.
    pub fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        let events = EventBus::default();

        let worker = OfflineWorker::new(
            &config,
            Arc::clone(&deps.http_client),
            Arc::clone(&deps.cache_storage),
        )?
        .with_event_bus(events.clone());

        let playback_store =
            PlaybackStateStore::new(Arc::clone(&deps.local_storage), &config.playback)
                .with_clock(Arc::clone(&deps.clock))
                .with_event_bus(events.clone());

        Ok(Self {
            config: Arc::new(config),
            deps: Arc::new(deps),
            events,
            worker: Arc::new(worker),
            playback_store: Arc::new(playback_store),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Access the bridge dependencies being used by the service.
    pub fn dependencies(&self) -> Arc<CoreDependencies> {
        Arc::clone(&self.deps)
    }

    /// Subscribe to cache and playback events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn offline_worker(&self) -> Arc<OfflineWorker> {
        Arc::clone(&self.worker)
    }

    /// Install and activate the offline cache, then start its message loop.
    pub async fn start_offline(&self) -> Result<(WorkerHandle, JoinHandle<()>)> {
        let state = self.worker.start().await?;
        info!(
            version = %self.config.offline.cache_version,
            state = %state,
            "Offline cache worker started"
        );
        if state != WorkerState::Activated {
            info!("Offline cache worker waiting for skip-waiting");
        }
        Ok(self.worker.spawn())
    }

    pub fn playback_store(&self) -> Arc<PlaybackStateStore> {
        Arc::clone(&self.playback_store)
    }

    /// A player session persisting through this service's store.
    pub fn player_session(&self, device: DeviceClass) -> PlayerSession {
        PlayerSession::new(self.playback_store(), &self.config.playback, device)
            .with_event_bus(self.events.clone())
    }
}

/// Convenience bootstrapper for desktop hosts: reqwest for HTTP, in-memory
/// response caches, and a JSON file for local storage.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example() -> core_service::Result<()> {
/// use core_runtime::config::CoreConfig;
///
/// let core = core_service::bootstrap_desktop(CoreConfig::default(), "/tmp/aiamusic.json")?;
/// let (handle, _task) = core.start_offline().await?;
/// handle.cache_audio(["https://cdn.example/song.mp3"])?;
/// # Ok(())
/// # }
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub fn bootstrap_desktop(
    config: CoreConfig,
    local_storage_path: impl Into<std::path::PathBuf>,
) -> Result<CoreService> {
    use bridge_desktop::{FileLocalStorage, MemoryCacheStorage, ReqwestHttpClient};

    let http = ReqwestHttpClient::new()?;
    let local = FileLocalStorage::open(local_storage_path)?;
    let deps = CoreDependencies::new(
        Arc::new(http),
        Arc::new(MemoryCacheStorage::new()),
        Arc::new(local),
    );
    CoreService::new(config, deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::{MemoryCacheStorage, MemoryLocalStorage};
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse, ManualClock};
    use core_playback::PlaybackState;
    use core_runtime::events::{CoreEvent, PlaybackEvent};

    struct OfflineHttp;

    #[async_trait::async_trait]
    impl HttpClient for OfflineHttp {
        async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse> {
            Err(BridgeError::Network(format!("offline: {}", request.url)))
        }
    }

    fn service() -> CoreService {
        let deps = CoreDependencies::new(
            Arc::new(OfflineHttp),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(MemoryLocalStorage::new()),
        )
        .with_clock(Arc::new(ManualClock::new(42)));
        CoreService::new(CoreConfig::default(), deps).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CoreConfig::default();
        config.offline.max_audio_items = 0;
        let deps = CoreDependencies::new(
            Arc::new(OfflineHttp),
            Arc::new(MemoryCacheStorage::new()),
            Arc::new(MemoryLocalStorage::new()),
        );

        assert!(matches!(
            CoreService::new(config, deps),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_start_offline_fails_without_network() {
        let core = service();
        let err = core.start_offline().await.unwrap_err();
        assert!(matches!(err, CoreError::Offline(_)));
        assert_eq!(core.offline_worker().state(), WorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_playback_store_publishes_events() {
        let core = service();
        let mut events = core.subscribe();

        core.playback_store().save(&PlaybackState::new("7", 1));
        assert_eq!(core.playback_store().get().unwrap().saved_at, 42);

        let event = events.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Playback(PlaybackEvent::SnapshotSaved { song_index: 1, .. })
        ));
    }
}
