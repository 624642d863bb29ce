//! The offline cache worker.
//!
//! [`OfflineWorker`] owns one deploy version of the cache: it installs and
//! activates that version, answers intercepted requests once in control, and
//! processes control messages from the application. [`WorkerHandle`] is the
//! application's side of the message channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bridge_traits::{Cache, CacheKey, CacheStorage, HttpClient, HttpRequest, HttpResponse};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::redact_url_query;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::classify::{RequestClassifier, Route, Strategy};
use crate::error::{OfflineError, Result};
use crate::eviction::AudioCacheBound;
use crate::lifecycle::{self, ActivateReport, InstallReport, WorkerState};
use crate::messages::ControlMessage;
use crate::namespace::{CacheKind, NamespaceSet};
use crate::strategy::{self, offline_audio_response, Served, ServedFrom};

/// Outcome of a `CACHE_AUDIO` request, one list entry per URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub cached: Vec<String>,
    /// Already present; not fetched again.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

pub struct OfflineWorker {
    origin: Url,
    namespaces: NamespaceSet,
    classifier: RequestClassifier,
    bound: AudioCacheBound,
    manifest: Vec<Url>,
    shell: CacheKey,
    http: Arc<dyn HttpClient>,
    caches: Arc<dyn CacheStorage>,
    events: Option<EventBus>,
    state: Mutex<WorkerState>,
    skip_waiting_on_install: bool,
    skip_waiting: AtomicBool,
}

impl OfflineWorker {
    pub fn new(
        config: &CoreConfig,
        http: Arc<dyn HttpClient>,
        caches: Arc<dyn CacheStorage>,
    ) -> Result<Self> {
        let origin = Url::parse(&config.origin).map_err(|e| OfflineError::InvalidRequest {
            url: config.origin.clone(),
            reason: e.to_string(),
        })?;
        let offline = &config.offline;
        let manifest = offline
            .precache_manifest
            .iter()
            .map(|path| resolve(&origin, path))
            .collect::<Result<Vec<_>>>()?;
        let shell = CacheKey::get(resolve(&origin, &offline.shell_document)?.as_str());

        Ok(Self {
            namespaces: NamespaceSet::new(offline.app_name.clone(), offline.cache_version.clone()),
            classifier: RequestClassifier::from_config(offline),
            bound: AudioCacheBound::new(offline.max_audio_items),
            origin,
            manifest,
            shell,
            http,
            caches,
            events: None,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting_on_install: true,
            skip_waiting: AtomicBool::new(false),
        })
    }

    /// Publish [`CacheEvent`]s on this bus.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// When `false`, an installed worker waits for `SKIP_WAITING` before it
    /// activates. Defaults to `true`.
    pub fn with_skip_waiting_on_install(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Whether this worker intercepts requests.
    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    pub fn namespaces(&self) -> &NamespaceSet {
        &self.namespaces
    }

    /// Install, then activate right away if skip-waiting was requested.
    pub async fn start(&self) -> Result<WorkerState> {
        self.install().await?;
        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate().await?;
        }
        Ok(self.state())
    }

    /// Pre-warm the static namespace. On failure the worker becomes
    /// redundant and install may be retried.
    #[instrument(skip(self), fields(version = %self.namespaces.version()))]
    pub async fn install(&self) -> Result<InstallReport> {
        self.transition("install", &[WorkerState::Parsed, WorkerState::Redundant], WorkerState::Installing)?;

        match lifecycle::install(
            self.http.as_ref(),
            self.caches.as_ref(),
            &self.namespaces,
            &self.manifest,
        )
        .await
        {
            Ok(report) => {
                *self.state.lock() = WorkerState::Installed;
                if self.skip_waiting_on_install {
                    self.skip_waiting.store(true, Ordering::SeqCst);
                }
                self.emit(CacheEvent::Installed {
                    version: report.version.clone(),
                    assets: report.assets,
                });
                Ok(report)
            }
            Err(error) => {
                *self.state.lock() = WorkerState::Redundant;
                warn!(error = %error, "Offline cache install failed");
                self.emit(CacheEvent::InstallFailed {
                    version: self.namespaces.version().to_string(),
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Purge stale namespaces and take control.
    #[instrument(skip(self), fields(version = %self.namespaces.version()))]
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.transition("activate", &[WorkerState::Installed], WorkerState::Activating)?;

        match lifecycle::activate(self.caches.as_ref(), &self.namespaces).await {
            Ok(report) => {
                for name in &report.purged {
                    self.emit(CacheEvent::NamespacePurged { name: name.clone() });
                }
                *self.state.lock() = WorkerState::Activated;
                self.emit(CacheEvent::Activated {
                    version: report.version.clone(),
                    purged: report.purged.len(),
                });
                Ok(report)
            }
            Err(error) => {
                *self.state.lock() = WorkerState::Installed;
                Err(error)
            }
        }
    }

    /// Request immediate activation. Activates now if already installed;
    /// otherwise activation follows the next successful install.
    pub async fn skip_waiting(&self) -> Result<()> {
        self.skip_waiting.store(true, Ordering::SeqCst);
        if self.state() == WorkerState::Installed {
            self.activate().await?;
        }
        Ok(())
    }

    /// How a request would be handled. Unresolvable URLs pass through.
    pub fn route(&self, request: &HttpRequest) -> Route {
        match self.origin.join(&request.url) {
            Ok(url) if self.is_controlling() => self.classifier.classify(request.method, &url),
            _ => Route::Passthrough,
        }
    }

    /// Answer an intercepted request.
    ///
    /// An `Err` means neither the network nor the cache could answer, which
    /// the page sees as a network error. Audio requests never fail.
    pub async fn handle_fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.serve(request).await.map(|served| served.response)
    }

    /// Like [`handle_fetch`](Self::handle_fetch), reporting where the
    /// response came from.
    #[instrument(skip(self, request), fields(url = %redact_url_query(&request.url)))]
    pub async fn serve(&self, mut request: HttpRequest) -> Result<Served> {
        let route = self.route(&request);
        if let Ok(url) = self.origin.join(&request.url) {
            request.url = url.into();
        }

        let (strategy, kind) = match route {
            Route::Passthrough => return self.passthrough(request).await,
            Route::Handle { strategy, kind } => (strategy, kind),
        };

        let cache = match self.open(kind).await {
            Ok(cache) => cache,
            Err(error) => {
                warn!(error = %error, "Cache unavailable, going to network");
                return match strategy {
                    Strategy::CacheFirstWithEviction => Ok(self.passthrough_audio(request).await),
                    _ => self.passthrough(request).await,
                };
            }
        };

        match strategy {
            Strategy::CacheFirst => {
                strategy::cache_first(
                    self.http.as_ref(),
                    cache.as_ref(),
                    request,
                    Some(&self.shell),
                )
                .await
            }
            Strategy::NetworkFirst => {
                strategy::network_first(self.http.as_ref(), cache.as_ref(), request).await
            }
            Strategy::CacheFirstWithEviction => {
                let url = request.url.clone();
                let served = strategy::cache_first_with_eviction(
                    self.http.as_ref(),
                    cache.as_ref(),
                    &self.bound,
                    request,
                )
                .await;
                self.report_audio_insert(&url, &served);
                Ok(served)
            }
        }
    }

    /// Process one control message. Malformed messages are ignored.
    pub async fn handle_message(&self, message: &Value) {
        let message = match ControlMessage::from_value(message) {
            Ok(message) => message,
            Err(error) => {
                debug!(error = %error, "Ignoring control message");
                return;
            }
        };

        match message {
            ControlMessage::SkipWaiting => {
                if let Err(error) = self.skip_waiting().await {
                    warn!(error = %error, "Skip-waiting failed");
                }
            }
            ControlMessage::CacheAudio { urls } => {
                self.precache_audio(&urls).await;
            }
            ControlMessage::ClearAudioCache => {
                if let Err(error) = self.clear_audio_cache().await {
                    warn!(error = %error, "Failed to clear audio cache");
                }
            }
        }
    }

    /// Fetch and store audio URLs that are not cached yet. Each URL is
    /// independent; failures are logged and skipped. Blank URLs are ignored.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn precache_audio(&self, urls: &[String]) -> PrecacheReport {
        let mut report = PrecacheReport::default();
        let cache = match self.open(CacheKind::Audio).await {
            Ok(cache) => cache,
            Err(error) => {
                warn!(error = %error, "Audio cache unavailable, skipping pre-cache");
                report.failed.extend(urls.iter().cloned());
                return report;
            }
        };

        for raw in urls.iter().filter(|raw| !raw.trim().is_empty()) {
            match self.precache_one(cache.as_ref(), raw).await {
                Ok(true) => report.cached.push(raw.clone()),
                Ok(false) => report.skipped.push(raw.clone()),
                Err(error) => {
                    warn!(url = %redact_url_query(raw), error = %error, "Audio pre-cache failed");
                    self.emit(CacheEvent::AudioPrecacheFailed {
                        url: redact_url_query(raw),
                        reason: error.to_string(),
                    });
                    report.failed.push(raw.clone());
                }
            }
        }

        info!(
            cached = report.cached.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Audio pre-cache finished"
        );
        report
    }

    /// Delete the audio namespace. The next audio insert starts from empty.
    pub async fn clear_audio_cache(&self) -> Result<bool> {
        let deleted = self
            .caches
            .delete(&self.namespaces.get(CacheKind::Audio).name())
            .await?;
        info!(deleted, "Audio cache cleared");
        self.emit(CacheEvent::AudioCacheCleared);
        Ok(deleted)
    }

    /// Start the message loop on the current runtime.
    pub fn spawn(self: &Arc<Self>) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Arc::clone(self);
        let task = tokio::spawn(async move { worker.run(rx).await });
        (WorkerHandle { tx }, task)
    }

    /// Process messages until every [`WorkerHandle`] is dropped.
    pub async fn run(&self, mut rx: mpsc::UnboundedReceiver<Value>) {
        while let Some(message) = rx.recv().await {
            self.handle_message(&message).await;
        }
        debug!("Worker message loop stopped");
    }

    async fn precache_one(&self, cache: &dyn Cache, raw: &str) -> Result<bool> {
        let url = resolve(&self.origin, raw)?;
        let key = CacheKey::get(url.as_str());
        if cache.match_key(&key).await?.is_some() {
            return Ok(false);
        }

        let response = self
            .http
            .execute(HttpRequest::get(url.as_str()))
            .await
            .map_err(|source| OfflineError::Network {
                url: url.to_string(),
                source,
            })?;
        if !response.is_success() {
            return Err(OfflineError::Network {
                url: url.to_string(),
                source: bridge_traits::BridgeError::Network(format!("HTTP {}", response.status)),
            });
        }

        let evicted = self.bound.insert(cache, key, response).await?;
        self.report_insert(url.as_str(), &evicted);
        Ok(true)
    }

    async fn open(&self, kind: CacheKind) -> Result<Arc<dyn Cache>> {
        Ok(self.caches.open(&self.namespaces.get(kind).name()).await?)
    }

    async fn passthrough(&self, request: HttpRequest) -> Result<Served> {
        let url = request.url.clone();
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|source| OfflineError::Network { url, source })?;
        Ok(Served {
            response,
            from: ServedFrom::Network,
            stored: false,
            evicted: Vec::new(),
        })
    }

    async fn passthrough_audio(&self, request: HttpRequest) -> Served {
        self.passthrough(request).await.unwrap_or_else(|_| Served {
            response: offline_audio_response(),
            from: ServedFrom::Fallback,
            stored: false,
            evicted: Vec::new(),
        })
    }

    fn report_audio_insert(&self, url: &str, served: &Served) {
        if served.stored {
            self.report_insert(url, &served.evicted);
        }
    }

    fn report_insert(&self, url: &str, evicted: &[CacheKey]) {
        for key in evicted {
            self.emit(CacheEvent::AudioEvicted {
                url: redact_url_query(&key.url),
            });
        }
        self.emit(CacheEvent::AudioCached {
            url: redact_url_query(url),
        });
    }

    fn transition(&self, action: &'static str, from: &[WorkerState], to: WorkerState) -> Result<()> {
        let mut state = self.state.lock();
        if !from.contains(&*state) {
            return Err(OfflineError::InvalidState {
                action,
                state: (*state).to_string(),
            });
        }
        *state = to;
        Ok(())
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(bus) = &self.events {
            // No subscribers is fine.
            let _ = bus.emit(CoreEvent::Cache(event));
        }
    }
}

/// Application side of the worker's message channel.
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<Value>,
}

impl WorkerHandle {
    /// Post a raw JSON message, as a page would.
    pub fn post_raw(&self, message: Value) -> Result<()> {
        self.tx.send(message).map_err(|_| OfflineError::ChannelClosed)
    }

    pub fn post(&self, message: &ControlMessage) -> Result<()> {
        self.post_raw(message.to_value()?)
    }

    pub fn skip_waiting(&self) -> Result<()> {
        self.post(&ControlMessage::SkipWaiting)
    }

    pub fn cache_audio<I, S>(&self, urls: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post(&ControlMessage::CacheAudio {
            urls: urls.into_iter().map(Into::into).collect(),
        })
    }

    pub fn clear_audio_cache(&self) -> Result<()> {
        self.post(&ControlMessage::ClearAudioCache)
    }
}

fn resolve(origin: &Url, raw: &str) -> Result<Url> {
    origin.join(raw).map_err(|e| OfflineError::InvalidRequest {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}
