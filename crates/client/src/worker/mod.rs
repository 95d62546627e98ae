//! Offline asset cache manager.
//!
//! Implements the worker lifecycle against a [`CacheDb`] and a [`Network`]:
//!
//! ### Install
//! - Open (or create) the generation named by the configured cache name.
//! - Fetch every manifest URL concurrently; any failure or non-2xx status
//!   fails the whole install and nothing is written.
//! - Commit all entries in one transaction and request immediate takeover.
//!
//! ### Activate
//! - Delete every other generation, mark this one active, claim open clients.
//!
//! ### Fetch
//! - Bypass foreign origins and excluded URLs without touching the cache.
//! - Serve hits from the active generation without a network call. While
//!   this worker's generation is not active yet, its predecessor keeps serving.
//! - On a miss, forward a clone of the request and store a clone of any
//!   `200 basic` response into that same generation, in the background.
//! - With no active generation at all, pass requests through uncached.

pub mod clients;
pub mod policy;

use std::collections::HashSet;

use asha_core::{AppConfig, CacheDb, EntrySummary, Error, Generation, GenerationState, StoredEntry};
use futures_util::future::try_join_all;
use reqwest::Method;
use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use crate::fetch::{FetchRequest, FetchResponse, Network, resolve, strip_fragment};

pub use clients::{ClientId, ClientInfo, Clients};
pub use policy::{BypassReason, Scope};

/// Everything the manager needs to know about its deployment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin the worker is registered for.
    pub origin: Url,
    /// Version tag of the generation this worker installs and serves.
    pub cache_name: String,
    /// URLs to pre-cache; relative entries resolve against `origin`.
    pub manifest: Vec<String>,
    /// URL substrings that are never cached.
    pub exclude_patterns: Vec<String>,
}

impl WorkerConfig {
    pub fn new(origin: Url, cache_name: impl Into<String>) -> Self {
        Self { origin, cache_name: cache_name.into(), manifest: Vec::new(), exclude_patterns: Vec::new() }
    }

    pub fn with_manifest<S: Into<String>>(mut self, manifest: impl IntoIterator<Item = S>) -> Self {
        self.manifest = manifest.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self::new(origin, config.cache_name.clone())
            .with_manifest(config.manifest.iter().cloned())
            .with_exclude_patterns(config.exclude_patterns.iter().cloned()))
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub generation: String,
    pub state: GenerationState,
    pub entries: usize,
    /// Always true: the new generation asks to take over without waiting for
    /// existing clients to close.
    pub skip_waiting: bool,
}

/// Result of a successful activation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateOutcome {
    pub generation: String,
    /// Stale generations removed, oldest first.
    pub deleted: Vec<String>,
    /// Open clients whose controller changed.
    pub claimed: usize,
    /// Every open client after the claim.
    pub clients: Vec<ClientInfo>,
}

/// Where a fetch response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Out of scope; forwarded untouched.
    Bypass,
    /// Served from the active generation.
    Cache,
    /// Fetched from the network (and possibly being stored).
    Network,
}

/// Outcome of [`CacheManager::handle_fetch`].
#[derive(Debug)]
pub struct Handled {
    pub response: FetchResponse,
    pub source: ResponseSource,
    pub bypass: Option<BypassReason>,
    store: Option<JoinHandle<Result<(), Error>>>,
}

impl Handled {
    fn new(response: FetchResponse, source: ResponseSource) -> Self {
        Self { response, source, bypass: None, store: None }
    }

    /// Whether a background cache write was started for this response.
    pub fn is_storing(&self) -> bool {
        self.store.is_some()
    }

    /// Wait for the background cache write, if any, and report its result.
    ///
    /// The response is usable before this resolves; a store failure never
    /// invalidates it.
    pub async fn wait_until(&mut self) -> Result<(), Error> {
        match self.store.take() {
            Some(handle) => handle.await.map_err(|e| Error::StoreAborted(e.to_string()))?,
            None => Ok(()),
        }
    }
}

/// The offline asset cache manager.
pub struct CacheManager<N> {
    config: WorkerConfig,
    scope: Scope,
    db: CacheDb,
    network: N,
    clients: Clients,
}

impl<N: Network> CacheManager<N> {
    pub fn new(config: WorkerConfig, db: CacheDb, network: N) -> Self {
        let scope = Scope::new(config.origin.clone(), config.exclude_patterns.clone());
        Self { config, scope, db, network, clients: Clients::new() }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Populate the configured generation from the manifest.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` if a manifest entry cannot be resolved (nothing is opened)
    /// - `InstallFailed` if any manifest URL fails to fetch or returns non-2xx;
    ///   a generation created by this attempt is removed again
    /// - `Database` if the store rejects the commit
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        let generation = self.config.cache_name.as_str();
        let urls = self.manifest_urls()?;

        tracing::info!(generation, assets = urls.len(), "installing generation");

        let previous = self.db.open_generation(generation).await?;

        let entries = match try_join_all(urls.iter().map(|url| self.precache(url))).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(generation, error = %err, "install failed");
                if let Err(cleanup) = self.db.abandon_install(generation, previous).await {
                    tracing::warn!(generation, error = %cleanup, "failed to discard partial generation");
                }
                return Err(err);
            }
        };

        let count = entries.len();
        let state = self.db.complete_install(generation, entries).await?;

        tracing::info!(generation, entries = count, %state, "generation installed; requesting takeover");

        Ok(InstallOutcome { generation: generation.to_string(), state, entries: count, skip_waiting: true })
    }

    /// Make the configured generation the only one and claim open clients.
    ///
    /// # Errors
    ///
    /// - `UnknownGeneration` if it was never installed
    /// - `InvalidState` if its install never completed; nothing is deleted
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        let generation = self.config.cache_name.as_str();
        let deleted = self.db.activate_generation(generation).await?;
        for stale in &deleted {
            tracing::debug!(generation = %stale, "deleted stale generation");
        }

        let claimed = self.clients.claim(generation).await;
        let clients = self.clients.list().await;

        tracing::info!(generation, deleted = deleted.len(), claimed, "generation activated");

        Ok(ActivateOutcome { generation: generation.to_string(), deleted, claimed, clients })
    }

    /// Answer an intercepted request.
    ///
    /// `request` itself is never consumed; the network only ever sees a clone.
    ///
    /// # Errors
    ///
    /// Network failures are returned unchanged; no fallback response is made up.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<Handled, Error> {
        if let Some(reason) = self.scope.bypass_reason(&request.url) {
            tracing::debug!(url = %request.url, ?reason, "bypassing cache");
            let response = self.network.fetch(request.clone()).await?;
            let mut handled = Handled::new(response, ResponseSource::Bypass);
            handled.bypass = Some(reason);
            return Ok(handled);
        }

        // Until this worker's generation activates, the previous active one
        // keeps serving.
        let Some(generation) = self.serving_generation().await? else {
            tracing::debug!(url = %request.url, "no active generation; passing through");
            let response = self.network.fetch(request.clone()).await?;
            return Ok(Handled::new(response, ResponseSource::Network));
        };
        let generation = generation.as_str();

        let key_url = strip_fragment(&request.url);

        if request.is_cacheable_method()
            && let Some(entry) = self
                .db
                .match_entry(generation, request.method.as_str(), key_url.as_str())
                .await?
        {
            tracing::debug!(url = %key_url, "cache hit");
            return Ok(Handled::new(FetchResponse::from_entry(entry)?, ResponseSource::Cache));
        }

        tracing::debug!(method = %request.method, url = %key_url, "cache miss");

        let response = self.network.fetch(request.clone()).await.inspect_err(|err| {
            tracing::warn!(url = %key_url, error = %err, "fetch failed");
        })?;

        let mut handled = Handled::new(response, ResponseSource::Network);

        if handled.response.is_cacheable() && request.is_cacheable_method() {
            let entry = handled.response.to_entry(&request.method, &key_url);
            handled.store = Some(self.spawn_store(generation, entry));
        } else {
            tracing::debug!(
                url = %key_url,
                status = handled.response.status.as_u16(),
                response_type = handled.response.response_type.as_str(),
                "response not cached"
            );
        }

        Ok(handled)
    }

    /// Register an open page; it is controlled immediately by whichever
    /// generation is active.
    pub async fn register_client(&self, url: Url) -> Result<ClientId, Error> {
        let controller = self.serving_generation().await?;
        Ok(self.clients.register(url, controller).await)
    }

    /// State of this worker's own generation (`None` before install).
    pub async fn state(&self) -> Result<Option<GenerationState>, Error> {
        self.db.generation_state(&self.config.cache_name).await
    }

    /// Generation that answers cache lookups right now: this worker's once
    /// active, otherwise its predecessor.
    pub async fn serving_generation(&self) -> Result<Option<String>, Error> {
        self.db.active_generation().await
    }

    /// All stored generations.
    pub async fn status(&self) -> Result<Vec<Generation>, Error> {
        self.db.generations().await
    }

    /// Entries of `generation`, defaulting to this worker's own.
    pub async fn keys(&self, generation: Option<&str>) -> Result<Vec<EntrySummary>, Error> {
        self.db
            .entry_keys(generation.unwrap_or(&self.config.cache_name))
            .await
    }

    fn manifest_urls(&self) -> Result<Vec<Url>, Error> {
        let mut seen = HashSet::new();
        let mut urls = Vec::with_capacity(self.config.manifest.len());
        for raw in &self.config.manifest {
            let url = resolve(raw, &self.config.origin).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))?;
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
        Ok(urls)
    }

    async fn precache(&self, url: &Url) -> Result<StoredEntry, Error> {
        let failed = |reason: String| Error::InstallFailed { url: url.to_string(), reason };

        let response = self
            .network
            .fetch(FetchRequest::get(url.clone()))
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.ok() {
            return Err(failed(format!("status {}", response.status.as_u16())));
        }

        tracing::debug!(url = %url, bytes = response.body.len(), "precached");

        Ok(response.to_entry(&Method::GET, url))
    }

    fn spawn_store(&self, generation: &str, entry: StoredEntry) -> JoinHandle<Result<(), Error>> {
        let db = self.db.clone();
        let generation = generation.to_string();
        tokio::spawn(async move {
            let result = db.put_entry(&generation, &entry).await;
            match &result {
                Ok(()) => tracing::debug!(generation = %generation, url = %entry.url, "stored response"),
                Err(err) => {
                    tracing::warn!(generation = %generation, url = %entry.url, error = %err, "failed to store response")
                }
            }
            result
        })
    }
}
