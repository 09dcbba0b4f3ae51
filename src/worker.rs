//! Core cache worker: lifecycle handlers and fetch strategies.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{StreamExt, stream};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::manifest::{MANIFEST_KEY, ResourceManifest};
use crate::net::{CacheMode, HttpNetwork, Network, Request, Response};
use crate::store::{CacheStore, MemoryStore};
use crate::url;

/// Trait for signaling lifecycle transitions to attached client pages.
///
/// Implement this trait to integrate with a host that tracks open pages.
/// All methods have default no-op implementations for convenience.
pub trait ClientControl: Send + Sync {
    /// Called when a newly installed worker should activate without waiting
    /// for the previous version to be released.
    fn skip_waiting(&self) {}

    /// Called when the activated worker takes control of open pages.
    fn claim(&self) {}
}

/// A null client control that ignores all signals.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClients;

impl ClientControl for NoClients {}

/// Commands recognized by the message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Activate a waiting installed worker immediately.
    SkipWaiting,
    /// Pre-fetch every manifest resource not yet cached.
    DownloadOffline,
}

impl Command {
    /// Parses a wire message into a command. Matching is exact.
    #[must_use]
    pub fn parse(message: &str) -> Option<Self> {
        match message {
            "skipWaiting" => Some(Self::SkipWaiting),
            "downloadOffline" => Some(Self::DownloadOffline),
            _ => None,
        }
    }
}

/// Outcome of the fetch handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchDecision {
    /// The request is not served from the cache; forward it upstream.
    Passthrough,
    /// Serve this response.
    Respond(Response),
}

/// Core worker that keeps an application shell available offline.
///
/// The worker owns three cache partitions: freshly installed resources land
/// in the temp partition, activation promotes them into the content
/// partition, and the manifest partition remembers which manifest the
/// content was built from so the next upgrade can diff against it.
pub struct CacheWorker<S: CacheStore = MemoryStore, N: Network = HttpNetwork> {
    manifest: ResourceManifest,
    core: Vec<String>,
    config: WorkerConfig,
    store: S,
    network: N,
    clients: Arc<dyn ClientControl>,
}

impl CacheWorker<MemoryStore, HttpNetwork> {
    /// Creates a worker over an in-memory store and a pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(manifest: ResourceManifest, core: Vec<String>, config: WorkerConfig) -> Result<Self> {
        Ok(Self::with_backends(
            manifest,
            core,
            config,
            MemoryStore::new(),
            HttpNetwork::new()?,
        ))
    }
}

impl<S: CacheStore, N: Network> CacheWorker<S, N> {
    /// Creates a worker with custom store and network implementations.
    #[must_use]
    pub fn with_backends(
        manifest: ResourceManifest,
        core: Vec<String>,
        config: WorkerConfig,
        store: S,
        network: N,
    ) -> Self {
        Self {
            manifest,
            core,
            config,
            store,
            network,
            clients: Arc::new(NoClients),
        }
    }

    /// Sets the client control used for lifecycle signals.
    #[must_use]
    pub fn with_clients(mut self, clients: Arc<dyn ClientControl>) -> Self {
        self.clients = clients;
        self
    }

    /// Returns a reference to the resource manifest.
    #[must_use]
    pub const fn manifest(&self) -> &ResourceManifest {
        &self.manifest
    }

    /// Returns a reference to the worker configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns a reference to the underlying cache store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns a reference to the underlying network.
    #[must_use]
    pub const fn network(&self) -> &N {
        &self.network
    }

    /// Handles the install lifecycle event.
    ///
    /// Signals readiness immediately, then fetches every core resource with
    /// cache-bypassing requests into the temp partition. The bulk fetch is
    /// all-or-nothing: nothing is stored unless every resource arrives with
    /// a success status.
    ///
    /// # Errors
    ///
    /// Returns an error if any core resource cannot be fetched.
    pub async fn install(&self) -> Result<()> {
        self.clients.skip_waiting();
        self.store.open(&self.config.partitions.temp).await?;
        let urls: Vec<String> = self
            .core
            .iter()
            .map(|path| url::resource_url(&self.config.origin, path))
            .collect();
        self.fetch_all_into(&self.config.partitions.temp, &urls, CacheMode::Reload)
            .await
    }

    /// Handles the activate lifecycle event.
    ///
    /// Promotes the temp partition into the content partition. When a
    /// manifest from a previous activation is stored, content entries whose
    /// resource disappeared or changed hash are evicted first and everything
    /// else is reused; otherwise the content partition is rebuilt from
    /// scratch. Finishes by persisting the current manifest and claiming
    /// open pages.
    ///
    /// Any failure mid-upgrade leaves the partitions untrustworthy, so it is
    /// answered by deleting all three and letting the next install cycle
    /// re-fetch everything. The event itself always completes.
    pub async fn activate(&self) {
        if let Err(err) = self.try_activate().await {
            log::error!("Cache upgrade failed, discarding all partitions: {err}");
            let partitions = &self.config.partitions;
            for partition in [&partitions.content, &partitions.temp, &partitions.manifest] {
                if let Err(err) = self.store.delete_partition(partition).await {
                    log::error!("Failed to discard partition {partition}: {err}");
                }
            }
        }
    }

    async fn try_activate(&self) -> Result<()> {
        let partitions = &self.config.partitions;
        self.store.open(&partitions.content).await?;
        self.store.open(&partitions.temp).await?;
        self.store.open(&partitions.manifest).await?;

        match self.store.get(&partitions.manifest, MANIFEST_KEY).await? {
            None => {
                // No prior manifest, so no entry can be trusted. Rebuild the
                // content partition from the freshly installed files.
                self.store.delete_partition(&partitions.content).await?;
                self.store.open(&partitions.content).await?;
            }
            Some(stored) => {
                let old = ResourceManifest::from_slice(&stored.body)?;
                self.evict_stale(&old).await?;
            }
        }
        self.promote_temp().await?;

        let manifest_json = self.manifest.to_json()?;
        self.store
            .put(
                &partitions.manifest,
                MANIFEST_KEY,
                Response::new(MANIFEST_KEY, 200, manifest_json),
            )
            .await?;
        self.clients.claim();
        Ok(())
    }

    /// Deletes content entries whose resource is gone from the current
    /// manifest or whose hash changed since `old`. Everything else stays and
    /// is reused without a refetch.
    async fn evict_stale(&self, old: &ResourceManifest) -> Result<()> {
        let partitions = &self.config.partitions;
        for stored_key in self.store.keys(&partitions.content).await? {
            let path = url::resource_key(&stored_key, &self.config.origin);
            let stale = path.as_deref().is_none_or(|path| {
                self.manifest.hash_for(path).is_none()
                    || self.manifest.hash_for(path) != old.hash_for(path)
            });
            if stale {
                self.store.delete(&partitions.content, &stored_key).await?;
            }
        }
        Ok(())
    }

    /// Copies every temp entry over the content partition, then drops temp.
    async fn promote_temp(&self) -> Result<()> {
        let partitions = &self.config.partitions;
        for key in self.store.keys(&partitions.temp).await? {
            if let Some(response) = self.store.get(&partitions.temp, &key).await? {
                self.store.put(&partitions.content, &key, response).await?;
            }
        }
        self.store.delete_partition(&partitions.temp).await?;
        Ok(())
    }

    /// Handles a fetch event.
    ///
    /// Only GET requests for resources listed in the manifest are served
    /// from the cache; everything else passes through untouched. The
    /// application root is served online-first, other resources cache-first
    /// with lazy populate.
    ///
    /// # Errors
    ///
    /// Returns an error when the resource can be served neither from the
    /// network nor from the cache.
    pub async fn fetch(&self, request: &Request) -> Result<FetchDecision> {
        if !request.is_get() {
            return Ok(FetchDecision::Passthrough);
        }
        let Some(key) =
            url::request_key(&request.url, &self.config.origin, &self.config.version_param)
        else {
            return Ok(FetchDecision::Passthrough);
        };
        if !self.manifest.contains(&key) {
            return Ok(FetchDecision::Passthrough);
        }
        if key == "/" {
            return self.online_first(request).await.map(FetchDecision::Respond);
        }
        self.cache_first(request).await.map(FetchDecision::Respond)
    }

    /// Returns the cached response, fetching and caching on a miss.
    ///
    /// Cache entries are keyed by the exact request URL. Only success
    /// responses are stored; an error or non-success response is handed back
    /// without touching the partition.
    async fn cache_first(&self, request: &Request) -> Result<Response> {
        let content = &self.config.partitions.content;
        if let Some(cached) = self.store.get(content, &request.url).await? {
            return Ok(cached);
        }
        let response = self.network.fetch(request).await?;
        if response.ok() {
            self.store.put(content, &request.url, response.clone()).await?;
        }
        Ok(response)
    }

    /// Fetches from the network first, falling back to the cache offline.
    ///
    /// A response that arrives is cached and returned whatever its status.
    /// On transport failure the cached copy is served; the network error
    /// propagates only when there is none.
    async fn online_first(&self, request: &Request) -> Result<Response> {
        let content = &self.config.partitions.content;
        match self.network.fetch(request).await {
            Ok(response) => {
                self.store.put(content, &request.url, response.clone()).await?;
                Ok(response)
            }
            Err(err) => match self.store.get(content, &request.url).await? {
                Some(cached) => Ok(cached),
                None => Err(err),
            },
        }
    }

    /// Handles a wire message from a client page.
    ///
    /// Unrecognized messages are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if a triggered background fill fails.
    pub async fn message(&self, message: &str) -> Result<()> {
        match Command::parse(message) {
            Some(Command::SkipWaiting) => {
                self.clients.skip_waiting();
                Ok(())
            }
            Some(Command::DownloadOffline) => self.fill_missing().await,
            None => {
                log::debug!("Ignoring unrecognized message: {message}");
                Ok(())
            }
        }
    }

    /// Fetches every manifest resource the content partition does not hold
    /// yet, making the full application available offline.
    ///
    /// Presence is judged by manifest key, so an already complete cache
    /// makes this a no-op. The bulk fetch shares install's all-or-nothing
    /// semantics.
    ///
    /// # Errors
    ///
    /// Returns an error if any missing resource cannot be fetched.
    pub async fn fill_missing(&self) -> Result<()> {
        let partitions = &self.config.partitions;
        let mut present = HashSet::new();
        for stored_key in self.store.keys(&partitions.content).await? {
            if let Some(path) = url::resource_key(&stored_key, &self.config.origin) {
                present.insert(path);
            }
        }
        let missing: Vec<String> = self
            .manifest
            .paths()
            .filter(|path| !present.contains(*path))
            .map(|path| url::resource_url(&self.config.origin, path))
            .collect();
        self.fetch_all_into(&partitions.content, &missing, CacheMode::Default)
            .await
    }

    /// Fetches every URL concurrently and stores the results in a partition.
    ///
    /// All fetches complete before anything is stored, so a failure leaves
    /// the partition untouched.
    async fn fetch_all_into(
        &self,
        partition: &str,
        urls: &[String],
        cache: CacheMode,
    ) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        // Owned items keep the closure argument lifetime-free; a closure
        // taking `&String` trips rustc's "implementation of `FnOnce` is not
        // general enough" false positive when the worker is driven from a
        // spawned generic event loop.
        let results: Vec<Result<Response>> = stream::iter(urls.iter().cloned())
            .map(|url| async move {
                let mut request = Request::get(url.clone());
                request.cache = cache;
                let response = self.network.fetch(&request).await?;
                if response.ok() {
                    Ok(response)
                } else {
                    Err(Error::Status {
                        url: url.clone(),
                        status: response.status,
                    })
                }
            })
            .buffer_unordered(self.config.concurrent_fetches)
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        for result in results {
            fetched.push(result?);
        }
        for response in fetched {
            let key = response.url.clone();
            self.store.put(partition, &key, response).await?;
        }
        Ok(())
    }
}
