//! shellcache - manifest-driven resource caching for installable web apps.
//!
//! This library implements the caching logic of an application shell worker:
//! pre-fetch a core set of files when a new version is installed, upgrade the
//! cache in place when the resource manifest changes, and answer intercepted
//! requests from the cache so the application keeps working offline.
//!
//! # Example
//!
//! ```no_run
//! use shellcache::{CacheWorker, Request, ResourceManifest, WorkerConfig};
//!
//! # async fn example() -> shellcache::Result<()> {
//! // Parse the manifest generated alongside the application build
//! let manifest = ResourceManifest::from_json(r#"{"/": "abc123", "main.js": "def456"}"#)?;
//! let core = vec!["/".to_string(), "main.js".to_string()];
//!
//! // Create a worker serving https://app.example
//! let worker = CacheWorker::new(manifest, core, WorkerConfig::new("https://app.example"))?;
//!
//! // Install pre-fetches the core files, activation swaps them in
//! worker.install().await?;
//! worker.activate().await;
//!
//! // Intercepted requests are answered from the cache
//! let decision = worker.fetch(&Request::get("https://app.example/main.js")).await?;
//! # let _ = decision;
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod disk;
pub mod error;
pub mod events;
pub mod manifest;
pub mod net;
pub mod store;
pub mod url;
pub mod worker;

// Re-export main types for convenience
pub use config::{PartitionNames, WorkerConfig};
pub use disk::DiskStore;
pub use error::{Error, Result};
pub use events::{WorkerEvent, WorkerHandle, WorkerTask, spawn};
pub use manifest::{MANIFEST_KEY, ResourceManifest};
pub use net::{CacheMode, HttpNetwork, Network, Request, Response};
pub use store::{CacheStore, MemoryStore};
pub use worker::{CacheWorker, ClientControl, Command, FetchDecision, NoClients};
