//! Persistent cache store backed by the local file system.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::error::{Error, Result};
use crate::net::Response;
use crate::store::CacheStore;

/// Sidecar metadata stored next to each cached body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    url: String,
    status: u16,
    content_type: Option<String>,
    stored_at: DateTime<Utc>,
}

/// Cache store that persists partitions as directories on disk.
///
/// Each entry is a pair of files named by the sha256 of its key: the raw
/// body, and a `.meta` JSON sidecar carrying the response attributes and the
/// original key. Writes land in a temporary file first and are renamed into
/// place. A corrupt or missing sidecar makes the entry invisible rather than
/// failing the read.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Creates a store rooted at the given directory.
    ///
    /// Partition names become directory names under the root, so they must
    /// be valid path components.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a store under the user cache directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform reports no user cache directory.
    pub fn at_user_cache_dir() -> Result<Self> {
        let base = dirs::cache_dir().ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no user cache directory",
            ))
        })?;
        Ok(Self::new(base.join("shellcache")))
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, partition: &str) -> PathBuf {
        self.root.join(partition)
    }

    fn entry_paths(&self, partition: &str, key: &str) -> (PathBuf, PathBuf) {
        let name = hash_key(key);
        let dir = self.partition_dir(partition);
        let meta = dir.join(format!("{name}.meta"));
        (dir.join(name), meta)
    }
}

/// Converts an arbitrary key to a filename-safe string.
fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    format!("{hash:x}")
}

async fn read_meta(path: &Path) -> Result<Option<EntryMeta>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    match serde_json::from_slice(&bytes) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) => {
            log::warn!("Unreadable cache sidecar {}: {err}", path.display());
            Ok(None)
        }
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, partition: &str) -> Result<()> {
        fs::create_dir_all(self.partition_dir(partition)).await?;
        Ok(())
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<Response>> {
        let (data_path, meta_path) = self.entry_paths(partition, key);
        let Some(meta) = read_meta(&meta_path).await? else {
            return Ok(None);
        };
        let body = match fs::read(&data_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(Response {
            url: meta.url,
            status: meta.status,
            content_type: meta.content_type,
            body: Bytes::from(body),
        }))
    }

    async fn put(&self, partition: &str, key: &str, response: Response) -> Result<()> {
        let dir = self.partition_dir(partition);
        fs::create_dir_all(&dir).await?;

        let (data_path, meta_path) = self.entry_paths(partition, key);
        let meta = EntryMeta {
            key: key.to_string(),
            url: response.url,
            status: response.status,
            content_type: response.content_type,
            stored_at: Utc::now(),
        };
        let meta_json = serde_json::to_vec(&meta)?;

        // Write both halves to temporaries, then rename into place so a
        // concurrent reader never observes a partial entry.
        let data_tmp = data_path.with_extension("body.tmp");
        let meta_tmp = data_path.with_extension("meta.tmp");

        if let Err(err) = write_pair(&data_tmp, &response.body, &meta_tmp, &meta_json).await {
            let _ = fs::remove_file(&data_tmp).await;
            let _ = fs::remove_file(&meta_tmp).await;
            return Err(err);
        }
        if let Err(err) = fs::rename(&data_tmp, &data_path).await {
            let _ = fs::remove_file(&data_tmp).await;
            let _ = fs::remove_file(&meta_tmp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&meta_tmp, &meta_path).await {
            let _ = fs::remove_file(&data_path).await;
            let _ = fs::remove_file(&meta_tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &str) -> Result<bool> {
        let (data_path, meta_path) = self.entry_paths(partition, key);
        let existed = match fs::remove_file(&data_path).await {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => false,
            Err(err) => return Err(err.into()),
        };
        match fs::remove_file(&meta_path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(existed)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(self.partition_dir(partition)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        // Keys are recovered from sidecars; the body filenames are hashes.
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "meta")
                && let Some(meta) = read_meta(&path).await?
            {
                keys.push(meta.key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool> {
        match fs::remove_dir_all(self.partition_dir(partition)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

async fn write_pair(
    data_path: &Path,
    data: &[u8],
    meta_path: &Path,
    meta: &[u8],
) -> Result<()> {
    fs::write(data_path, data).await?;
    fs::write(meta_path, meta).await?;
    Ok(())
}
