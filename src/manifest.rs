//! Resource manifest produced by the application build step.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Key under which the active manifest JSON is stored in the manifest
/// partition.
pub const MANIFEST_KEY: &str = "manifest";

/// Mapping from resource path to content hash.
///
/// Paths are origin-relative without a leading slash, except for `"/"` which
/// denotes the application root document. Hashes are opaque strings; a
/// resource counts as changed between two manifests when its hash differs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest {
    resources: BTreeMap<String, String>,
}

impl ResourceManifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a manifest from its JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object mapping strings
    /// to strings.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a manifest from raw JSON bytes, as read back from a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a JSON object mapping strings
    /// to strings.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serializes the manifest to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Inserts a resource, returning the previously recorded hash if any.
    pub fn insert(&mut self, path: impl Into<String>, hash: impl Into<String>) -> Option<String> {
        self.resources.insert(path.into(), hash.into())
    }

    /// Returns the hash recorded for `path`.
    #[must_use]
    pub fn hash_for(&self, path: &str) -> Option<&str> {
        self.resources.get(path).map(String::as_str)
    }

    /// Returns true if the manifest lists `path`.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.resources.contains_key(path)
    }

    /// Iterates over resource paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    /// Iterates over `(path, hash)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.resources
            .iter()
            .map(|(path, hash)| (path.as_str(), hash.as_str()))
    }

    /// Number of resources listed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resources are listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl<P: Into<String>, H: Into<String>> FromIterator<(P, H)> for ResourceManifest {
    fn from_iter<T: IntoIterator<Item = (P, H)>>(iter: T) -> Self {
        Self {
            resources: iter
                .into_iter()
                .map(|(path, hash)| (path.into(), hash.into()))
                .collect(),
        }
    }
}
