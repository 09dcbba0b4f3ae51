//! Configuration types for the cache worker.

/// Names of the three cache partitions used by a worker.
#[derive(Debug, Clone)]
pub struct PartitionNames {
    /// Partition that holds freshly installed resources until activation.
    pub temp: String,
    /// Partition that serves live content.
    pub content: String,
    /// Partition that holds the previously activated manifest.
    pub manifest: String,
}

impl Default for PartitionNames {
    fn default() -> Self {
        Self {
            temp: "shell-temp-cache".to_string(),
            content: "shell-app-cache".to_string(),
            manifest: "shell-app-manifest".to_string(),
        }
    }
}

/// Configuration for a cache worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Origin the worker serves, e.g. `https://example.com`. No trailing slash.
    pub origin: String,
    /// Cache partition names.
    pub partitions: PartitionNames,
    /// Query parameter treated as a cache-busting version tag.
    pub version_param: String,
    /// Number of concurrent resource fetches during install and fill.
    pub concurrent_fetches: usize,
}

impl WorkerConfig {
    /// Creates a configuration for the given origin with default values.
    ///
    /// A trailing slash on the origin is stripped.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            partitions: PartitionNames::default(),
            version_param: "v".to_string(),
            concurrent_fetches: 4,
        }
    }

    /// Sets the cache partition names.
    #[must_use]
    pub fn with_partitions(mut self, partitions: PartitionNames) -> Self {
        self.partitions = partitions;
        self
    }

    /// Sets the version query parameter name.
    #[must_use]
    pub fn with_version_param(mut self, param: impl Into<String>) -> Self {
        self.version_param = param.into();
        self
    }

    /// Sets the number of concurrent resource fetches.
    #[must_use]
    pub const fn with_concurrent_fetches(mut self, concurrent: usize) -> Self {
        self.concurrent_fetches = concurrent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = WorkerConfig::new("https://example.com");
        assert_eq!(config.origin, "https://example.com");
        assert_eq!(config.partitions.temp, "shell-temp-cache");
        assert_eq!(config.partitions.content, "shell-app-cache");
        assert_eq!(config.partitions.manifest, "shell-app-manifest");
        assert_eq!(config.version_param, "v");
        assert_eq!(config.concurrent_fetches, 4);
    }

    #[test]
    fn trailing_slash_stripped() {
        let config = WorkerConfig::new("https://example.com/");
        assert_eq!(config.origin, "https://example.com");
    }

    #[test]
    fn builder_pattern() {
        let partitions = PartitionNames {
            temp: "t".to_string(),
            content: "c".to_string(),
            manifest: "m".to_string(),
        };
        let config = WorkerConfig::new("https://example.com")
            .with_partitions(partitions)
            .with_version_param("rev")
            .with_concurrent_fetches(2);

        assert_eq!(config.partitions.content, "c");
        assert_eq!(config.version_param, "rev");
        assert_eq!(config.concurrent_fetches, 2);
    }
}
