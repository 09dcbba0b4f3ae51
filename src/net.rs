//! HTTP transport abstraction for resource fetches.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Cache directive attached to an outgoing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheMode {
    /// Allow intermediaries to answer from their caches.
    #[default]
    Default,
    /// Bypass intermediary caches and revalidate with the upstream server.
    Reload,
}

/// An outgoing resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method.
    pub method: reqwest::Method,
    /// Absolute request URL.
    pub url: String,
    /// Cache directive for intermediaries.
    pub cache: CacheMode,
}

impl Request {
    /// Creates a request with the given method.
    #[must_use]
    pub fn new(method: reqwest::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            cache: CacheMode::Default,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::GET, url)
    }

    /// Marks the request as bypassing intermediary caches.
    #[must_use]
    pub const fn with_reload(mut self) -> Self {
        self.cache = CacheMode::Reload;
        self
    }

    /// Returns true for GET requests.
    #[must_use]
    pub fn is_get(&self) -> bool {
        self.method == reqwest::Method::GET
    }
}

/// A fetched resource, also the unit stored in cache partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the resource was requested from.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Content type reported by the upstream server, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Bytes,
}

impl Response {
    /// Creates a response with the given status and body.
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Returns true for success (2xx) status codes.
    #[must_use]
    pub const fn ok(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Abstraction over the network for testability.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches a resource from the network.
    ///
    /// # Errors
    ///
    /// Returns an error only on transport failure. Responses with non-success
    /// status codes are returned as values; callers decide whether a status
    /// is acceptable.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Default network implementation backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    /// Builds a network with a connection-pooled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        if request.cache == CacheMode::Reload {
            builder = builder
                .header(reqwest::header::CACHE_CONTROL, "no-cache")
                .header(reqwest::header::PRAGMA, "no-cache");
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string);
        let body = response.bytes().await?;
        Ok(Response {
            url: request.url.clone(),
            status,
            content_type,
            body,
        })
    }
}
