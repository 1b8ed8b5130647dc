//! Network fetch pipeline.
//!
//! ### Request descriptors
//! - Method + absolute URL (fragment removed) + request headers
//! - Relative paths resolve against the worker origin (see [`url::resolve`])
//!
//! ### Live fetches
//! - `Fetcher` is the seam between the worker and the network
//! - `HttpFetcher` performs the request with reqwest (rustls, compressed bodies)
//! - Max redirects: 5 (configurable)
//! - Body size is unlimited unless the request sets `max_bytes`; only the
//!   install handler sets it
//! - Non-success statuses are responses, not errors; only transport
//!   failures become `Err`

pub mod url;

use ::url::Url;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode, header};
use std::time::{Duration, Instant};

pub use self::url::{Scope, UrlError, resolve};

use taximoto_core::{AppConfig, CacheEntry, Error};

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "taximoto-sw/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "taximoto-sw/0.1".to_string(),
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            max_redirects: config.max_redirects,
        }
    }
}

/// An intercepted request descriptor.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: header::HeaderMap,
    /// Largest response body accepted, in bytes. None means no limit.
    pub max_bytes: Option<usize>,
}

impl FetchRequest {
    /// A GET request without extra headers.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, headers: header::HeaderMap::new(), max_bytes: None }
    }

    /// A request with the given method name (e.g. "POST").
    pub fn with_method(method: &str, url: Url) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid HTTP method: {method}")))?;
        Ok(Self { method, url, headers: header::HeaderMap::new(), max_bytes: None })
    }

    /// Reject responses whose body exceeds `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Fail with `FetchTooLarge` when `len` exceeds this request's limit.
    pub fn check_size(&self, len: usize) -> Result<(), Error> {
        match self.max_bytes {
            Some(limit) if len > limit => {
                Err(Error::FetchTooLarge(format!("{}: {len} bytes exceeds {limit}", self.url)))
            }
            _ => Ok(()),
        }
    }
}

/// Response from a fetch, live or cached.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Response headers
    pub headers: header::HeaderMap,
    /// Time taken to fetch in milliseconds (0 for cached responses)
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Build a response from its parts; `content_type` is read from `headers`.
    pub fn new(url: Url, status: StatusCode, headers: header::HeaderMap, bytes: Bytes) -> Self {
        let content_type = content_type_of(&headers);
        Self { final_url: url.clone(), url, status, content_type, bytes, headers, fetch_ms: 0 }
    }

    /// Snapshot this response for storage as the answer to `request`.
    pub fn to_entry(&self, request: &FetchRequest) -> CacheEntry {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        CacheEntry {
            method: request.method.as_str().to_string(),
            url: request.url.to_string(),
            status: self.status.as_u16(),
            headers,
            body: self.bytes.to_vec(),
            cached_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild a response from a stored snapshot.
    pub fn from_entry(entry: CacheEntry) -> Result<Self, Error> {
        let url = Url::parse(&entry.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url)))?;
        let status =
            StatusCode::from_u16(entry.status).map_err(|e| Error::CorruptEntry(format!("{}: {e}", entry.url)))?;

        let mut headers = header::HeaderMap::with_capacity(entry.headers.len());
        for (name, value) in &entry.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header {name}: {e}")))?;
            let value = header::HeaderValue::from_bytes(value)
                .map_err(|e| Error::CorruptEntry(format!("header {name}: {e}")))?;
            headers.append(name, value);
        }

        Ok(Self::new(url, status, headers, Bytes::from(entry.body)))
    }
}

fn content_type_of(headers: &header::HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Performs live network fetches for the worker.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the network.
    ///
    /// Any HTTP status is a successful fetch; `Err` means the request
    /// never produced a response.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error>;
}

/// reqwest-backed [`Fetcher`].
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() { Error::FetchTimeout(err.to_string()) } else { Error::Network(err.to_string()) }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();

        if let Some(len) = response.content_length() {
            request.check_size(usize::try_from(len).unwrap_or(usize::MAX))?;
        }

        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let bytes = response.bytes().await.map_err(transport_error)?;

        request.check_size(bytes.len())?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            fetch_ms,
            bytes = bytes.len(),
            "network fetch"
        );

        Ok(FetchResponse {
            url: request.url.clone(),
            final_url,
            status,
            content_type: content_type_of(&headers),
            bytes,
            headers,
            fetch_ms,
        })
    }
}
