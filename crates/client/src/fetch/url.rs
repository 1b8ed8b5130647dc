//! Request URL resolution and registration scope matching.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a request URL against the worker's origin.
///
/// Absolute URLs are kept as they are; paths such as `/static/manifest.json`
/// are joined onto `origin`. The result is the normalized form used as a
/// cache key:
/// 1. Leading/trailing whitespace trimmed
/// 2. Scheme must be http or https
/// 3. Host lowercased (by the URL parser)
/// 4. Fragment removed
/// 5. Path case and query string left untouched
pub fn resolve(origin: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut resolved = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match resolved.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    resolved.set_fragment(None);

    Ok(resolved)
}

/// Registration scope: the origin plus a path prefix.
///
/// Only requests inside the scope are routed through the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    origin: Url,
    prefix: String,
}

impl Scope {
    /// Build a scope from an origin URL and a path prefix starting with `/`.
    pub fn new(origin: &str, prefix: &str) -> Result<Self, UrlError> {
        let origin = Url::parse(origin.trim()).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        match origin.scheme() {
            "http" | "https" => {}
            scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
        }
        if !prefix.starts_with('/') {
            return Err(UrlError::InvalidUrl(format!("scope must start with '/': {prefix}")));
        }

        Ok(Self { origin, prefix: prefix.to_string() })
    }

    /// Origin the scope belongs to.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Path prefix of the scope.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Resolve a request URL against this scope's origin.
    pub fn resolve(&self, input: &str) -> Result<Url, UrlError> {
        resolve(&self.origin, input)
    }

    /// Whether `url` is same-origin and its path falls under the prefix.
    pub fn contains(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin() && url.path().starts_with(&self.prefix)
    }
}
