//! Fetch handler: cache-first response resolution.

use serde::Serialize;
use taximoto_core::{CacheDb, Error};

use crate::fetch::{FetchRequest, FetchResponse, Fetcher};

/// Where an intercepted request got its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Served from cache storage; no network access.
    Cache,
    /// Cache miss; answered by one live fetch.
    Network,
    /// Not routed through the worker (not activated, or out of scope).
    Uncontrolled,
}

/// The single answer to an intercepted request.
#[derive(Debug, Clone)]
pub struct Interception {
    pub response: FetchResponse,
    pub source: ResponseSource,
}

/// Answer from cache storage if any cache holds the request, otherwise from
/// the network.
///
/// Network responses are returned as-is and never written to the cache.
pub(crate) async fn cache_first(
    storage: &CacheDb, fetcher: &dyn Fetcher, request: &FetchRequest,
) -> Result<Interception, Error> {
    if let Some(entry) = storage
        .match_request(request.method.as_str(), request.url.as_str())
        .await?
    {
        tracing::debug!(method = %request.method, url = %request.url, "cache hit");
        let response = FetchResponse::from_entry(entry)?;
        return Ok(Interception { response, source: ResponseSource::Cache });
    }

    tracing::debug!(method = %request.method, url = %request.url, "cache miss");
    let response = fetcher.fetch(request).await?;
    Ok(Interception { response, source: ResponseSource::Network })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubFetcher;
    use url::Url;

    async fn seeded_storage() -> CacheDb {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_cache("taximoto-cache-v1").await.unwrap();
        let request = FetchRequest::get(Url::parse("http://localhost:8000/").unwrap());
        let response = StubFetcher::new()
            .respond("http://localhost:8000/", 200, b"cached home")
            .fetch(&request)
            .await
            .unwrap();
        cache.put_all(vec![response.to_entry(&request)]).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_hit_skips_network() {
        let db = seeded_storage().await;
        let fetcher = StubFetcher::new().respond("http://localhost:8000/", 200, b"live home");
        let request = FetchRequest::get(Url::parse("http://localhost:8000/").unwrap());

        let answer = cache_first(&db, &fetcher, &request).await.unwrap();

        assert_eq!(answer.source, ResponseSource::Cache);
        assert_eq!(answer.response.bytes.as_ref(), b"cached home");
        assert_eq!(fetcher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_passes_response_through_without_caching() {
        let db = seeded_storage().await;
        let fetcher = StubFetcher::new().respond("http://localhost:8000/api/data", 503, b"busy");
        let request = FetchRequest::get(Url::parse("http://localhost:8000/api/data").unwrap());

        let answer = cache_first(&db, &fetcher, &request).await.unwrap();

        assert_eq!(answer.source, ResponseSource::Network);
        assert_eq!(answer.response.status.as_u16(), 503);
        assert_eq!(answer.response.bytes.as_ref(), b"busy");
        assert_eq!(fetcher.calls(), vec!["http://localhost:8000/api/data".to_string()]);

        let cache = db.open_cache("taximoto-cache-v1").await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_miss_propagates_network_failure() {
        let db = seeded_storage().await;
        let fetcher = StubFetcher::new().fail("http://localhost:8000/api/data", "offline");
        let request = FetchRequest::get(Url::parse("http://localhost:8000/api/data").unwrap());

        let result = cache_first(&db, &fetcher, &request).await;
        assert!(matches!(result, Err(Error::Network(msg)) if msg == "offline"));
    }

    #[tokio::test]
    async fn test_other_method_misses_cached_get() {
        let db = seeded_storage().await;
        let fetcher = StubFetcher::new().respond("http://localhost:8000/", 200, b"posted");
        let request = FetchRequest::with_method("POST", Url::parse("http://localhost:8000/").unwrap()).unwrap();

        let answer = cache_first(&db, &fetcher, &request).await.unwrap();
        assert_eq!(answer.source, ResponseSource::Network);
        assert_eq!(fetcher.call_count(), 1);
    }
}
