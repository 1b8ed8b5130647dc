//! Install handler: populate the named cache from the manifest.

use futures_util::future::try_join_all;
use serde::Serialize;
use taximoto_core::{CacheDb, Error};

use crate::fetch::{FetchRequest, FetchResponse, Fetcher};

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// Cache that was populated.
    pub cache_name: String,
    /// Manifest URLs stored, in manifest order.
    pub urls: Vec<String>,
    /// Entries written by this install.
    pub stored: usize,
    /// Entries in the cache afterwards, including ones kept from earlier installs.
    pub total_entries: u64,
}

/// Open `cache_name` and store a response for every request, all or nothing.
///
/// All requests are fetched concurrently. The first network failure,
/// non-2xx status or body over the request's `max_bytes` aborts the install
/// before anything is written.
pub(crate) async fn populate(
    storage: &CacheDb, fetcher: &dyn Fetcher, cache_name: &str, requests: &[FetchRequest],
) -> Result<InstallReport, Error> {
    let cache = storage.open_cache(cache_name).await?;

    let responses = try_join_all(requests.iter().map(|request| fetch_for_install(fetcher, request))).await?;

    let entries = requests
        .iter()
        .zip(&responses)
        .map(|(request, response)| response.to_entry(request))
        .collect();
    let stored = cache.put_all(entries).await?;

    Ok(InstallReport {
        cache_name: cache.name().to_string(),
        urls: requests.iter().map(|r| r.url.to_string()).collect(),
        stored,
        total_entries: cache.len().await?,
    })
}

async fn fetch_for_install(fetcher: &dyn Fetcher, request: &FetchRequest) -> Result<FetchResponse, Error> {
    let response = fetcher.fetch(request).await?;
    if !response.status.is_success() {
        return Err(Error::InstallFailed { url: request.url.to_string(), status: response.status.as_u16() });
    }
    request.check_size(response.bytes.len())?;
    Ok(response)
}
