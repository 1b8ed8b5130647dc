//! Cache-first fetch interceptor modelled on a browser service worker.
//!
//! ### Install
//! - Opens the `taximoto-cache-v1` cache and stores every manifest URL
//! - All-or-nothing: one failed URL fails the install and writes nothing
//! - Each manifest response is capped at the install size limit (default 10MB)
//! - A panic inside the install fails it like any other error; the worker can
//!   be installed again afterwards
//! - Logs once on success
//!
//! ### Fetch
//! - Before activation, or outside the scope, requests go straight to the network
//! - Once activated, cache storage answers first; misses make one live fetch
//!   whose response is returned unmodified and never cached
//!
//! Both handlers return a [`PendingWork`] the host awaits to learn the
//! outcome of the event.

pub mod install;
pub mod intercept;
pub mod lifecycle;
pub mod manifest;
pub mod pending;

use std::sync::Arc;

use taximoto_core::{CacheDb, Error};
use tokio::sync::Mutex;

pub use install::InstallReport;
pub use intercept::{Interception, ResponseSource};
pub use lifecycle::WorkerState;
pub use manifest::{CACHE_NAME, INSTALL_MANIFEST, manifest_requests};
pub use pending::PendingWork;

use crate::fetch::{FetchRequest, Fetcher, Scope};
use lifecycle::Lifecycle;

/// A worker registered for one origin scope.
///
/// Cloning is cheap; clones share cache storage, fetcher and lifecycle.
#[derive(Clone)]
pub struct ServiceWorker {
    storage: CacheDb,
    fetcher: Arc<dyn Fetcher>,
    scope: Scope,
    lifecycle: Arc<Mutex<Lifecycle>>,
    install_max_bytes: usize,
}

/// Default cap on each response stored by install.
pub const DEFAULT_INSTALL_MAX_BYTES: usize = 10 * 1024 * 1024;

impl ServiceWorker {
    /// Register a worker over `storage` for `scope`.
    pub fn new(storage: CacheDb, fetcher: Arc<dyn Fetcher>, scope: Scope) -> Self {
        Self {
            storage,
            fetcher,
            scope,
            lifecycle: Arc::new(Mutex::new(Lifecycle::new())),
            install_max_bytes: DEFAULT_INSTALL_MAX_BYTES,
        }
    }

    /// Cap the body size of each response stored by install.
    ///
    /// Fetches answered from the network on a cache miss are never capped.
    pub fn with_install_max_bytes(mut self, max_bytes: usize) -> Self {
        self.install_max_bytes = max_bytes;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn storage(&self) -> &CacheDb {
        &self.storage
    }

    /// Name of the cache this worker installs into.
    pub fn cache_name(&self) -> &'static str {
        CACHE_NAME
    }

    pub async fn state(&self) -> WorkerState {
        self.lifecycle.lock().await.state()
    }

    /// Build a request descriptor for `url` (absolute, or a path on the origin).
    pub fn request(&self, method: &str, url: &str) -> Result<FetchRequest, Error> {
        let url = self.scope.resolve(url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        FetchRequest::with_method(method, url)
    }

    /// Handle the install event.
    pub fn on_install(&self) -> PendingWork<InstallReport> {
        let worker = self.clone();
        PendingWork::spawn(async move {
            worker.lifecycle.lock().await.begin_install()?;

            let populating = worker.clone();
            let result = match tokio::spawn(async move { populating.populate().await }).await {
                Ok(result) => result,
                Err(e) => Err(Error::TaskFailed(e.to_string())),
            };

            worker.lifecycle.lock().await.finish_install(result.is_ok());

            let report = result?;
            tracing::info!(
                cache = %report.cache_name,
                stored = report.stored,
                total_entries = report.total_entries,
                "service worker installed"
            );
            Ok(report)
        })
    }

    async fn populate(&self) -> Result<InstallReport, Error> {
        let requests: Vec<FetchRequest> = manifest_requests(&self.scope)?
            .into_iter()
            .map(|request| request.with_max_bytes(self.install_max_bytes))
            .collect();
        install::populate(&self.storage, self.fetcher.as_ref(), CACHE_NAME, &requests).await
    }

    /// Activate after a successful install. No-op when already active.
    pub async fn activate(&self) -> Result<(), Error> {
        if self.lifecycle.lock().await.activate()? {
            tracing::debug!(scope = %self.scope.prefix(), "service worker activated");
        }
        Ok(())
    }

    /// Handle a fetch event.
    pub fn on_fetch(&self, request: FetchRequest) -> PendingWork<Interception> {
        let worker = self.clone();
        PendingWork::spawn(async move {
            let activated = worker.state().await == WorkerState::Activated;
            if !activated || !worker.scope.contains(&request.url) {
                let response = worker.fetcher.fetch(&request).await?;
                return Ok(Interception { response, source: ResponseSource::Uncontrolled });
            }

            intercept::cache_first(&worker.storage, worker.fetcher.as_ref(), &request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchResponse;
    use crate::testing::StubFetcher;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    const ORIGIN: &str = "http://localhost:8000";

    /// Panics on its first call, then delegates to the stub.
    struct PanicsOnce {
        panicked: AtomicBool,
        inner: StubFetcher,
    }

    #[async_trait::async_trait]
    impl Fetcher for PanicsOnce {
        async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("fetcher blew up");
            }
            self.inner.fetch(request).await
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn count(&self, needle: &str) -> usize {
            let bytes = self.0.lock().unwrap();
            String::from_utf8_lossy(&bytes).matches(needle).count()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    async fn worker_with(fetcher: Arc<StubFetcher>) -> ServiceWorker {
        let storage = CacheDb::open_in_memory().await.unwrap();
        ServiceWorker::new(storage, fetcher, Scope::new(ORIGIN, "/").unwrap())
    }

    async fn installed_worker() -> (ServiceWorker, Arc<StubFetcher>) {
        let fetcher = Arc::new(
            StubFetcher::serving_manifest(ORIGIN).respond("http://localhost:8000/api/data", 200, b"{\"live\":true}"),
        );
        let worker = worker_with(fetcher.clone()).await;
        worker.on_install().await.unwrap();
        worker.activate().await.unwrap();
        (worker, fetcher)
    }

    #[tokio::test]
    async fn test_install_populates_cache() {
        let fetcher = Arc::new(StubFetcher::serving_manifest(ORIGIN));
        let worker = worker_with(fetcher).await;

        let report = worker.on_install().await.unwrap();

        assert_eq!(report.cache_name, CACHE_NAME);
        assert_eq!(report.total_entries, 4);
        assert_eq!(worker.state().await, WorkerState::Installed);
        let cache = worker.storage().open_cache(CACHE_NAME).await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_failed_install_marks_redundant() {
        let fetcher =
            Arc::new(StubFetcher::serving_manifest(ORIGIN).respond("http://localhost:8000/static/manifest.json", 404, b""));
        let worker = worker_with(fetcher).await;

        let result = worker.on_install().await;

        assert!(matches!(result, Err(Error::InstallFailed { status: 404, .. })));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        assert!(worker.activate().await.is_err());
    }

    #[tokio::test]
    async fn test_manifest_hits_make_no_network_calls() {
        let (worker, fetcher) = installed_worker().await;
        let calls_after_install = fetcher.call_count();

        for path in INSTALL_MANIFEST {
            let answer = worker.on_fetch(worker.request("GET", path).unwrap()).await.unwrap();
            assert_eq!(answer.source, ResponseSource::Cache, "{path}");
            assert_eq!(answer.response.bytes.as_ref(), path.as_bytes());
        }

        assert_eq!(fetcher.call_count(), calls_after_install);
    }

    #[tokio::test]
    async fn test_uncached_url_fetched_once_and_not_stored() {
        let (worker, fetcher) = installed_worker().await;
        let before = fetcher.call_count();

        let answer = worker
            .on_fetch(worker.request("GET", "/api/data").unwrap())
            .await
            .unwrap();

        assert_eq!(answer.source, ResponseSource::Network);
        assert_eq!(answer.response.bytes.as_ref(), b"{\"live\":true}");
        assert_eq!(fetcher.call_count(), before + 1);

        let cache = worker.storage().open_cache(CACHE_NAME).await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 4);

        worker
            .on_fetch(worker.request("GET", "/api/data").unwrap())
            .await
            .unwrap();
        assert_eq!(fetcher.call_count(), before + 2);
    }

    #[tokio::test]
    async fn test_not_activated_bypasses_cache() {
        let fetcher = Arc::new(StubFetcher::serving_manifest(ORIGIN));
        let worker = worker_with(fetcher.clone()).await;
        worker.on_install().await.unwrap();

        let answer = worker.on_fetch(worker.request("GET", "/").unwrap()).await.unwrap();

        assert_eq!(answer.source, ResponseSource::Uncontrolled);
        assert_eq!(fetcher.call_count(), 5);
    }

    #[tokio::test]
    async fn test_out_of_scope_request_bypasses_cache() {
        let (worker, fetcher) = installed_worker().await;
        let before = fetcher.call_count();

        let answer = worker
            .on_fetch(worker.request("GET", "https://cdn.example.com/").unwrap())
            .await
            .unwrap();

        assert_eq!(answer.source, ResponseSource::Uncontrolled);
        assert_eq!(answer.response.status.as_u16(), 404);
        assert_eq!(fetcher.call_count(), before + 1);
    }

    #[tokio::test]
    async fn test_reinstall_keeps_serving_and_never_shrinks() {
        let (worker, _) = installed_worker().await;

        let report = worker.on_install().await.unwrap();
        assert_eq!(report.total_entries, 4);
        assert_eq!(worker.state().await, WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_install_logs_once_on_success() {
        let (logs, _guard) = capture_logs();
        let worker = worker_with(Arc::new(StubFetcher::serving_manifest(ORIGIN))).await;

        worker.on_install().await.unwrap();

        assert_eq!(logs.count("service worker installed"), 1);
        assert_eq!(logs.count("INFO"), 1);
    }

    #[tokio::test]
    async fn test_failed_install_logs_nothing() {
        let (logs, _guard) = capture_logs();
        let fetcher =
            Arc::new(StubFetcher::serving_manifest(ORIGIN).respond("http://localhost:8000/static/manifest.json", 404, b""));
        let worker = worker_with(fetcher).await;

        assert!(worker.on_install().await.is_err());

        assert_eq!(logs.count("service worker installed"), 0);
    }

    #[tokio::test]
    async fn test_install_recovers_after_panic() {
        let fetcher = Arc::new(PanicsOnce { panicked: AtomicBool::new(false), inner: StubFetcher::serving_manifest(ORIGIN) });
        let storage = CacheDb::open_in_memory().await.unwrap();
        let worker = ServiceWorker::new(storage, fetcher, Scope::new(ORIGIN, "/").unwrap());

        let first = worker.on_install().await;
        assert!(matches!(first, Err(Error::TaskFailed(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);

        let retry = worker.on_install().await.unwrap();
        assert_eq!(retry.total_entries, 4);
        assert_eq!(worker.state().await, WorkerState::Installed);
    }

    #[tokio::test]
    async fn test_large_miss_response_passes_through() {
        let big = vec![0u8; 4096];
        let fetcher = Arc::new(StubFetcher::serving_manifest(ORIGIN).respond_with(
            "http://localhost:8000/static/assets/img/hero.png",
            200,
            "image/png",
            &big,
        ));
        let worker = worker_with(fetcher).await.with_install_max_bytes(1024);
        worker.on_install().await.unwrap();
        worker.activate().await.unwrap();

        let answer = worker
            .on_fetch(worker.request("GET", "/static/assets/img/hero.png").unwrap())
            .await
            .unwrap();

        assert_eq!(answer.source, ResponseSource::Network);
        assert_eq!(answer.response.status.as_u16(), 200);
        assert_eq!(answer.response.bytes.len(), 4096);
    }

    #[tokio::test]
    async fn test_install_rejects_oversized_manifest_response() {
        let fetcher = Arc::new(StubFetcher::serving_manifest(ORIGIN).respond_with(
            "http://localhost:8000/static/assets/img/moto_3.jpg",
            200,
            "image/jpeg",
            &[0u8; 2048],
        ));
        let worker = worker_with(fetcher).await.with_install_max_bytes(1024);

        let result = worker.on_install().await;

        assert!(matches!(result, Err(Error::FetchTooLarge(_))));
        assert_eq!(worker.state().await, WorkerState::Redundant);
        let cache = worker.storage().open_cache(CACHE_NAME).await.unwrap();
        assert!(cache.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_independent() {
        let (worker, _) = installed_worker().await;

        let pending: Vec<_> = ["/", "/api/data", "/static/manifest.json"]
            .into_iter()
            .map(|path| worker.on_fetch(worker.request("GET", path).unwrap()))
            .collect();

        let mut sources = Vec::new();
        for work in pending {
            sources.push(work.await.unwrap().source);
        }
        assert_eq!(sources, vec![ResponseSource::Cache, ResponseSource::Network, ResponseSource::Cache]);
    }
}
