//! Client code for taximoto-sw.
//!
//! This crate provides the network fetch pipeline and the cache-first
//! service worker built on it, shared by the server host.

pub mod fetch;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use fetch::{FetchConfig, FetchRequest, FetchResponse, Fetcher, HttpFetcher, Scope, UrlError, resolve};
pub use worker::{
    CACHE_NAME, INSTALL_MANIFEST, InstallReport, Interception, PendingWork, ResponseSource, ServiceWorker, WorkerState,
};

pub use bytes::Bytes;
pub use reqwest::{Method, StatusCode, Url, header};
