//! In-process [`Fetcher`] double for tests.
//!
//! Routes are keyed by absolute URL. Unrouted URLs answer 404, like an
//! origin server would. Every call is recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use reqwest::{StatusCode, header};

use crate::fetch::{FetchRequest, FetchResponse, Fetcher};
use crate::worker::INSTALL_MANIFEST;
use taximoto_core::Error;

#[derive(Debug, Clone)]
enum Route {
    Respond { status: u16, content_type: &'static str, body: Vec<u8> },
    Fail(String),
}

/// Recording fetcher with canned responses.
#[derive(Debug, Default)]
pub struct StubFetcher {
    routes: HashMap<String, Route>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every install manifest path on `origin` with 200.
    pub fn serving_manifest(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        INSTALL_MANIFEST.iter().fold(Self::new(), |stub, path| {
            let content_type = match path.rsplit('.').next() {
                Some("png") => "image/png",
                Some("jpg") => "image/jpeg",
                Some("json") => "application/manifest+json",
                _ => "text/html; charset=utf-8",
            };
            stub.respond_with(&format!("{origin}{path}"), 200, content_type, path.as_bytes())
        })
    }

    /// Answer `url` with `status` and a plain-text body.
    pub fn respond(self, url: &str, status: u16, body: &[u8]) -> Self {
        self.respond_with(url, status, "text/plain", body)
    }

    /// Answer `url` with `status`, a content type and a body.
    pub fn respond_with(mut self, url: &str, status: u16, content_type: &'static str, body: &[u8]) -> Self {
        self.routes
            .insert(url.to_string(), Route::Respond { status, content_type, body: body.to_vec() });
        self
    }

    /// Fail `url` with a network error.
    pub fn fail(mut self, url: &str, message: &str) -> Self {
        self.routes.insert(url.to_string(), Route::Fail(message.to_string()));
        self
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait::async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let url = request.url.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.clone());
        }

        let (status, content_type, body) = match self.routes.get(&url) {
            Some(Route::Respond { status, content_type, body }) => (*status, *content_type, body.clone()),
            Some(Route::Fail(message)) => return Err(Error::Network(message.clone())),
            None => (404, "text/plain", b"not found".to_vec()),
        };

        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
        let status = StatusCode::from_u16(status).map_err(|e| Error::InvalidInput(e.to_string()))?;

        Ok(FetchResponse::new(request.url.clone(), status, headers, Bytes::from(body)))
    }
}
