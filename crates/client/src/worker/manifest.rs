//! The cache name and install manifest compiled into the worker.

use crate::fetch::{FetchRequest, Scope};
use taximoto_core::Error;

/// Name of the cache the install handler populates.
///
/// Changing it is the only way a new version starts from an empty cache.
pub const CACHE_NAME: &str = "taximoto-cache-v1";

/// Paths stored during install, in order.
pub const INSTALL_MANIFEST: [&str; 4] =
    ["/", "/static/assets/img/image_1.png", "/static/assets/img/moto_3.jpg", "/static/manifest.json"];

/// GET requests for every manifest path, resolved against the scope's origin.
pub fn manifest_requests(scope: &Scope) -> Result<Vec<FetchRequest>, Error> {
    INSTALL_MANIFEST
        .iter()
        .map(|path| {
            scope
                .resolve(path)
                .map(FetchRequest::get)
                .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
        })
        .collect()
}
