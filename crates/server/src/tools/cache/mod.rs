//! Cache-related MCP tools.
//!
//! Read-only views of the worker's cache storage.

pub mod keys;

pub use keys::{CacheKeysParams, keys_impl};
