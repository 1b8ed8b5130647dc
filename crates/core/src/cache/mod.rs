//! SQLite-backed cache storage for an origin.
//!
//! A persistent set of named caches using SQLite with async access via
//! tokio-rusqlite:
//!
//! - Entries keyed by request method and normalized URL
//! - Atomic batch population
//! - Automatic schema migrations
//! - WAL mode for concurrent readers

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use storage::{Cache, CacheEntry, CachedRequest};
