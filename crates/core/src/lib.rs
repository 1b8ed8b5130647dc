//! Core types and shared functionality for taximoto-sw.
//!
//! This crate provides:
//! - Cache storage with a SQLite backend
//! - Unified error types
//! - Host configuration

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{Cache, CacheDb, CacheEntry, CachedRequest};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
