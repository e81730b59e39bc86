//! Persistent blob caching.

pub mod sqlite;

pub use sqlite::{BlobCache, CacheStats, CachedStore};
