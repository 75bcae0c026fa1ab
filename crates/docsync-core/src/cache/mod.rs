//! Local cache of fetched content, keyed by page URL and language.
//!
//! Each `(page_url, language)` pair owns a disjoint slot holding a
//! [`CacheRecord`] (the fingerprints seen on the last successful fetch) and the
//! content body those fingerprints describe. The two are written together:
//! a record is never persisted without its body, and vice versa.
//!
//! ## Storage Layout
//!
//! ```text
//! <root>/
//!   url1/
//!     en.json    # {"sha": "...", "etag": "...", "fetchedAt": "..."}
//!     en.md      # content body
//!     en.lock    # held while a write is in progress
//! ```
//!
//! ## Example
//!
//! ```rust
//! use docsync_core::cache::{CacheRecord, CacheStore, MemoryCacheStore};
//!
//! let store = MemoryCacheStore::new();
//! assert!(store.get("/url1", "en")?.is_none());
//!
//! store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"# Hello")?;
//! assert_eq!(store.get("/url1", "en")?.map(|r| r.sha), Some("sha-1".to_string()));
//! # Ok::<(), docsync_core::Error>(())
//! ```

mod memory;
mod storage;
mod types;

use std::path::PathBuf;

pub use memory::MemoryCacheStore;
pub use storage::FsCacheStore;
pub use types::{CacheKey, CacheRecord};

use crate::Result;

/// Persistence for cache records and their content bodies.
///
/// Implementations must make `put` atomic with respect to later `get` calls,
/// including calls made by a later process after a crash.
pub trait CacheStore: Send + Sync {
    /// Load the record for a slot. A missing record is `Ok(None)`.
    ///
    /// A record that exists but cannot be trusted yields
    /// [`Error::CorruptCacheRecord`](crate::Error::CorruptCacheRecord).
    fn get(&self, page_url: &str, language: &str) -> Result<Option<CacheRecord>>;

    /// Write the record and content body for a slot together.
    ///
    /// On failure returns [`Error::CacheWrite`](crate::Error::CacheWrite) and the
    /// slot is left either as it was or empty.
    fn put(&self, page_url: &str, language: &str, record: &CacheRecord, content: &[u8])
    -> Result<()>;

    /// Location of the content body for a slot. Pure: performs no I/O.
    fn content_path(&self, page_url: &str, language: &str) -> PathBuf;
}
