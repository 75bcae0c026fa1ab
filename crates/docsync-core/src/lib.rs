//! # docsync-core
//!
//! Core functionality for docsync - keeps documentation pages whose content
//! lives in remote Git repositories in sync with a local content cache.
//!
//! Each page of a site model names, per language, the repository file its
//! content comes from. A run fetches every such file, compares it with what
//! was cached last time, and reports which pages were added or modified.
//!
//! ## Architecture
//!
//! - **Source references**: [`RepositoryRef`] parses browser URLs into
//!   host, owner, repository, ref and path
//! - **Fetching**: [`ContentFetcher`] retrieves content plus two
//!   fingerprints; [`GithubFetcher`] talks to the GitHub contents API
//! - **Cache**: [`CacheStore`] persists one record and one content body per
//!   `(page, language)` slot, written atomically
//! - **Reconciliation**: [`Reconciler`] classifies a slot as added, modified
//!   or unchanged using the content hash; the `etag` is only a hint
//! - **Pages**: [`PageProcessor`] reconciles every language of a page and
//!   reports the page to the [`Model`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docsync_core::{FsCacheStore, GithubFetcher, Model, Page, PageProcessor};
//!
//! # async fn run(mut pages: Vec<Page>) -> docsync_core::Result<()> {
//! let fetcher = Arc::new(GithubFetcher::new()?);
//! let store = Arc::new(FsCacheStore::new(".builder/cache"));
//! let processor = PageProcessor::new(fetcher, store);
//!
//! let model = Model::new();
//! let languages = vec!["en".to_string(), "ru".to_string()];
//! let summary = processor.process_pages(&model, &mut pages, &languages, 8).await;
//!
//! let changes = model.into_changes();
//! println!(
//!     "{} added, {} modified, {} failed",
//!     changes.pages.added.len(),
//!     changes.pages.modified.len(),
//!     summary.failed.len()
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. A page whose languages fail
//! surfaces [`Error::PageFailed`] with every language's error attached:
//!
//! ```rust
//! use docsync_core::{Error, RepositoryRef};
//!
//! match RepositoryRef::parse("https://github.com/bem/bem-method") {
//!     Ok(reference) => println!("{reference}"),
//!     Err(Error::InvalidReferenceUrl(url)) => eprintln!("Not a file URL: {url}"),
//!     Err(e) => eprintln!("Unexpected error: {e}"),
//! }
//! ```

/// Local content cache
pub mod cache;
/// Configuration loading and environment overrides
pub mod config;
/// Error types and result aliases
pub mod error;
/// Remote content retrieval with fingerprints
pub mod fetcher;
/// Change tracking shared with the site model
pub mod model;
/// Site model pages
pub mod page;
/// Page and multi-page processing
pub mod processor;
/// Added/modified/unchanged classification
pub mod reconcile;
/// Repository URL parsing
pub mod source_ref;

// Re-export commonly used types
pub use cache::{CacheRecord, CacheStore, FsCacheStore, MemoryCacheStore};
pub use config::{CacheConfig, Config, GithubConfig, RunConfig};
pub use error::{Error, LanguageFailure, Result};
pub use fetcher::{ContentFetcher, FetchResult, GithubFetcher};
pub use model::{Changes, Model, PageChanges, PageKind, PageMeta};
pub use page::{Page, PageEntry, PageLanguage};
pub use processor::{PageProcessor, RunSummary};
pub use reconcile::{Outcome, Reconciled, Reconciler};
pub use source_ref::RepositoryRef;
