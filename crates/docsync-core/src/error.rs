//! Error types and handling for docsync-core operations.
//!
//! Every fallible operation in the crate returns [`Result<T, Error>`]. The variants
//! follow the reconciliation pipeline: parsing a source URL, fetching it from the
//! remote host, reading and writing the local cache, and finally aggregating
//! per-language failures for a page.
//!
//! ## Error Categories
//!
//! - **Reference errors**: malformed source URLs, missing remote files
//! - **Transport errors**: HTTP failures talking to the remote host
//! - **Cache errors**: atomic writes that could not complete, corrupt records
//! - **Configuration errors**: unreadable or invalid config files
//!
//! ```rust
//! use docsync_core::{Error, RepositoryRef};
//!
//! match RepositoryRef::parse("https://github.com/bem") {
//!     Ok(reference) => println!("{reference}"),
//!     Err(Error::InvalidReferenceUrl(url)) => eprintln!("not a repository url: {url}"),
//!     Err(e) => eprintln!("{}: {e}", e.category()),
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for docsync-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Source URL does not match `scheme://host/owner/repo/(tree|blob)/ref/path`.
    #[error("Invalid reference URL: {0}")]
    InvalidReferenceUrl(String),

    /// The owner/repo/ref/path coordinate does not resolve to a file.
    ///
    /// Raised for HTTP 404 and for paths that resolve to a directory or any
    /// other non-file object.
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    /// Network operation failed.
    ///
    /// The underlying `reqwest::Error` is preserved. No retry is attempted by
    /// this crate.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote host answered with a status that is neither success nor 404.
    #[error("Transport error: {url} responded with HTTP {status}")]
    TransportStatus {
        /// HTTP status code.
        status: u16,
        /// Request URL, without credentials.
        url: String,
    },

    /// The remote host answered, but the payload could not be decoded.
    #[error("Transport error: malformed response from {url}: {reason}")]
    MalformedResponse {
        /// Request URL.
        url: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Writing a cache entry failed.
    ///
    /// The store guarantees the previous record is either intact or absent;
    /// a record is never left pointing at a content body it does not describe.
    #[error("Cache write error: {0}")]
    CacheWrite(String),

    /// An on-disk cache record exists but cannot be trusted.
    #[error("Corrupt cache record at {}: {reason}", path.display())]
    CorruptCacheRecord {
        /// Location of the offending record.
        path: PathBuf,
        /// Why the record was rejected.
        reason: String,
    },

    /// I/O operation failed outside of an atomic cache write.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more languages of a page failed to reconcile.
    ///
    /// Languages that succeeded have already been reported to the model.
    #[error("{} language(s) failed for page '{url}': {}", failures.len(), summarize(failures))]
    PageFailed {
        /// URL of the page.
        url: String,
        /// Each failing language with its error.
        failures: Vec<LanguageFailure>,
    },
}

/// A single language that failed while processing a page.
#[derive(Debug)]
pub struct LanguageFailure {
    /// Language key, e.g. `en`.
    pub language: String,
    /// Underlying failure.
    pub error: Error,
}

fn summarize(failures: &[LanguageFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.language, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Check if the error might succeed if the whole run is repeated later.
    ///
    /// This is informational: the reconciliation core never retries on its own.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::TransportStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            Self::PageFailed { failures, .. } => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_recoverable())
            },
            _ => false,
        }
    }

    /// Get the error category as a stable snake_case identifier.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidReferenceUrl(_) => "invalid_reference_url",
            Self::ReferenceNotFound(_) => "reference_not_found",
            Self::Transport(_) | Self::TransportStatus { .. } | Self::MalformedResponse { .. } => {
                "transport"
            },
            Self::CacheWrite(_) => "cache_write",
            Self::CorruptCacheRecord { .. } => "corrupt_cache_record",
            Self::Io(_) => "io",
            Self::Config(_) => "config",
            Self::PageFailed { .. } => "page_failed",
        }
    }
}

/// Convenience type alias for Results with our Error type.
pub type Result<T> = std::result::Result<T, Error>;
