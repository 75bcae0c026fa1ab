use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Bytes kept as-is in a cache path component. Everything else is
/// percent-encoded, `%` and `.` included, so the mapping is reversible and an
/// encoded component never looks like a slot file name (`<lang>.<ext>`).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');
/// Directory used for a page whose URL has no path segments (e.g. `/`).
/// `@` is always encoded, so no page segment can produce this name.
const ROOT_PAGE_DIR: &str = "@root";
/// Extension of cached content bodies.
const CONTENT_EXTENSION: &str = "md";
/// Extension of cached records.
const RECORD_EXTENSION: &str = "json";

/// Fingerprints recorded after the last successful fetch of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Authoritative content hash.
    pub sha: String,
    /// Advisory validator from the transport.
    pub etag: String,
    /// When the content body was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CacheRecord {
    /// Record stamped with the current time.
    pub fn new(sha: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            etag: etag.into(),
            fetched_at: Some(Utc::now()),
        }
    }

    /// Reason the record is unusable, if any.
    pub fn defect(&self) -> Option<&'static str> {
        if self.sha.trim().is_empty() {
            Some("empty sha")
        } else if self.etag.trim().is_empty() {
            Some("empty etag")
        } else {
            None
        }
    }
}

/// Stable relative location of a slot inside a cache root.
///
/// Derived purely from the page URL and language: `/url1` + `en` becomes
/// `url1/en.json` and `url1/en.md`. Each URL segment is percent-encoded, so
/// two page URLs share a slot only when they have the same segments. Leading,
/// trailing and repeated slashes are not significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    page_dir: PathBuf,
    language: String,
}

impl CacheKey {
    /// Build the key for a page URL and language.
    pub fn new(page_url: &str, language: &str) -> Self {
        let mut page_dir = PathBuf::new();
        for segment in page_url.split('/').filter(|segment| !segment.is_empty()) {
            page_dir.push(encode_component(segment));
        }
        if page_dir.as_os_str().is_empty() {
            page_dir.push(ROOT_PAGE_DIR);
        }

        Self {
            page_dir,
            language: encode_component(language),
        }
    }

    /// Directory shared by every language of the page.
    pub fn page_dir(&self) -> &Path {
        &self.page_dir
    }

    /// Encoded language component.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Relative path of the record file.
    pub fn record_file(&self) -> PathBuf {
        self.file_with_extension(RECORD_EXTENSION)
    }

    /// Relative path of the content body.
    pub fn content_file(&self) -> PathBuf {
        self.file_with_extension(CONTENT_EXTENSION)
    }

    /// Relative path of the write lock.
    pub fn lock_file(&self) -> PathBuf {
        self.file_with_extension("lock")
    }

    fn file_with_extension(&self, extension: &str) -> PathBuf {
        self.page_dir
            .join(format!("{}.{extension}", self.language))
    }
}

/// Percent-encode one path component. Dots are encoded too, so `.` and `..`
/// can never address a location outside the cache root.
fn encode_component(name: &str) -> String {
    if name.is_empty() {
        return "@".to_string();
    }
    utf8_percent_encode(name, COMPONENT).to_string()
}
