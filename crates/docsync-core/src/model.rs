//! Change tracking shared with the site model.
//!
//! A run reports each page at most once, as either added or modified.
//! Appends may come from many pages processed concurrently, so the collections
//! sit behind a mutex; ordering between pages is whatever order they finished in.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Kind of page being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// A documentation page loaded from a repository.
    Doc,
}

/// Public metadata of a changed page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Page kind, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: PageKind,
    /// Page URL.
    pub url: String,
    /// Title in the primary language.
    pub title: Option<String>,
}

impl PageMeta {
    /// Metadata for a documentation page.
    pub fn doc(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            kind: PageKind::Doc,
            url: url.into(),
            title,
        }
    }
}

/// Added and modified pages, in reporting order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageChanges {
    /// Pages seen for the first time.
    pub added: Vec<PageMeta>,
    /// Pages whose content changed.
    pub modified: Vec<PageMeta>,
}

impl PageChanges {
    /// Whether nothing was reported.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty()
    }
}

/// Everything reported during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    /// Page-level changes.
    pub pages: PageChanges,
}

/// Change collector handed to page processing.
#[derive(Debug, Default)]
pub struct Model {
    changes: Mutex<Changes>,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly added page.
    pub fn page_added(&self, meta: PageMeta) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .added
            .push(meta);
    }

    /// Record a modified page.
    pub fn page_modified(&self, meta: PageMeta) {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pages
            .modified
            .push(meta);
    }

    /// Snapshot of the changes reported so far.
    pub fn changes(&self) -> Changes {
        self.changes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Consume the model, returning its changes.
    pub fn into_changes(self) -> Changes {
        self.changes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
