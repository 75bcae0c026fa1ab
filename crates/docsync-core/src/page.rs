//! Pages of the site model as seen by the reconciler.
//!
//! A page is a JSON object with a `url` and one object per language:
//!
//! ```json
//! {
//!   "url": "/url1",
//!   "en": { "title": "foo bar", "sourceUrl": "https://github.com/bem/bem-method/tree/bem-info-data/method/index/index.en.md" },
//!   "ru": {}
//! }
//! ```
//!
//! `title` and `sourceUrl` are owned by the site model. `contentFile` is
//! written here once a language has been reconciled. Keys this crate does not
//! know about are carried through untouched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page of the site model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Public URL of the page.
    pub url: String,
    /// Per-language entries plus any other page-level keys.
    #[serde(flatten)]
    pub entries: BTreeMap<String, PageEntry>,
}

/// A page-level value: a language object, or anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageEntry {
    /// A language object such as `"en": { ... }`.
    Language(PageLanguage),
    /// Any other value, preserved verbatim.
    Other(Value),
}

/// Language-specific data of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLanguage {
    /// Page title in this language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Repository URL the content is loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Local path of the materialized content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_file: Option<PathBuf>,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Page {
    /// Creates a page without languages.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Builder-style helper adding a language entry.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>, entry: PageLanguage) -> Self {
        self.entries
            .insert(language.into(), PageEntry::Language(entry));
        self
    }

    /// Entry for `language`, if the page has one.
    pub fn language(&self, language: &str) -> Option<&PageLanguage> {
        match self.entries.get(language) {
            Some(PageEntry::Language(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Mutable entry for `language`, if the page has one.
    pub fn language_mut(&mut self, language: &str) -> Option<&mut PageLanguage> {
        match self.entries.get_mut(language) {
            Some(PageEntry::Language(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Non-blank source URL for `language`.
    pub fn source_url(&self, language: &str) -> Option<&str> {
        self.language(language)
            .and_then(|entry| entry.source_url.as_deref())
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Title for `language`.
    pub fn title(&self, language: &str) -> Option<&str> {
        self.language(language)
            .and_then(|entry| entry.title.as_deref())
    }
}

impl PageLanguage {
    /// Entry with a title and a source URL.
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            source_url: Some(source_url.into()),
            ..Self::default()
        }
    }
}
