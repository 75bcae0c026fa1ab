//! Parsing of repository source URLs into fetchable coordinates.
//!
//! A documentation page points at its markdown through a browser URL such as
//! `https://github.com/bem/bem-method/tree/bem-info-data/method/index/index.en.md`.
//! [`RepositoryRef::parse`] splits that URL into host, owner, repository, ref and
//! file path. The `tree`/`blob` marker only says how the web UI renders the
//! object, so it is matched and then discarded.

use std::fmt;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

/// One file at one point in the history of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// URL scheme the reference was given with (`http` or `https`).
    pub scheme: String,
    /// Host, including an explicit port when one was present.
    pub host: String,
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Branch, tag or commit name.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Path of the file inside the repository, without a leading slash.
    pub path: String,
}

impl RepositoryRef {
    /// Parse `scheme://host/owner/repo/(tree|blob)/ref/path...`.
    ///
    /// Owner, repository and ref are one segment each; the path is everything
    /// after the ref. Only the host goes through URL normalization. Path
    /// segments are percent-decoded and otherwise kept verbatim, so case,
    /// `.`/`..` segments, empty segments and a trailing slash all survive.
    pub fn parse(source_url: &str) -> Result<Self> {
        let invalid = || Error::InvalidReferenceUrl(source_url.to_string());

        let (scheme, rest) = source_url.split_once("://").ok_or_else(invalid)?;
        let scheme = scheme.to_ascii_lowercase();
        if !matches!(scheme.as_str(), "http" | "https") {
            return Err(invalid());
        }

        // Query and fragment do not address anything inside the repository.
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let mut parts = rest.splitn(6, '/');
        let (Some(authority), Some(owner), Some(repo), Some(kind), Some(git_ref), Some(path)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(invalid());
        };
        if !matches!(kind, "tree" | "blob") || path.is_empty() {
            return Err(invalid());
        }

        let origin = Url::parse(&format!("{scheme}://{authority}/")).map_err(|_| invalid())?;
        let host = match (origin.host_str(), origin.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(invalid()),
        };

        let owner = decode(owner).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let repo = decode(repo).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let git_ref = decode(git_ref).filter(|s| !s.is_empty()).ok_or_else(invalid)?;
        let path = path
            .split('/')
            .map(decode)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(invalid)?
            .join("/");

        Ok(Self {
            scheme,
            host,
            owner,
            repo,
            git_ref,
            path,
        })
    }
}

/// Percent-decode a single path segment. Non-UTF-8 results yield `None`.
fn decode(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(std::borrow::Cow::into_owned)
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}:{}",
            self.host, self.owner, self.repo, self.git_ref, self.path
        )
    }
}
