use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::config::GithubConfig;
use crate::{Error, RepositoryRef, Result};

const GITHUB_JSON: &str = "application/vnd.github+json";
const GITHUB_RAW: &str = "application/vnd.github.raw";
const PUBLIC_GITHUB_HOST: &str = "github.com";
const PUBLIC_GITHUB_API: &str = "https://api.github.com";

/// Current state of one remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Raw file body.
    pub content: Vec<u8>,
    /// Cheap validator (an `ETag`). May change while the content does not.
    pub etag: String,
    /// Content fingerprint. Changes if and only if the file bytes change.
    pub sha: String,
}

/// Retrieves files addressed by a [`RepositoryRef`].
///
/// Implementations may use `prior_etag` to avoid transferring an unchanged body,
/// but must still return the authoritative `sha` of the current content.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the file at `reference`.
    ///
    /// Fails with [`Error::ReferenceNotFound`] when the coordinate does not resolve
    /// to a file, and with a transport error for everything else.
    async fn fetch(&self, reference: &RepositoryRef, prior_etag: Option<&str>)
    -> Result<FetchResult>;
}

/// HTTP client for the GitHub contents API.
///
/// Requests are always unconditional. A `304 Not Modified` would only vouch for
/// the validator, and the sha recorded next to it still has to come from a full
/// response, so `If-None-Match` would cost a second round trip per unchanged
/// file instead of saving one. The cached etag passed to
/// [`ContentFetcher::fetch`] is therefore ignored.
pub struct GithubFetcher {
    client: Client,
    api_url: Option<Url>,
    token: Option<String>,
}

impl GithubFetcher {
    /// Creates a fetcher for public GitHub with default settings.
    pub fn new() -> Result<Self> {
        Self::from_config(&GithubConfig::default())
    }

    /// Creates a fetcher from the `[github]` configuration table.
    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .gzip(true)
            .brotli(true)
            .build()?;

        let api_url = match config.api_url.as_deref() {
            Some(raw) => Some(
                Url::parse(raw.trim_end_matches('/'))
                    .map_err(|e| Error::Config(format!("Invalid github.api_url '{raw}': {e}")))?,
            ),
            None => None,
        };

        Ok(Self {
            client,
            api_url,
            token: config.token.clone(),
        })
    }

    /// Base API URL used for a reference's host.
    ///
    /// `github.com` maps to `api.github.com`; any other host is assumed to be a
    /// GitHub Enterprise install serving the API under `/api/v3`.
    pub fn api_base(&self, reference: &RepositoryRef) -> Result<Url> {
        if let Some(url) = &self.api_url {
            return Ok(url.clone());
        }
        let raw = if reference.host == PUBLIC_GITHUB_HOST {
            PUBLIC_GITHUB_API.to_string()
        } else {
            format!("{}://{}/api/v3", reference.scheme, reference.host)
        };
        Url::parse(&raw).map_err(|_| Error::InvalidReferenceUrl(raw))
    }

    /// `{api}/repos/{owner}/{repo}/contents/{path}?ref={ref}` with every
    /// component percent-encoded.
    pub fn contents_url(&self, reference: &RepositoryRef) -> Result<Url> {
        let mut url = self.api_base(reference)?;
        let base = url.to_string();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::Config(format!("API base cannot carry a path: {base}")))?;
            segments.pop_if_empty();
            segments.extend(["repos", &reference.owner, &reference.repo, "contents"]);
            segments.extend(reference.path.trim_end_matches('/').split('/'));
        }
        url.query_pairs_mut()
            .append_pair("ref", &reference.git_ref);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn request_contents(&self, url: &Url) -> Result<(ContentsEntry, Option<String>)> {
        let response = self
            .authorized(self.client.get(url.clone()).header(ACCEPT, GITHUB_JSON))
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(Error::ReferenceNotFound(format!(
                "No file at '{url}'. Check the owner, repository, ref and path"
            )));
        }
        if !status.is_success() {
            return Err(Error::TransportStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);

        let body = response.bytes().await?;
        let entry = parse_contents(url, &body)?;
        Ok((entry, etag))
    }

    async fn download_raw(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .authorized(self.client.get(url).header(ACCEPT, GITHUB_RAW))
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::ReferenceNotFound(format!("No file at '{url}'")));
        }
        if !status.is_success() {
            return Err(Error::TransportStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ContentFetcher for GithubFetcher {
    async fn fetch(
        &self,
        reference: &RepositoryRef,
        _prior_etag: Option<&str>,
    ) -> Result<FetchResult> {
        let url = self.contents_url(reference)?;
        let (entry, etag) = self.request_contents(&url).await?;

        let content = match entry.inline_content(&url)? {
            Some(content) => content,
            None => {
                let download_url =
                    entry
                        .download_url
                        .as_deref()
                        .ok_or_else(|| Error::MalformedResponse {
                            url: url.to_string(),
                            reason: "file has no inline content and no download_url".to_string(),
                        })?;
                debug!("Downloading large file body from {}", download_url);
                self.download_raw(download_url).await?
            },
        };

        let etag = etag
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| entry.sha.clone());

        info!("Fetched {} bytes from {}", content.len(), reference);

        Ok(FetchResult {
            content,
            etag,
            sha: entry.sha,
        })
    }
}

/// The subset of a contents API object we rely on.
#[derive(Debug, Deserialize)]
struct ContentsEntry {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

impl ContentsEntry {
    /// Decoded inline body, or `None` when the API left it out (files over 1 MB).
    fn inline_content(&self, url: &Url) -> Result<Option<Vec<u8>>> {
        let raw = self.content.as_deref().unwrap_or_default();
        let encoding = self.encoding.as_deref().unwrap_or("base64");

        if raw.is_empty() || encoding == "none" {
            return Ok(if self.size == 0 { Some(Vec::new()) } else { None });
        }
        if encoding != "base64" {
            return Err(Error::MalformedResponse {
                url: url.to_string(),
                reason: format!("unsupported content encoding '{encoding}'"),
            });
        }

        let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map(Some)
            .map_err(|e| Error::MalformedResponse {
                url: url.to_string(),
                reason: format!("invalid base64 content: {e}"),
            })
    }
}

fn parse_contents(url: &Url, body: &[u8]) -> Result<ContentsEntry> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| Error::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if value.is_array() {
        return Err(Error::ReferenceNotFound(format!(
            "'{url}' is a directory, not a file"
        )));
    }

    let entry: ContentsEntry =
        serde_json::from_value(value).map_err(|e| Error::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if entry.kind != "file" {
        return Err(Error::ReferenceNotFound(format!(
            "'{url}' is a {}, not a file",
            entry.kind
        )));
    }
    if entry.sha.is_empty() {
        return Err(Error::MalformedResponse {
            url: url.to_string(),
            reason: "file object without sha".to_string(),
        });
    }
    Ok(entry)
}
