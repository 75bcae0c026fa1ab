//! Configuration for docsync runs.
//!
//! Configuration is stored in TOML and every table is optional:
//!
//! ```toml
//! [cache]
//! dir = ".builder/cache"
//!
//! [github]
//! api_url = "https://github.example.com/api/v3"
//! timeout_secs = 30
//!
//! [run]
//! languages = ["en", "ru"]
//! concurrency = 8
//! ```
//!
//! ## Lookup order
//!
//! 1. An explicit path passed to [`Config::load`]
//! 2. The `DOCSYNC_CONFIG` environment variable
//! 3. `config.toml` in the platform config directory
//!
//! When no file is found the defaults are used. Environment variables
//! (`DOCSYNC_CACHE_DIR`, `DOCSYNC_API_URL`, `DOCSYNC_GITHUB_TOKEN`, `GITHUB_TOKEN`)
//! are applied on top of whatever was loaded.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Default cache root, relative to the working directory of the build.
pub const DEFAULT_CACHE_DIR: &str = ".builder/cache";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local cache settings.
    pub cache: CacheConfig,
    /// Remote host settings.
    pub github: GithubConfig,
    /// Defaults for a processing run.
    pub run: RunConfig,
}

/// Where cached records and content bodies live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory.
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

/// GitHub (or GitHub Enterprise) API access.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// API base URL used for every host. When unset it is derived per host.
    pub api_url: Option<String>,
    /// Access token sent as a bearer token.
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token: None,
            timeout_secs: 30,
            user_agent: concat!("docsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// Hand-written so tokens never end up in debug logs.
impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Defaults for a processing run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Languages processed for each page, in priority order.
    pub languages: Vec<String>,
    /// Number of pages processed at once.
    pub concurrency: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            concurrency: 8,
        }
    }
}

impl Config {
    /// Load configuration and apply environment overrides.
    ///
    /// A missing file is not an error; a file that exists but does not parse is.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Some(path) = non_empty_env("DOCSYNC_CONFIG") {
            return Ok(Some(PathBuf::from(path)));
        }

        Ok(Self::default_path().filter(|path| path.exists()))
    }

    /// Platform configuration file location, e.g. `~/.config/docsync/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "docsync", "docsync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(dir) = get("DOCSYNC_CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(api_url) = get("DOCSYNC_API_URL") {
            self.github.api_url = Some(api_url);
        }
        if let Some(token) = get("DOCSYNC_GITHUB_TOKEN").or_else(|| get("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.cache.dir.as_os_str().is_empty() {
            return Err(Error::Config("cache.dir must not be empty".into()));
        }
        if self.github.timeout_secs == 0 {
            return Err(Error::Config("github.timeout_secs must be positive".into()));
        }
        if self.run.concurrency == 0 {
            return Err(Error::Config("run.concurrency must be positive".into()));
        }
        if self.run.languages.iter().any(|lang| lang.trim().is_empty()) {
            return Err(Error::Config("run.languages must not contain blanks".into()));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
