//! Reconcile a page file against its repository sources

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use docsync_core::{Config, FsCacheStore, GithubFetcher, Model, Page, PageProcessor, RunSummary};
use tracing::{debug, info};

use crate::output::{OutputFormat, write_changes};

/// Arguments of a sync run after CLI parsing.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Page file to read.
    pub pages: PathBuf,
    /// Requested languages; empty means the configured ones.
    pub languages: Vec<String>,
    /// Where to write the updated pages; `None` rewrites the input.
    pub output: Option<PathBuf>,
    /// Page concurrency override.
    pub concurrency: Option<usize>,
    /// Report format.
    pub format: OutputFormat,
}

/// Run a sync over every page of `options.pages`.
///
/// Updated pages are written even when some pages failed, so languages that
/// did reconcile keep their `contentFile`. The command fails afterwards if
/// any page failed.
pub async fn execute(config: &Config, options: SyncOptions) -> Result<()> {
    let languages = effective_languages(&options.languages, &config.run.languages)?;
    let concurrency = options.concurrency.unwrap_or(config.run.concurrency);
    if concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }

    let mut pages = load_pages(&options.pages)?;
    debug!(
        "Loaded {} pages from {}; languages: {}",
        pages.len(),
        options.pages.display(),
        languages.join(",")
    );

    let fetcher = Arc::new(GithubFetcher::from_config(&config.github)?);
    let store = Arc::new(FsCacheStore::new(&config.cache.dir));
    let processor = PageProcessor::new(fetcher, store);

    let model = Model::new();
    let summary = processor
        .process_pages(&model, &mut pages, &languages, concurrency)
        .await;

    let target = options.output.as_deref().unwrap_or(&options.pages);
    save_pages(target, &pages)?;
    info!("Wrote {} pages to {}", pages.len(), target.display());

    write_changes(io::stdout().lock(), &model.into_changes(), options.format)?;
    report_failures(&summary);

    if !summary.is_success() {
        bail!(
            "{} of {} page(s) failed to sync",
            summary.failed.len(),
            pages.len()
        );
    }
    Ok(())
}

fn effective_languages(requested: &[String], configured: &[String]) -> Result<Vec<String>> {
    let source = if requested.is_empty() {
        configured
    } else {
        requested
    };
    let mut languages: Vec<String> = Vec::with_capacity(source.len());
    for language in source.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        if !languages.iter().any(|known| known == language) {
            languages.push(language.to_string());
        }
    }
    if languages.is_empty() {
        bail!("No languages to process; pass --languages or set run.languages");
    }
    Ok(languages)
}

fn load_pages(path: &Path) -> Result<Vec<Page>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read pages from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of pages", path.display()))
}

/// Replace `path` with the serialized pages via a sibling temp file.
fn save_pages(path: &Path, pages: &[Page]) -> Result<()> {
    let mut json = serde_json::to_string_pretty(pages)?;
    json.push('\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

fn report_failures(summary: &RunSummary) {
    for (url, error) in &summary.failed {
        eprintln!("{} {}: {}", "✗".red(), url, error);
    }
}
