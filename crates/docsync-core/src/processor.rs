//! Page-level processing: reconcile each language of a page and report the
//! page to the model.
//!
//! Languages of one page and distinct pages both own disjoint cache slots, so
//! they are processed concurrently. The model is the only shared state.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::fetcher::ContentFetcher;
use crate::model::{Model, PageMeta};
use crate::page::Page;
use crate::reconcile::{Outcome, Reconciled, Reconciler};
use crate::{Error, LanguageFailure, RepositoryRef, Result};

/// Totals of a multi-page run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Pages for which every requested language reconciled.
    pub processed: usize,
    /// Pages that failed, keyed by page URL.
    pub failed: Vec<(String, Error)>,
}

impl RunSummary {
    /// Whether every page succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives reconciliation for whole pages.
pub struct PageProcessor<F, S> {
    reconciler: Reconciler<F, S>,
}

impl<F, S> PageProcessor<F, S>
where
    F: ContentFetcher,
    S: CacheStore,
{
    /// Creates a processor over a fetcher and a cache store.
    pub fn new(fetcher: Arc<F>, store: Arc<S>) -> Self {
        Self {
            reconciler: Reconciler::new(fetcher, store),
        }
    }

    /// The underlying reconciler.
    pub fn reconciler(&self) -> &Reconciler<F, S> {
        &self.reconciler
    }

    /// Reconcile every language of `page` listed in `languages`.
    ///
    /// Languages without a `sourceUrl` are skipped. Each processed language
    /// gets its `contentFile` set. If at least one language succeeded the
    /// page is reported to `model` as added or modified according to the
    /// most significant outcome; nothing is reported when all are unchanged.
    ///
    /// Returns the page outcome, or `None` when no language was processed.
    /// Any language failure turns the result into [`Error::PageFailed`],
    /// after the successful languages have been applied and reported.
    pub async fn process_page(
        &self,
        model: &Model,
        page: &mut Page,
        languages: &[String],
    ) -> Result<Option<Outcome>> {
        let jobs: Vec<(String, String)> = languages
            .iter()
            .filter_map(|language| {
                page.source_url(language)
                    .map(|source| (language.clone(), source.to_string()))
            })
            .collect();

        if jobs.is_empty() {
            debug!("{}: no language with a source URL", page.url);
            return Ok(None);
        }

        let page_url = page.url.clone();
        let results = join_all(jobs.into_iter().map(|(language, source)| {
            let page_url = page_url.as_str();
            async move {
                let result = self.reconcile_language(&source, page_url, &language).await;
                (language, result)
            }
        }))
        .await;

        let mut outcome: Option<Outcome> = None;
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();

        for (language, result) in results {
            match result {
                Ok(Reconciled {
                    outcome: language_outcome,
                    content_file,
                }) => {
                    if let Some(entry) = page.language_mut(&language) {
                        entry.content_file = Some(content_file);
                    }
                    outcome = outcome.max(Some(language_outcome));
                    succeeded.push(language);
                },
                Err(error) => {
                    warn!("{} [{}]: {}", page_url, language, error);
                    failures.push(LanguageFailure { language, error });
                },
            }
        }

        if let Some(outcome) = outcome {
            let title = primary_title(page, languages, &succeeded);
            match outcome {
                Outcome::Added => {
                    info!("Added {}", page_url);
                    model.page_added(PageMeta::doc(page_url.clone(), title));
                },
                Outcome::Modified => {
                    info!("Modified {}", page_url);
                    model.page_modified(PageMeta::doc(page_url.clone(), title));
                },
                Outcome::Unchanged => debug!("Unchanged {}", page_url),
            }
        }

        if failures.is_empty() {
            Ok(outcome)
        } else {
            Err(Error::PageFailed {
                url: page_url,
                failures,
            })
        }
    }

    /// Process many pages, at most `concurrency` at a time.
    ///
    /// A failing page never stops the others; its error is collected in the
    /// returned summary.
    pub async fn process_pages(
        &self,
        model: &Model,
        pages: &mut [Page],
        languages: &[String],
        concurrency: usize,
    ) -> RunSummary {
        let mut results = stream::iter(pages.iter_mut())
            .map(|page| async move {
                let result = self.process_page(model, page, languages).await;
                (page.url.clone(), result)
            })
            .buffer_unordered(concurrency.max(1));

        let mut summary = RunSummary::default();
        while let Some((url, result)) = results.next().await {
            match result {
                Ok(_) => summary.processed += 1,
                Err(error) => summary.failed.push((url, error)),
            }
        }

        info!(
            "Processed {} pages, {} failed",
            summary.processed,
            summary.failed.len()
        );
        summary
    }

    async fn reconcile_language(
        &self,
        source_url: &str,
        page_url: &str,
        language: &str,
    ) -> Result<Reconciled> {
        let reference = RepositoryRef::parse(source_url)?;
        self.reconciler
            .reconcile(&reference, page_url, language)
            .await
    }
}

/// Title of the first requested language, falling back to the first
/// reconciled language that has one.
fn primary_title(page: &Page, languages: &[String], succeeded: &[String]) -> Option<String> {
    languages
        .first()
        .and_then(|language| page.title(language))
        .or_else(|| {
            languages
                .iter()
                .filter(|language| succeeded.contains(language))
                .find_map(|language| page.title(language))
        })
        .map(str::to_string)
}
