//! Reconciliation of a fresh fetch against the cached record of a slot.
//!
//! The `etag` is a hint and may drift without the content changing; only the
//! `sha` decides whether a slot is added, modified or unchanged.
//!
//! | cached record | fetched `sha` vs cached | outcome     | cache write |
//! |---------------|-------------------------|-------------|-------------|
//! | absent        | n/a                     | `Added`     | yes         |
//! | present       | equal                   | `Unchanged` | no          |
//! | present       | different               | `Modified`  | yes         |

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheRecord, CacheStore};
use crate::fetcher::ContentFetcher;
use crate::{RepositoryRef, Result};

/// Classification of one reconciled slot.
///
/// Variants are ordered by significance, so the outcome of several slots is
/// their maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Cached content is current.
    Unchanged,
    /// Cached content was replaced.
    Modified,
    /// First observation of this slot.
    Added,
}

/// Result of reconciling one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// What happened to the slot.
    pub outcome: Outcome,
    /// Where the slot's content now lives; becomes `contentFile` on the page.
    pub content_file: PathBuf,
}

/// Compares remote state with the cache and applies the minimal update.
pub struct Reconciler<F, S> {
    fetcher: Arc<F>,
    store: Arc<S>,
}

impl<F, S> Clone for Reconciler<F, S> {
    fn clone(&self) -> Self {
        Self {
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
        }
    }
}

impl<F, S> Reconciler<F, S>
where
    F: ContentFetcher,
    S: CacheStore,
{
    /// Creates a reconciler over a fetcher and a cache store.
    pub fn new(fetcher: Arc<F>, store: Arc<S>) -> Self {
        Self { fetcher, store }
    }

    /// The cache store this reconciler writes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Reconcile the slot `(page_url, language)` with the file at `reference`.
    ///
    /// Fetch errors propagate unchanged and leave the cache untouched. A
    /// matching `sha` never causes a write, even if the `etag` moved.
    pub async fn reconcile(
        &self,
        reference: &RepositoryRef,
        page_url: &str,
        language: &str,
    ) -> Result<Reconciled> {
        let prior = self.store.get(page_url, language)?;

        let fetched = self
            .fetcher
            .fetch(reference, prior.as_ref().map(|record| record.etag.as_str()))
            .await?;

        let content_file = self.store.content_path(page_url, language);

        let outcome = match prior {
            Some(prior) if prior.sha == fetched.sha => {
                if prior.etag != fetched.etag {
                    debug!(
                        "etag drift for {} [{}] with identical sha; keeping cache",
                        page_url, language
                    );
                }
                Outcome::Unchanged
            },
            prior => {
                let record = CacheRecord::new(fetched.sha, fetched.etag);
                self.store
                    .put(page_url, language, &record, &fetched.content)?;
                if prior.is_some() {
                    Outcome::Modified
                } else {
                    Outcome::Added
                }
            },
        };

        debug!("{} [{}] reconciled as {:?}", page_url, language, outcome);
        Ok(Reconciled {
            outcome,
            content_file,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
pub(crate) mod tests {
    use super::*;
    use crate::Error;
    use crate::cache::MemoryCacheStore;
    use crate::fetcher::FetchResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fetcher serving one mutable remote state for every reference.
    #[derive(Default)]
    pub(crate) struct MockFetcher {
        state: Mutex<Option<FetchResult>>,
        pub(crate) seen_etags: Mutex<Vec<Option<String>>>,
    }

    impl MockFetcher {
        pub(crate) fn serving(content: &str, sha: &str, etag: &str) -> Self {
            let fetcher = Self::default();
            fetcher.set(content, sha, etag);
            fetcher
        }

        pub(crate) fn set(&self, content: &str, sha: &str, etag: &str) {
            *self.state.lock().unwrap() = Some(FetchResult {
                content: content.as_bytes().to_vec(),
                sha: sha.to_string(),
                etag: etag.to_string(),
            });
        }

        pub(crate) fn remove(&self) {
            *self.state.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl ContentFetcher for MockFetcher {
        async fn fetch(
            &self,
            reference: &RepositoryRef,
            prior_etag: Option<&str>,
        ) -> Result<FetchResult> {
            self.seen_etags
                .lock()
                .unwrap()
                .push(prior_etag.map(str::to_string));
            self.state
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::ReferenceNotFound(reference.to_string()))
        }
    }

    /// Store that reads from memory but refuses every write.
    #[derive(Default)]
    pub(crate) struct ReadOnlyStore {
        pub(crate) inner: MemoryCacheStore,
    }

    impl CacheStore for ReadOnlyStore {
        fn get(&self, page_url: &str, language: &str) -> Result<Option<CacheRecord>> {
            self.inner.get(page_url, language)
        }

        fn put(&self, _: &str, _: &str, _: &CacheRecord, _: &[u8]) -> Result<()> {
            Err(Error::CacheWrite("No space left on device".to_string()))
        }

        fn content_path(&self, page_url: &str, language: &str) -> PathBuf {
            self.inner.content_path(page_url, language)
        }
    }

    pub(crate) fn sample_ref() -> RepositoryRef {
        RepositoryRef::parse(
            "https://github.com/bem/bem-method/tree/bem-info-data/method/index/index.en.md",
        )
        .unwrap()
    }

    fn setup(
        fetcher: MockFetcher,
    ) -> (
        Reconciler<MockFetcher, MemoryCacheStore>,
        Arc<MockFetcher>,
        Arc<MemoryCacheStore>,
    ) {
        let fetcher = Arc::new(fetcher);
        let store = Arc::new(MemoryCacheStore::new());
        (
            Reconciler::new(Arc::clone(&fetcher), Arc::clone(&store)),
            fetcher,
            store,
        )
    }

    #[test]
    fn test_outcome_ordering() {
        assert!(Outcome::Added > Outcome::Modified);
        assert!(Outcome::Modified > Outcome::Unchanged);
        assert_eq!(
            [Outcome::Unchanged, Outcome::Added, Outcome::Modified]
                .into_iter()
                .max(),
            Some(Outcome::Added)
        );
    }

    #[tokio::test]
    async fn test_first_then_repeat_is_added_then_unchanged() -> anyhow::Result<()> {
        let (reconciler, fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));

        let first = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;
        assert_eq!(first.outcome, Outcome::Added);
        assert_eq!(first.content_file, store.content_path("/url1", "en"));

        let second = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;
        assert_eq!(second.outcome, Outcome::Unchanged);
        assert_eq!(second.content_file, first.content_file);

        assert_eq!(store.write_count(), 1);
        assert_eq!(
            *fetcher.seen_etags.lock().unwrap(),
            vec![None, Some("etag-1".to_string())]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_etag_drift_alone_is_unchanged_without_write() -> anyhow::Result<()> {
        let (reconciler, fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));
        reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        fetcher.set("# A", "sha-1", "etag-2");
        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        assert_eq!(result.outcome, Outcome::Unchanged);
        assert_eq!(store.write_count(), 1);
        // The stored hint is deliberately left as it was.
        assert_eq!(store.get("/url1", "en")?.unwrap().etag, "etag-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_etag_drift_is_unchanged() -> anyhow::Result<()> {
        let (reconciler, _fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));
        reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        store.edit_record("/url1", "en", |record| record.etag.push('a'));
        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        assert_eq!(result.outcome, Outcome::Unchanged);
        assert_eq!(store.write_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sha_change_is_modified_and_overwrites() -> anyhow::Result<()> {
        let (reconciler, fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));
        reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        // Same etag, new content: the hash alone decides.
        fetcher.set("# B", "sha-2", "etag-1");
        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        assert_eq!(result.outcome, Outcome::Modified);
        assert_eq!(store.write_count(), 2);
        let record = store.get("/url1", "en")?.unwrap();
        assert_eq!(record.sha, "sha-2");
        assert_eq!(store.content("/url1", "en").unwrap(), b"# B");

        let again = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;
        assert_eq!(again.outcome, Outcome::Unchanged);
        Ok(())
    }

    #[tokio::test]
    async fn test_cached_sha_tampering_is_modified() -> anyhow::Result<()> {
        let (reconciler, _fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));
        reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        store.edit_record("/url1", "en", |record| record.sha.push('a'));
        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        assert_eq!(result.outcome, Outcome::Modified);
        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_reference_leaves_cache_untouched() -> anyhow::Result<()> {
        let (reconciler, fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));
        reconciler.reconcile(&sample_ref(), "/url1", "en").await?;

        fetcher.remove();
        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await;

        assert!(matches!(result, Err(Error::ReferenceNotFound(_))));
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-1");
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_reference_on_first_run_writes_nothing() -> anyhow::Result<()> {
        let (reconciler, _fetcher, store) = setup(MockFetcher::default());
        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await;

        assert!(matches!(result, Err(Error::ReferenceNotFound(_))));
        assert!(store.get("/url1", "en")?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_record_is_reported_not_refetched() -> anyhow::Result<()> {
        let (reconciler, fetcher, store) = setup(MockFetcher::serving("# A", "sha-1", "etag-1"));
        reconciler.reconcile(&sample_ref(), "/url1", "en").await?;
        store.edit_record("/url1", "en", |record| record.sha.clear());

        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await;
        assert!(matches!(result, Err(Error::CorruptCacheRecord { .. })));
        assert_eq!(fetcher.seen_etags.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_write_on_first_run_is_an_error() -> anyhow::Result<()> {
        let store = Arc::new(ReadOnlyStore::default());
        let reconciler = Reconciler::new(
            Arc::new(MockFetcher::serving("# A", "sha-1", "etag-1")),
            Arc::clone(&store),
        );

        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await;
        assert!(matches!(result, Err(Error::CacheWrite(_))));
        assert!(store.get("/url1", "en")?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_write_on_change_keeps_prior_record() -> anyhow::Result<()> {
        let store = Arc::new(ReadOnlyStore::default());
        store
            .inner
            .put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"# A")?;
        let reconciler = Reconciler::new(
            Arc::new(MockFetcher::serving("# B", "sha-2", "etag-2")),
            Arc::clone(&store),
        );

        let result = reconciler.reconcile(&sample_ref(), "/url1", "en").await;
        assert!(matches!(result, Err(Error::CacheWrite(_))));
        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-1");
        assert_eq!(store.inner.content("/url1", "en").unwrap(), b"# A");
        Ok(())
    }
}
