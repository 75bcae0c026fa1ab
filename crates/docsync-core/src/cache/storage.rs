//! Filesystem-backed cache store.
//!
//! Writes go through a per-slot lock file and temp files that are renamed into
//! place, so a reader (or the next run after a crash) only ever observes a
//! complete record next to the body it describes, or no record at all.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use super::{CacheKey, CacheRecord, CacheStore};
use crate::{Error, Result};

/// Cache store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    /// Creates a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the record file for a slot.
    pub fn record_path(&self, page_url: &str, language: &str) -> PathBuf {
        self.root
            .join(CacheKey::new(page_url, language).record_file())
    }

    /// Read the cached content body for a slot.
    pub fn load_content(&self, page_url: &str, language: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.content_path(page_url, language))?)
    }

    /// Delete one slot. Returns whether a record was present.
    pub fn remove(&self, page_url: &str, language: &str) -> Result<bool> {
        let key = CacheKey::new(page_url, language);
        let record = self.root.join(key.record_file());
        let existed = record.exists();

        for path in [record, self.root.join(key.content_file())] {
            match fs::remove_file(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == io::ErrorKind::NotFound => {},
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(existed)
    }

    /// Delete the whole cache root.
    pub fn clear(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
            debug!("Cleared cache at {}", self.root.display());
        }
        Ok(())
    }

    /// Number of slots that currently hold a record.
    pub fn slot_count(&self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut count = 0;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "json") {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn write_slot(&self, key: &CacheKey, record: &CacheRecord, content: &[u8]) -> Result<()> {
        let dir = self.root.join(key.page_dir());
        fs::create_dir_all(&dir)
            .map_err(|e| Error::CacheWrite(format!("Failed to create {}: {e}", dir.display())))?;

        // Keep this handle alive until both renames are done.
        let lock_path = self.root.join(key.lock_file());
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::CacheWrite(format!("Failed to open {}: {e}", lock_path.display())))?;
        lock.lock_exclusive()
            .map_err(|e| Error::CacheWrite(format!("Failed to lock {}: {e}", lock_path.display())))?;

        let record_path = self.root.join(key.record_file());
        let content_path = self.root.join(key.content_file());
        // The record goes last: a slot is only ever read through its record.
        let files = [
            Staged::new(content_path, "md"),
            Staged::new(record_path.clone(), "json"),
        ];

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| Error::CacheWrite(format!("Failed to serialize record: {e}")))?;

        let staged = write_synced(&files[0].tmp, content)
            .and_then(|()| write_synced(&files[1].tmp, &json));
        if let Err(e) = staged {
            discard(&[&files[0].tmp, &files[1].tmp]);
            return Err(Error::CacheWrite(format!(
                "Failed to stage cache entry in {}: {e}",
                dir.display()
            )));
        }

        commit(&files).map_err(|e| {
            Error::CacheWrite(format!("Failed to commit cache entry in {}: {e}", dir.display()))
        })?;

        drop(lock);
        debug!("Saved cache entry {}", record_path.display());
        Ok(())
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, page_url: &str, language: &str) -> Result<Option<CacheRecord>> {
        let key = CacheKey::new(page_url, language);
        let path = self.root.join(key.record_file());

        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let corrupt = |reason: String| Error::CorruptCacheRecord {
            path: path.clone(),
            reason,
        };

        let record: CacheRecord =
            serde_json::from_slice(&raw).map_err(|e| corrupt(format!("invalid JSON: {e}")))?;
        if let Some(defect) = record.defect() {
            return Err(corrupt(defect.to_string()));
        }
        if !self.root.join(key.content_file()).is_file() {
            return Err(corrupt("content body is missing".to_string()));
        }

        Ok(Some(record))
    }

    fn put(
        &self,
        page_url: &str,
        language: &str,
        record: &CacheRecord,
        content: &[u8],
    ) -> Result<()> {
        if let Some(defect) = record.defect() {
            return Err(Error::CacheWrite(format!("Refusing to persist record: {defect}")));
        }
        self.write_slot(&CacheKey::new(page_url, language), record, content)
    }

    fn content_path(&self, page_url: &str, language: &str) -> PathBuf {
        self.root
            .join(CacheKey::new(page_url, language).content_file())
    }
}

/// A fully written temp file waiting to replace `target`.
struct Staged {
    target: PathBuf,
    tmp: PathBuf,
    backup: PathBuf,
}

impl Staged {
    fn new(target: PathBuf, extension: &str) -> Self {
        Self {
            tmp: target.with_extension(format!("{extension}.tmp")),
            backup: target.with_extension(format!("{extension}.bak")),
            target,
        }
    }
}

/// Move every staged file into place, or none of them.
///
/// Existing targets are set aside (last file first) before anything is placed,
/// so the slot reads as absent rather than as an old record over a new body.
/// On any failure every target is put back the way it was.
fn commit(files: &[Staged]) -> io::Result<()> {
    let mut set_aside: Vec<(&Staged, bool)> = Vec::with_capacity(files.len());

    for file in files.iter().rev() {
        match fs::rename(&file.target, &file.backup) {
            Ok(()) => set_aside.push((file, true)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => set_aside.push((file, false)),
            Err(e) => {
                roll_back(files, &set_aside);
                return Err(e);
            },
        }
    }

    for file in files {
        if let Err(e) = fs::rename(&file.tmp, &file.target) {
            roll_back(files, &set_aside);
            return Err(e);
        }
    }

    for (file, had_target) in &set_aside {
        if *had_target {
            discard(&[&file.backup]);
        }
    }
    Ok(())
}

fn roll_back(files: &[Staged], set_aside: &[(&Staged, bool)]) {
    for (file, had_target) in set_aside {
        if *had_target {
            if let Err(e) = replace(&file.backup, &file.target) {
                warn!(
                    "Failed to restore {} after aborted write: {e}",
                    file.target.display()
                );
            }
        } else {
            discard(&[&file.target]);
        }
    }
    for file in files {
        discard(&[&file.tmp]);
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn replace(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(target_os = "windows")]
    if to.exists() {
        fs::remove_file(to)?;
    }
    fs::rename(from, to)
}

fn discard(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (FsCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FsCacheStore::new(temp_dir.path().join("cache"));
        (store, temp_dir)
    }

    #[test]
    fn test_missing_record_is_absent() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        assert!(store.get("/url1", "en")?.is_none());
        assert!(!store.root().exists(), "get must not create anything");
        Ok(())
    }

    #[test]
    fn test_put_then_get() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        let record = CacheRecord::new("sha-1", "etag-1");
        store.put("/url1", "en", &record, b"# Title\n")?;

        assert_eq!(store.get("/url1", "en")?, Some(record));
        assert_eq!(store.load_content("/url1", "en")?, b"# Title\n");
        assert!(store.root().join("url1/en.json").is_file());
        assert!(store.root().join("url1/en.md").is_file());
        assert!(!store.root().join("url1/en.json.tmp").exists());
        assert!(!store.root().join("url1/en.md.tmp").exists());
        assert!(!store.root().join("url1/en.json.bak").exists());
        assert!(!store.root().join("url1/en.md.bak").exists());
        Ok(())
    }

    #[test]
    fn test_put_overwrites_both_files() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"old")?;
        store.put("/url1", "en", &CacheRecord::new("sha-2", "etag-2"), b"new")?;

        let record = store.get("/url1", "en")?.unwrap();
        assert_eq!(record.sha, "sha-2");
        assert_eq!(record.etag, "etag-2");
        assert_eq!(store.load_content("/url1", "en")?, b"new");
        Ok(())
    }

    #[test]
    fn test_languages_are_disjoint() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-en", "e"), b"en")?;
        store.put("/url1", "ru", &CacheRecord::new("sha-ru", "e"), b"ru")?;

        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-en");
        assert_eq!(store.get("/url1", "ru")?.unwrap().sha, "sha-ru");
        Ok(())
    }

    #[test]
    fn test_content_path_is_pure() {
        let store = FsCacheStore::new("/nonexistent/cache");
        assert_eq!(
            store.content_path("/url1", "en"),
            PathBuf::from("/nonexistent/cache/url1/en.md")
        );
        assert!(!Path::new("/nonexistent/cache").exists());
    }

    #[test]
    fn test_malformed_json_is_corrupt() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"x")?;
        fs::write(store.record_path("/url1", "en"), "{ not json")?;

        match store.get("/url1", "en") {
            Err(Error::CorruptCacheRecord { path, reason }) => {
                assert!(path.ends_with("url1/en.json"));
                assert!(reason.contains("invalid JSON"));
            },
            other => panic!("expected CorruptCacheRecord, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_empty_fields_are_corrupt() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"x")?;
        fs::write(
            store.record_path("/url1", "en"),
            r#"{ "sha": "", "etag": "etag-1" }"#,
        )?;

        assert!(matches!(
            store.get("/url1", "en"),
            Err(Error::CorruptCacheRecord { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_body_is_corrupt() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"x")?;
        fs::remove_file(store.content_path("/url1", "en"))?;

        assert!(matches!(
            store.get("/url1", "en"),
            Err(Error::CorruptCacheRecord { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_extra_keys_are_tolerated() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"x")?;
        fs::write(
            store.record_path("/url1", "en"),
            r#"{
    "sha": "sha-1",
    "etag": "etag-1a",
    "sourceUrl": "https://github.com/o/r/tree/main/a.md"
}"#,
        )?;

        let record = store.get("/url1", "en")?.unwrap();
        assert_eq!(record.etag, "etag-1a");
        assert_eq!(record.fetched_at, None);
        Ok(())
    }

    #[test]
    fn test_put_rejects_defective_record() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        let result = store.put("/url1", "en", &CacheRecord::new("", "etag"), b"x");
        assert!(matches!(result, Err(Error::CacheWrite(_))));
        assert!(store.get("/url1", "en")?.is_none());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_put_leaves_prior_state_intact() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"old")?;

        let dir = store.root().join("url1");
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555))?;
        let result = store.put("/url1", "en", &CacheRecord::new("sha-2", "etag-2"), b"new");
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755))?;

        // Running as root ignores directory permissions; nothing to assert then.
        if result.is_ok() {
            return Ok(());
        }
        assert!(matches!(result, Err(Error::CacheWrite(_))));
        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-1");
        assert_eq!(store.load_content("/url1", "en")?, b"old");
        Ok(())
    }

    #[test]
    fn test_failed_record_commit_restores_old_body() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"old")?;

        let record_path = store.record_path("/url1", "en");
        let files = [
            Staged::new(store.content_path("/url1", "en"), "md"),
            Staged::new(record_path.clone(), "json"),
        ];
        // The body is staged and commits; the record was never staged, so its
        // rename fails after the new body is already in place.
        fs::write(&files[0].tmp, b"new")?;

        assert!(commit(&files).is_err());
        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-1");
        assert_eq!(store.load_content("/url1", "en")?, b"old");
        for file in &files {
            assert!(!file.tmp.exists());
            assert!(!file.backup.exists());
        }
        Ok(())
    }

    #[test]
    fn test_failed_first_put_leaves_slot_absent() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        let dir = store.root().join("url1");
        fs::create_dir_all(&dir)?;

        let files = [
            Staged::new(store.content_path("/url1", "en"), "md"),
            Staged::new(store.record_path("/url1", "en"), "json"),
        ];
        fs::write(&files[0].tmp, b"new")?;

        assert!(commit(&files).is_err());
        assert!(store.get("/url1", "en")?.is_none());
        assert!(!store.content_path("/url1", "en").exists());
        assert!(!files[0].tmp.exists());
        Ok(())
    }

    #[test]
    fn test_distinct_pages_do_not_share_a_slot() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/блок", "en", &CacheRecord::new("sha-a", "etag-a"), b"a.md")?;
        store.put("/мода", "en", &CacheRecord::new("sha-b", "etag-b"), b"b.md")?;
        store.put("/a b", "en", &CacheRecord::new("sha-c", "etag-c"), b"c.md")?;
        store.put("/a_b", "en", &CacheRecord::new("sha-d", "etag-d"), b"d.md")?;

        assert_eq!(store.get("/блок", "en")?.unwrap().sha, "sha-a");
        assert_eq!(store.load_content("/блок", "en")?, b"a.md");
        assert_eq!(store.get("/мода", "en")?.unwrap().sha, "sha-b");
        assert_eq!(store.load_content("/мода", "en")?, b"b.md");
        assert_eq!(store.get("/a b", "en")?.unwrap().sha, "sha-c");
        assert_eq!(store.get("/a_b", "en")?.unwrap().sha, "sha-d");
        assert_ne!(
            store.content_path("/блок", "en"),
            store.content_path("/мода", "en")
        );
        assert_eq!(store.slot_count()?, 4);
        Ok(())
    }

    #[test]
    fn test_stale_backup_reads_as_absent() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"old")?;

        // Simulate a crash between setting the old record aside and committing.
        let record = store.record_path("/url1", "en");
        fs::rename(&record, record.with_extension("json.bak"))?;
        assert!(store.get("/url1", "en")?.is_none());

        store.put("/url1", "en", &CacheRecord::new("sha-2", "etag-2"), b"new")?;
        assert_eq!(store.get("/url1", "en")?.unwrap().sha, "sha-2");
        Ok(())
    }

    #[test]
    fn test_remove_and_clear() -> anyhow::Result<()> {
        let (store, _tmp) = create_test_store();
        store.put("/url1", "en", &CacheRecord::new("sha-1", "etag-1"), b"x")?;
        store.put("/url2", "en", &CacheRecord::new("sha-2", "etag-2"), b"y")?;
        store.put("/url2", "ru", &CacheRecord::new("sha-3", "etag-3"), b"z")?;
        assert_eq!(store.slot_count()?, 3);

        assert!(store.remove("/url1", "en")?);
        assert_eq!(store.slot_count()?, 2);
        assert!(!store.remove("/url1", "en")?);
        assert!(store.get("/url1", "en")?.is_none());
        assert!(store.get("/url2", "en")?.is_some());

        store.clear()?;
        assert!(!store.root().exists());
        assert_eq!(store.slot_count()?, 0);
        assert!(store.get("/url2", "en")?.is_none());
        Ok(())
    }
}
