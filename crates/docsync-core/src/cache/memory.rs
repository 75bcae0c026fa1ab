use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{CacheKey, CacheRecord, CacheStore};
use crate::{Error, Result};

/// Root reported for content paths of the in-memory store.
const MEMORY_ROOT: &str = "memory://cache";

/// Cache store kept entirely in memory.
///
/// Useful for dry runs and tests. Records and bodies are swapped in under one
/// lock, so `put` is atomic with respect to `get`.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    slots: Mutex<HashMap<CacheKey, (CacheRecord, Vec<u8>)>>,
    writes: Mutex<usize>,
}

impl MemoryCacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Content body stored for a slot.
    pub fn content(&self, page_url: &str, language: &str) -> Option<Vec<u8>> {
        self.slots()
            .get(&CacheKey::new(page_url, language))
            .map(|(_, body)| body.clone())
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rewrite the record of an existing slot in place, without touching its
    /// body or the write counter. Returns whether the slot existed.
    pub fn edit_record<F>(&self, page_url: &str, language: &str, edit: F) -> bool
    where
        F: FnOnce(&mut CacheRecord),
    {
        match self.slots().get_mut(&CacheKey::new(page_url, language)) {
            Some((record, _)) => {
                edit(record);
                true
            },
            None => false,
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, (CacheRecord, Vec<u8>)>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, page_url: &str, language: &str) -> Result<Option<CacheRecord>> {
        let key = CacheKey::new(page_url, language);
        match self.slots().get(&key) {
            Some((record, _)) => match record.defect() {
                Some(defect) => Err(Error::CorruptCacheRecord {
                    path: PathBuf::from(MEMORY_ROOT).join(key.record_file()),
                    reason: defect.to_string(),
                }),
                None => Ok(Some(record.clone())),
            },
            None => Ok(None),
        }
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
        self.slots().insert(
            CacheKey::new(page_url, language),
            (record.clone(), content.to_vec()),
        );
        *self.writes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }

    fn content_path(&self, page_url: &str, language: &str) -> PathBuf {
        PathBuf::from(MEMORY_ROOT).join(CacheKey::new(page_url, language).content_file())
    }
}
