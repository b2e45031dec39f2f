//! In-Memory Adapters
//!
//! Process-local implementations of the cache provider and durable store
//! ports. Used by the test suite and by hosts embedding the crate without
//! external infrastructure. Both keep atomic operation counters and a
//! single-shot failure injection hook for exercising error paths.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{AttrMap, CacheKey, CacheProvider, DurableStore, RecordId};
use crate::error::{Error, Result};

// =============================================================================
// Cache Provider
// =============================================================================

/// In-memory cache provider.
///
/// One attribute mapping per rendered key, last writer wins. DashMap for
/// lock-free concurrent access.
#[derive(Debug, Default)]
pub struct InMemoryCacheProvider {
    /// Entries by rendered cache key
    entries: DashMap<String, AttrMap>,
    /// Read operations
    reads: AtomicU64,
    /// Write operations
    writes: AtomicU64,
    /// Fail the next write with a provider error
    fail_next_write: AtomicBool,
}

impl InMemoryCacheProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entry for a key, if any.
    pub fn snapshot(&self, key: &CacheKey) -> Option<AttrMap> {
        self.entries.get(key.as_str()).map(|e| e.clone())
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of reads served.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of writes accepted.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Make the next `write` call fail.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl CacheProvider for InMemoryCacheProvider {
    async fn read(&self, key: &CacheKey) -> Result<Option<AttrMap>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.get(key.as_str()).map(|e| e.clone()))
    }

    async fn write(&self, key: &CacheKey, values: &AttrMap) -> Result<()> {
        if self.fail_next_write.swap(false, Ordering::Relaxed) {
            return Err(Error::Provider("injected write failure".to_string()));
        }
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(key.as_str().to_string(), values.clone());
        Ok(())
    }
}

// =============================================================================
// Durable Store
// =============================================================================

/// In-memory durable store.
///
/// Keyed rows; `persist` upserts only the given changed fields, leaving
/// other columns of the row untouched.
#[derive(Debug, Default)]
pub struct InMemoryDurableStore {
    /// Rows by record identity
    rows: DashMap<String, AttrMap>,
    /// Fetch operations
    fetches: AtomicU64,
    /// Successful persist operations
    persists: AtomicU64,
    /// Fail the next persist with a store error
    fail_next_persist: AtomicBool,
}

impl InMemoryDurableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing the persist path.
    pub fn insert_row(&self, id: impl Into<RecordId>, row: AttrMap) {
        self.rows.insert(id.into().as_str().to_string(), row);
    }

    /// Raw row for a record identity, if any.
    pub fn row(&self, id: &RecordId) -> Option<AttrMap> {
        self.rows.get(id.as_str()).map(|r| r.clone())
    }

    /// Number of fetches served.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Number of persists applied.
    pub fn persists(&self) -> u64 {
        self.persists.load(Ordering::Relaxed)
    }

    /// Make the next `persist` call fail.
    pub fn fail_next_persist(&self) {
        self.fail_next_persist.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl DurableStore for InMemoryDurableStore {
    async fn fetch(&self, id: &RecordId) -> Result<Option<AttrMap>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        Ok(self.rows.get(id.as_str()).map(|r| r.clone()))
    }

    async fn persist(&self, id: &RecordId, changes: &AttrMap) -> Result<()> {
        if self.fail_next_persist.swap(false, Ordering::Relaxed) {
            return Err(Error::Store("injected persist failure".to_string()));
        }
        self.persists.fetch_add(1, Ordering::Relaxed);
        let mut row = self
            .rows
            .entry(id.as_str().to_string())
            .or_insert_with(AttrMap::new);
        for (field, value) in changes {
            row.insert(field.clone(), value.clone());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;

    fn map(entries: &[(&str, Value)]) -> AttrMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_provider_read_write() {
        let provider = InMemoryCacheProvider::new();
        let key = CacheKey::derive("device", &RecordId::new("1"));

        assert_eq!(provider.read(&key).await.unwrap(), None);

        let entry = map(&[("lat", Value::Float(10.302))]);
        provider.write(&key, &entry).await.unwrap();
        assert_eq!(provider.read(&key).await.unwrap(), Some(entry));
        assert_eq!(provider.reads(), 2);
        assert_eq!(provider.writes(), 1);
    }

    #[tokio::test]
    async fn test_provider_last_writer_wins() {
        let provider = InMemoryCacheProvider::new();
        let key = CacheKey::derive("device", &RecordId::new("1"));

        provider
            .write(&key, &map(&[("lat", Value::Float(1.0))]))
            .await
            .unwrap();
        provider
            .write(&key, &map(&[("lat", Value::Float(2.0))]))
            .await
            .unwrap();

        let entry = provider.read(&key).await.unwrap().unwrap();
        assert_eq!(entry.get("lat"), Some(&Value::Float(2.0)));
    }

    #[tokio::test]
    async fn test_provider_clear() {
        let provider = InMemoryCacheProvider::new();
        let key = CacheKey::derive("device", &RecordId::new("1"));

        provider
            .write(&key, &map(&[("lat", Value::Float(1.0))]))
            .await
            .unwrap();
        provider.clear();
        assert_eq!(provider.read(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_provider_failure_injection_is_single_shot() {
        let provider = InMemoryCacheProvider::new();
        let key = CacheKey::derive("device", &RecordId::new("1"));
        let entry = map(&[("lat", Value::Float(1.0))]);

        provider.fail_next_write();
        assert!(provider.write(&key, &entry).await.is_err());
        assert!(provider.write(&key, &entry).await.is_ok());
    }

    #[tokio::test]
    async fn test_store_fetch_missing() {
        let store = InMemoryDurableStore::new();
        assert_eq!(store.fetch(&RecordId::new("1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_persist_upserts_changed_fields_only() {
        let store = InMemoryDurableStore::new();
        let id = RecordId::new("1");

        store
            .persist(
                &id,
                &map(&[("lat", Value::Float(1.0)), ("lon", Value::Float(2.0))]),
            )
            .await
            .unwrap();
        store
            .persist(&id, &map(&[("lat", Value::Float(9.0))]))
            .await
            .unwrap();

        let row = store.row(&id).unwrap();
        assert_eq!(row.get("lat"), Some(&Value::Float(9.0)));
        assert_eq!(row.get("lon"), Some(&Value::Float(2.0)));
        assert_eq!(store.persists(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_injection_is_single_shot() {
        let store = InMemoryDurableStore::new();
        let id = RecordId::new("1");
        let changes = map(&[("lat", Value::Float(1.0))]);

        store.fail_next_persist();
        assert!(store.persist(&id, &changes).await.is_err());
        assert_eq!(store.persists(), 0);
        assert!(store.persist(&id, &changes).await.is_ok());
        assert_eq!(store.persists(), 1);
    }
}
