//! Cache-Backed Record
//!
//! Wraps one durable row with per-field dirty tracking and a memoized
//! cache entry. Setters for cached attributes write through to the entry
//! immediately; the save path always writes the entry to the provider and
//! lets the flush policy decide whether the durable write proceeds.
//!
//! When the durable write is suppressed, the cached attributes are rolled
//! back to their "was" values around the inner persistence call and
//! restored afterwards, so the durable row keeps its old values while the
//! in-memory record keeps the new ones.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::entry;
use super::manager::CacheContext;
use super::policy::FlushDecision;
use crate::domain::{AttrMap, RecordId, Value};
use crate::error::{Error, Result};

/// A record whose configured attributes are buffered in a cache entry.
pub struct CachedRecord {
    /// Record identity (durable row key)
    id: RecordId,
    /// Shared per-type configuration and collaborators
    context: Arc<CacheContext>,
    /// Current in-memory field values
    values: AttrMap,
    /// Field values as last loaded from / persisted to the durable row
    original: AttrMap,
    /// Memoized cache entry, kept current by the setters
    entry: AttrMap,
    /// Transient per-instance override: always write through
    force_save: bool,
}

impl CachedRecord {
    /// Initialize a record: seed the cache entry from the provider (or the
    /// record's own values), overlay a fresh entry onto the in-memory
    /// fields, and stamp the watermark when `set_time` is configured.
    pub(crate) async fn init(
        context: Arc<CacheContext>,
        id: RecordId,
        values: AttrMap,
        original: AttrMap,
    ) -> Result<Self> {
        let key = context.config.cache_key(&id);
        let blob = context.provider.read(&key).await?;
        let entry = entry::seed(blob, &values, &context.config);

        let mut record = Self {
            id,
            context,
            values,
            original,
            entry,
            force_save: false,
        };
        record.apply_entry();

        if record.context.config.set_time() {
            let by = record.context.config.by().to_string();
            record.set(by, Value::Time(Utc::now()));
        }

        Ok(record)
    }

    /// Overlay the seeded entry onto the in-memory fields.
    ///
    /// Plain field assignment: the overlaid attributes show up as changed
    /// against the durable row, mirroring how a dirty-tracking framework
    /// would see them.
    fn apply_entry(&mut self) {
        if self.entry.is_empty() {
            return;
        }
        let overlays: Vec<(String, Value)> = self
            .context
            .config
            .attributes()
            .iter()
            .filter_map(|attribute| {
                self.entry
                    .get(attribute)
                    .map(|value| (attribute.clone(), value.clone()))
            })
            .collect();
        for (attribute, value) in overlays {
            self.values.insert(attribute, value);
        }
    }

    /// Record identity.
    pub fn id(&self) -> &RecordId {
        &self.id
    }

    /// Current value of a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Current watermark value, when present and a timestamp.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        entry::watermark_of(&self.values, self.context.config.by())
    }

    /// The memoized cache entry.
    pub fn cache_entry(&self) -> &AttrMap {
        &self.entry
    }

    /// Assign a field value.
    ///
    /// A cached attribute writes through to the cache entry immediately;
    /// every field gets the normal assignment so dirty tracking stays
    /// consistent with the in-process view.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        if self.context.config.is_cached(&field) {
            self.entry.insert(field.clone(), value.clone());
        }
        self.values.insert(field, value);
    }

    /// Assign a cached attribute in the cache entry only, without touching
    /// the in-memory field or its dirty state.
    pub fn set_cached(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let field = field.into();
        if !self.context.config.is_cached(&field) {
            return Err(Error::NotCached { field });
        }
        self.entry.insert(field, value.into());
        Ok(())
    }

    /// Roll every cached attribute back to its "was" value.
    pub fn reset_cache(&mut self) {
        let attributes: Vec<String> = self.context.config.attributes().iter().cloned().collect();
        for attribute in attributes {
            let was = self
                .original
                .get(&attribute)
                .cloned()
                .unwrap_or(Value::Null);
            self.values.insert(attribute, was);
        }
    }

    /// Names of fields whose current value differs from the durable row.
    pub fn changed_fields(&self) -> BTreeSet<String> {
        self.values
            .iter()
            .filter(|(field, value)| {
                self.original.get(field.as_str()).unwrap_or(&Value::Null) != *value
            })
            .map(|(field, _)| field.clone())
            .collect()
    }

    /// The transient force flag.
    pub fn force_save(&self) -> bool {
        self.force_save
    }

    /// Set the transient force flag: the next saves always write through.
    pub fn set_force_save(&mut self, force: bool) {
        self.force_save = force;
    }

    /// Changed fields with their current values.
    fn dirty_map(&self) -> AttrMap {
        self.changed_fields()
            .into_iter()
            .map(|field| {
                let value = self.values.get(&field).cloned().unwrap_or(Value::Null);
                (field, value)
            })
            .collect()
    }

    /// Advance "was" values after a successful durable write.
    fn mark_applied(&mut self, changes: &AttrMap) {
        for (field, value) in changes {
            self.original.insert(field.clone(), value.clone());
        }
    }

    /// Save, propagating any provider or store failure.
    ///
    /// Returns the flush decision that was applied. The cache entry is
    /// written to the provider exactly once per call, before the decision.
    pub async fn try_save(&mut self) -> Result<FlushDecision> {
        let key = self.context.config.cache_key(&self.id);
        self.context.provider.write(&key, &self.entry).await?;

        let by = self.context.config.by();
        let changed = self.changed_fields();
        let decision = self.context.policy.evaluate(
            entry::watermark_of(&self.original, by),
            entry::watermark_of(&self.values, by),
            &changed,
            self.context.config.attributes(),
            self.force_save,
        );

        match decision {
            FlushDecision::WriteThrough(reason) => {
                debug!(key = %key, reason = %reason, "writing record through to durable store");
                let changes = self.dirty_map();
                self.context.store.persist(&self.id, &changes).await?;
                self.mark_applied(&changes);
            }
            FlushDecision::CacheOnly => {
                debug!(key = %key, "durable write deferred; cache entry updated");
                let snapshot = self.entry.clone();
                self.reset_cache();

                let pending = self.dirty_map();
                let result = if pending.is_empty() {
                    Ok(())
                } else {
                    self.context.store.persist(&self.id, &pending).await
                };

                // Restore the post-mutation values whether or not the
                // inner persistence call succeeded.
                let attributes: Vec<String> =
                    self.context.config.attributes().iter().cloned().collect();
                for attribute in attributes {
                    let value = snapshot.get(&attribute).cloned().unwrap_or(Value::Null);
                    self.set(attribute, value);
                }

                result?;
                if !pending.is_empty() {
                    self.mark_applied(&pending);
                }
            }
        }

        Ok(decision)
    }

    /// Save, reporting failure as `false` instead of an error.
    pub async fn save(&mut self) -> bool {
        match self.try_save().await {
            Ok(_) => true,
            Err(error) => {
                warn!(record = %self.id, %error, "save failed");
                false
            }
        }
    }
}

impl std::fmt::Debug for CachedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRecord")
            .field("id", &self.id)
            .field("type", &self.context.config.type_name())
            .field("changed", &self.changed_fields())
            .field("force_save", &self.force_save)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryCacheProvider, InMemoryDurableStore};
    use crate::cache::manager::{CacheConfig, RecordCache};
    use crate::cache::policy::FlushReason;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    fn config() -> CacheConfig {
        CacheConfig::builder("device")
            .attributes(["lat", "lon"])
            .by("last_activity")
            .build()
            .unwrap()
    }

    fn fixture() -> (
        RecordCache,
        Arc<InMemoryCacheProvider>,
        Arc<InMemoryDurableStore>,
    ) {
        let provider = Arc::new(InMemoryCacheProvider::new());
        let store = Arc::new(InMemoryDurableStore::new());
        let cache = RecordCache::new(config(), provider.clone(), store.clone());
        (cache, provider, store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_setter_writes_through_to_entry() {
        let (cache, _provider, _store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();

        record.set("lat", 10.302);
        assert_eq!(record.get("lat"), Some(&Value::Float(10.302)));
        assert_eq!(record.cache_entry().get("lat"), Some(&Value::Float(10.302)));
    }

    #[tokio::test]
    async fn test_non_cached_setter_skips_entry() {
        let (cache, _provider, _store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();

        record.set("name", "probe-1");
        assert_eq!(record.get("name"), Some(&Value::Text("probe-1".into())));
        assert!(!record.cache_entry().contains_key("name"));
    }

    #[tokio::test]
    async fn test_set_cached_only_touches_entry() {
        let (cache, _provider, _store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();

        record.set_cached("lon", 10.305).unwrap();
        assert_eq!(record.cache_entry().get("lon"), Some(&Value::Float(10.305)));
        assert_eq!(record.get("lon"), Some(&Value::Null));
        assert!(!record.changed_fields().contains("lon"));
    }

    #[tokio::test]
    async fn test_set_cached_rejects_foreign_field() {
        let (cache, _provider, _store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();

        let result = record.set_cached("name", "probe-1");
        assert_matches!(result, Err(Error::NotCached { field }) if field == "name");
    }

    #[tokio::test]
    async fn test_first_save_writes_through() {
        let (cache, provider, store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();

        record.set("lat", 10.302);
        record.set("last_activity", t0());
        let decision = record.try_save().await.unwrap();

        assert_eq!(
            decision,
            FlushDecision::WriteThrough(FlushReason::NeverPersisted)
        );
        let row = store.row(&RecordId::new("1")).unwrap();
        assert_eq!(row.get("lat"), Some(&Value::Float(10.302)));
        assert_eq!(provider.writes(), 1);
    }

    #[tokio::test]
    async fn test_cache_only_save_rolls_back_row_but_keeps_values() {
        let (cache, provider, store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();
        record.set("lat", 10.302);
        record.set("lon", 10.305);
        record.set("last_activity", t0());
        record.try_save().await.unwrap();

        let mut record = cache.load("1").await.unwrap().unwrap();
        record.set("lat", 5.302);
        let decision = record.try_save().await.unwrap();

        assert_eq!(decision, FlushDecision::CacheOnly);
        // In-memory record keeps the new value
        assert_eq!(record.get("lat"), Some(&Value::Float(5.302)));
        // Durable row keeps the old one
        let row = store.row(&RecordId::new("1")).unwrap();
        assert_eq!(row.get("lat"), Some(&Value::Float(10.302)));
        // One durable write (the first save), two cache writes
        assert_eq!(store.persists(), 1);
        assert_eq!(provider.writes(), 2);
    }

    #[tokio::test]
    async fn test_cache_only_save_never_touches_failing_store() {
        let (cache, _provider, store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();
        record.set("lat", 10.302);
        record.set("lon", 10.305);
        record.set("last_activity", t0());
        record.try_save().await.unwrap();

        let mut record = cache.load("1").await.unwrap().unwrap();
        record.set("lat", 5.302);
        store.fail_next_persist();
        // Policy skips the store entirely, so the poisoned call never
        // fires and the new values survive the save.
        let decision = record.try_save().await.unwrap();
        assert_eq!(decision, FlushDecision::CacheOnly);
        assert_eq!(record.get("lat"), Some(&Value::Float(5.302)));
    }

    #[tokio::test]
    async fn test_write_through_failure_propagates() {
        let (cache, _provider, store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();
        record.set("lat", 10.302);
        record.set("last_activity", t0());

        store.fail_next_persist();
        let result = record.try_save().await;
        assert_matches!(result, Err(Error::Store(_)));
        // Must-not-raise variant reports the same failure as false.
        store.fail_next_persist();
        assert!(!record.save().await);
        // And succeeds once the store recovers.
        assert!(record.save().await);
    }

    #[tokio::test]
    async fn test_force_save_writes_through() {
        let (cache, _provider, store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();
        record.set("lat", 10.302);
        record.set("last_activity", t0());
        record.try_save().await.unwrap();

        let mut record = cache.load("1").await.unwrap().unwrap();
        record.set("lat", 11.302);
        record.set("last_activity", t0() + Duration::seconds(3));
        record.set_force_save(true);
        let decision = record.try_save().await.unwrap();

        assert_eq!(decision, FlushDecision::WriteThrough(FlushReason::Forced));
        let row = store.row(&RecordId::new("1")).unwrap();
        assert_eq!(row.get("lat"), Some(&Value::Float(11.302)));
    }

    #[tokio::test]
    async fn test_reset_cache_restores_was_values() {
        let (cache, _provider, _store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();
        record.set("lat", 10.302);
        record.set("last_activity", t0());
        record.try_save().await.unwrap();

        let mut record = cache.load("1").await.unwrap().unwrap();
        record.set("lat", 99.0);
        record.reset_cache();
        assert_eq!(record.get("lat"), Some(&Value::Float(10.302)));
    }

    #[tokio::test]
    async fn test_changed_fields_tracks_assignments() {
        let (cache, _provider, _store) = fixture();
        let mut record = cache.build("1", AttrMap::new()).await.unwrap();
        assert!(record.changed_fields().is_empty());

        record.set("lat", 10.302);
        record.set("name", "probe-1");
        let changed = record.changed_fields();
        assert!(changed.contains("lat"));
        assert!(changed.contains("name"));

        record.try_save().await.unwrap();
        assert!(record.changed_fields().is_empty());
    }

    #[tokio::test]
    async fn test_set_time_stamps_watermark() {
        let provider = Arc::new(InMemoryCacheProvider::new());
        let store = Arc::new(InMemoryDurableStore::new());
        let config = CacheConfig::builder("user")
            .attributes(["name", "key"])
            .by("last_activity")
            .set_time(true)
            .build()
            .unwrap();
        let cache = RecordCache::new(config, provider, store);

        let before = Utc::now();
        let record = cache.build("u1", AttrMap::new()).await.unwrap();
        let watermark = record.watermark().unwrap();
        assert!(watermark >= before);
        assert!(watermark <= Utc::now());
        // The stamp goes through the intercepting setter.
        assert_eq!(
            record.cache_entry().get("last_activity"),
            Some(&Value::Time(watermark))
        );
    }

    #[tokio::test]
    async fn test_debug_format() {
        let (cache, _provider, _store) = fixture();
        let record = cache.build("1", AttrMap::new()).await.unwrap();
        let debug = format!("{:?}", record);
        assert!(debug.contains("CachedRecord"));
        assert!(debug.contains("device"));
    }
}
