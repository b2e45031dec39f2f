//! Record Cache - Type Registration and Configuration
//!
//! One [`RecordCache`] is declared per cached record type, binding an
//! immutable [`CacheConfig`] to the cache provider and durable store. It
//! constructs and loads [`CachedRecord`](super::record::CachedRecord)
//! instances; all per-save logic lives on the record itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;

use super::policy::FlushPolicy;
use super::record::CachedRecord;
use super::DEFAULT_EXPIRES_IN;
use crate::domain::{AttrMap, CacheKey, CacheProvider, DurableStore, RecordId};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Per-type cache configuration, immutable once built.
///
/// The watermark attribute (`by`) is always a member of the cached set;
/// the builder adds it if the attribute list omits it.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Record type name, used in derived cache keys
    type_name: String,
    /// Cached attribute names, including `by`
    attributes: BTreeSet<String>,
    /// Watermark attribute name
    by: String,
    /// Maximum watermark gap before a durable write is forced
    expires_in: Duration,
    /// Assign "now" to the watermark attribute after initialization
    set_time: bool,
    /// Explicit cache key template overriding the derived composite
    key_template: Option<String>,
}

impl CacheConfig {
    /// Start building a configuration for the given record type.
    pub fn builder(type_name: impl Into<String>) -> CacheConfigBuilder {
        CacheConfigBuilder {
            type_name: type_name.into(),
            attributes: Vec::new(),
            by: None,
            expires_in: DEFAULT_EXPIRES_IN,
            set_time: false,
            key_template: None,
        }
    }

    /// Record type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The configured cached attribute set, `by` included.
    pub fn attributes(&self) -> &BTreeSet<String> {
        &self.attributes
    }

    /// The watermark attribute name.
    pub fn by(&self) -> &str {
        &self.by
    }

    /// Expiry window for the flush policy.
    pub fn expires_in(&self) -> Duration {
        self.expires_in
    }

    /// Whether initialization stamps the watermark with "now".
    pub fn set_time(&self) -> bool {
        self.set_time
    }

    /// Check membership in the cached set.
    pub fn is_cached(&self, field: &str) -> bool {
        self.attributes.contains(field)
    }

    /// Cache key for a record identity: the derived composite, or the
    /// explicit template when one was configured.
    pub fn cache_key(&self, id: &RecordId) -> CacheKey {
        match &self.key_template {
            Some(template) => CacheKey::from_template(template, id),
            None => CacheKey::derive(&self.type_name, id),
        }
    }
}

/// Builder for [`CacheConfig`].
///
/// `build` fails fast on a missing watermark attribute or an empty
/// attribute list, before any record is constructed.
#[derive(Debug)]
pub struct CacheConfigBuilder {
    type_name: String,
    attributes: Vec<String>,
    by: Option<String>,
    expires_in: std::time::Duration,
    set_time: bool,
    key_template: Option<String>,
}

impl CacheConfigBuilder {
    /// Add one cached attribute.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push(name.into());
        self
    }

    /// Add several cached attributes.
    pub fn attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the watermark attribute (required).
    pub fn by(mut self, name: impl Into<String>) -> Self {
        self.by = Some(name.into());
        self
    }

    /// Override the expiry window (default 5 minutes).
    pub fn expires_in(mut self, expires_in: std::time::Duration) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Stamp the watermark attribute with "now" after initialization.
    pub fn set_time(mut self, set_time: bool) -> Self {
        self.set_time = set_time;
        self
    }

    /// Replace the derived cache key with an explicit template; `{id}`
    /// expands to the record identity.
    pub fn key_template(mut self, template: impl Into<String>) -> Self {
        self.key_template = Some(template.into());
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> Result<CacheConfig> {
        let by = match self.by {
            Some(by) if !by.is_empty() => by,
            _ => {
                return Err(Error::Config(format!(
                    "cached record type '{}' requires a watermark attribute (`by`)",
                    self.type_name
                )))
            }
        };

        if self.attributes.is_empty() {
            return Err(Error::Config(format!(
                "cached record type '{}' requires at least one cached attribute",
                self.type_name
            )));
        }

        let expires_in = Duration::from_std(self.expires_in).map_err(|_| {
            Error::Config(format!(
                "cached record type '{}': expires_in is out of range",
                self.type_name
            ))
        })?;

        let mut attributes: BTreeSet<String> = self.attributes.into_iter().collect();
        attributes.insert(by.clone());

        Ok(CacheConfig {
            type_name: self.type_name,
            attributes,
            by,
            expires_in,
            set_time: self.set_time,
            key_template: self.key_template,
        })
    }
}

// =============================================================================
// Record Cache
// =============================================================================

/// Shared per-type state handed to every record instance.
pub(crate) struct CacheContext {
    pub(crate) config: CacheConfig,
    pub(crate) policy: FlushPolicy,
    pub(crate) provider: Arc<dyn CacheProvider>,
    pub(crate) store: Arc<dyn DurableStore>,
}

/// The per-type registration: configuration plus collaborator handles.
///
/// Constructing one is the registration step; the presence of a provider
/// and a store is enforced by the signature.
pub struct RecordCache {
    context: Arc<CacheContext>,
}

impl RecordCache {
    /// Register a cached record type.
    pub fn new(
        config: CacheConfig,
        provider: Arc<dyn CacheProvider>,
        store: Arc<dyn DurableStore>,
    ) -> Self {
        let policy = FlushPolicy::new(config.expires_in());
        Self {
            context: Arc::new(CacheContext {
                config,
                policy,
                provider,
                store,
            }),
        }
    }

    /// The type's configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.context.config
    }

    /// Load a record from the durable store, overlaying any fresher
    /// cache entry. Returns `None` when the row does not exist.
    pub async fn load(&self, id: impl Into<RecordId>) -> Result<Option<CachedRecord>> {
        let id = id.into();
        match self.context.store.fetch(&id).await? {
            Some(row) => {
                let record =
                    CachedRecord::init(self.context.clone(), id, row.clone(), row).await?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Construct an in-memory record that has no durable row yet.
    ///
    /// The first save always writes through (never persisted).
    pub async fn build(&self, id: impl Into<RecordId>, seed: AttrMap) -> Result<CachedRecord> {
        CachedRecord::init(self.context.clone(), id.into(), seed, AttrMap::new()).await
    }
}

// =============================================================================
// Tests
// =============================================================================
