//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the abstractions the cache core depends on.
//! Infrastructure adapters implement these traits to plug in a concrete
//! cache provider (Redis, memcached, in-process map) and a concrete durable
//! store (relational row store, document store).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Cache Core                           │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │              Ports (Traits)                        │  │
//! │  │       CacheProvider  │  DurableStore               │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                    │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │              Adapters (Impls)                      │  │
//! │  │  InMemoryCacheProvider │ InMemoryDurableStore      │  │
//! │  └───────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither port promises atomicity beyond single-key visibility. The core
//! tolerates read-after-write races on the provider (last writer wins) and
//! assumes the store's persist is atomic per row.

use async_trait::async_trait;

use super::value::AttrMap;
use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Fixed namespace tag appended to derived cache keys.
pub const CACHE_KEY_TAG: &str = "attr_cache_store";

/// Record identifier (value object).
///
/// The primary key of the durable row, rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Cache entry key (value object).
///
/// Stable and deterministic for a given record identity, so every process
/// mutating the same row addresses the same provider entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the default composite key: `<type>:<id>:attr_cache_store`.
    pub fn derive(type_name: &str, id: &RecordId) -> Self {
        Self(format!("{}:{}:{}", type_name, id, CACHE_KEY_TAG))
    }

    /// Render a key from an explicit template; `{id}` expands to the
    /// record identity.
    pub fn from_template(template: &str, id: &RecordId) -> Self {
        Self(template.replace("{id}", id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Cache Provider Port
// =============================================================================

/// Port for the external cache/key-value provider.
///
/// The provider stores one attribute mapping per cache key. Reads of absent
/// keys return `None`; writes overwrite unconditionally. Errors propagate
/// verbatim to the caller of save/load, never retried by the core.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// Read the entry for a key, or `None` when absent.
    async fn read(&self, key: &CacheKey) -> Result<Option<AttrMap>>;

    /// Write the entry for a key, overwriting any previous value.
    async fn write(&self, key: &CacheKey, values: &AttrMap) -> Result<()>;
}

// =============================================================================
// Durable Store Port
// =============================================================================

/// Port for the durable backing store.
///
/// Keyed rows with named fields. `persist` upserts only the given changed
/// fields; per-field dirty tracking and "was" values live on the record
/// side ([`CachedRecord`](crate::cache::CachedRecord)).
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch the row for a record identity, or `None` when absent.
    async fn fetch(&self, id: &RecordId) -> Result<Option<AttrMap>>;

    /// Persist the given changed fields for a record identity.
    async fn persist(&self, id: &RecordId, changes: &AttrMap) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
