//! writeback - Write-Deferral Attribute Cache
//!
//! A caching layer between an application's in-memory record mutations and
//! a durable backing store. Frequently-updated attributes (device
//! telemetry, last-seen timestamps) are buffered in a fast external cache;
//! the durable write happens only when a flush policy decides the
//! accumulated changes are worth persisting — the watermark expired, a
//! non-cached field changed, or the save was forced.
//!
//! # Architecture
//!
//! ```text
//! mutation ──▶ CachedRecord ──▶ cache entry ──▶ CacheProvider (always)
//!                   │
//!                   ▼
//!             FlushPolicy ──▶ write-through? ──▶ DurableStore (sometimes)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory implementations of the domain ports
//! - [`cache`] - Cache-backed records, flush policy, entry helpers
//! - [`domain`] - Value model and collaborator ports
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use writeback::{AttrMap, CacheConfig, InMemoryCacheProvider, InMemoryDurableStore, RecordCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> writeback::Result<()> {
//! let config = CacheConfig::builder("device")
//!     .attributes(["lat", "lon"])
//!     .by("last_activity")
//!     .build()?;
//!
//! let devices = RecordCache::new(
//!     config,
//!     Arc::new(InMemoryCacheProvider::new()),
//!     Arc::new(InMemoryDurableStore::new()),
//! );
//!
//! let mut device = devices.build("42", AttrMap::new()).await?;
//! device.set("lat", 10.302);
//! device.set("last_activity", chrono::Utc::now());
//! device.try_save().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;

// Re-export commonly used types
pub use adapters::{InMemoryCacheProvider, InMemoryDurableStore};
pub use cache::{
    CacheConfig, CacheConfigBuilder, CachedRecord, FlushDecision, FlushPolicy, FlushReason,
    RecordCache, DEFAULT_EXPIRES_IN,
};
pub use domain::{AttrMap, CacheKey, CacheProvider, DurableStore, RecordId, Value};
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
