//! Write-Deferral Cache Core
//!
//! Cache-backed records with a policy-driven flush to durable storage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        CachedRecord                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  set(attr, value) ──▶ cache entry (always) + field assignment    │
//! │                                                                   │
//! │  save ──▶ provider.write(entry)        (always, exactly once)    │
//! │        ──▶ FlushPolicy.evaluate(...)                             │
//! │              ├─ write-through ──▶ store.persist(dirty fields)    │
//! │              └─ cache-only    ──▶ rollback ▸ inner save ▸ restore│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - The cache entry is never behind the in-memory record: setters write
//!   it immediately and every save attempt writes it to the provider
//!   before the flush decision.
//! - The flush decision is pure and race-free with respect to the
//!   watermark's "was" value; no clocks are read inside the policy.
//! - No internal threading, retries, or locking; collaborators are
//!   externally synchronized and last writer wins on the provider.

mod entry;
mod manager;
mod policy;
mod proptest;
mod record;

pub use entry::{decode, encode};
pub use manager::{CacheConfig, CacheConfigBuilder, RecordCache};
pub use policy::{FlushDecision, FlushPolicy, FlushReason};
pub use record::CachedRecord;

/// Default expiry window for the flush policy (5 minutes).
pub const DEFAULT_EXPIRES_IN: std::time::Duration = std::time::Duration::from_secs(300);

// =============================================================================
// Tests
// =============================================================================
