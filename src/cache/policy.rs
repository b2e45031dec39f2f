//! Flush Policy Evaluator
//!
//! Pure decision logic for the save path: write the record through to the
//! durable store, or update only the cache entry. The evaluator trades
//! durable-store write frequency for bounded staleness on cache-covered
//! fields, while guaranteeing zero staleness on every other field.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

/// Why a save was written through to durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// The row has never been durably persisted with a watermark.
    NeverPersisted,
    /// The gap since the last durable write exceeds the configured expiry.
    Expired,
    /// A field outside the cached set changed; it has no cache fallback.
    ForeignChange,
    /// The per-instance force flag was set.
    Forced,
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushReason::NeverPersisted => write!(f, "never persisted"),
            FlushReason::Expired => write!(f, "expired"),
            FlushReason::ForeignChange => write!(f, "foreign change"),
            FlushReason::Forced => write!(f, "forced"),
        }
    }
}

/// Outcome of a flush policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushDecision {
    /// The durable write proceeds.
    WriteThrough(FlushReason),
    /// The durable write is suppressed; only the cache entry is updated.
    CacheOnly,
}

impl FlushDecision {
    /// True when the durable write proceeds.
    #[inline]
    pub fn is_write_through(&self) -> bool {
        matches!(self, FlushDecision::WriteThrough(_))
    }
}

/// Time/version-windowed write-coalescing policy.
///
/// A pure function of the record's dirty state and watermark values; it
/// reads no clocks and performs no I/O.
#[derive(Debug, Clone)]
pub struct FlushPolicy {
    /// Maximum watermark gap before a durable write is forced.
    expires_in: Duration,
}

impl FlushPolicy {
    pub fn new(expires_in: Duration) -> Self {
        Self { expires_in }
    }

    /// Decide whether this save attempt reaches durable storage.
    ///
    /// `last_persisted` is the watermark's value as last committed to the
    /// durable row (its "was" value), NOT the in-memory current value.
    /// An absent `current` watermark cannot cross the expiry threshold.
    pub fn evaluate(
        &self,
        last_persisted: Option<DateTime<Utc>>,
        current: Option<DateTime<Utc>>,
        changed: &BTreeSet<String>,
        cached: &BTreeSet<String>,
        force: bool,
    ) -> FlushDecision {
        let last = match last_persisted {
            Some(last) => last,
            None => return FlushDecision::WriteThrough(FlushReason::NeverPersisted),
        };

        if let Some(current) = current {
            if last + self.expires_in < current {
                return FlushDecision::WriteThrough(FlushReason::Expired);
            }
        }

        if changed.difference(cached).next().is_some() {
            return FlushDecision::WriteThrough(FlushReason::ForeignChange);
        }

        if force {
            return FlushDecision::WriteThrough(FlushReason::Forced);
        }

        FlushDecision::CacheOnly
    }
}

// =============================================================================
// Tests
// =============================================================================
