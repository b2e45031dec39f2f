//! Property-Based Tests for the Flush Policy
//!
//! Uses proptest to verify the decision function across arbitrary
//! watermark gaps, dirty sets, and flag combinations.
//!
//! # Test Properties
//!
//! 1. **Expiry threshold**: gap > expiry ⇔ write-through (all else equal)
//! 2. **Foreign-change dominance**: any dirty field outside the cached
//!    set writes through, regardless of watermarks
//! 3. **First-save dominance**: an absent "was" watermark always writes
//!    through
//! 4. **Force dominance**: the force flag never yields cache-only

#![cfg(test)]

use std::collections::BTreeSet;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use super::policy::{FlushDecision, FlushPolicy, FlushReason};

// =============================================================================
// Strategies
// =============================================================================

/// Strategy for watermark gaps around a 5-minute expiry, in seconds.
fn gap_strategy() -> impl Strategy<Value = i64> {
    -600i64..1200
}

/// Strategy for small field-name sets drawn from a fixed alphabet.
fn field_set_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop::sample::select(vec!["lat", "lon", "name", "key", "desc"]),
        0..4,
    )
    .prop_map(|set| set.into_iter().map(|s| s.to_string()).collect())
}

fn cached() -> BTreeSet<String> {
    ["lat", "lon", "last_activity"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn policy() -> FlushPolicy {
    FlushPolicy::new(Duration::minutes(5))
}

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_expiry_threshold_is_exact(gap in gap_strategy()) {
        let current = t0() + Duration::seconds(gap);
        let decision = policy().evaluate(
            Some(t0()),
            Some(current),
            &cached(),
            &cached(),
            false,
        );

        if gap > 300 {
            prop_assert_eq!(decision, FlushDecision::WriteThrough(FlushReason::Expired));
        } else {
            prop_assert_eq!(decision, FlushDecision::CacheOnly);
        }
    }

    #[test]
    fn prop_foreign_change_dominates(changed in field_set_strategy(), gap in gap_strategy()) {
        let current = t0() + Duration::seconds(gap.min(300));
        let decision = policy().evaluate(
            Some(t0()),
            Some(current),
            &changed,
            &cached(),
            false,
        );

        let has_foreign = changed.difference(&cached()).next().is_some();
        if has_foreign {
            prop_assert_eq!(
                decision,
                FlushDecision::WriteThrough(FlushReason::ForeignChange)
            );
        } else {
            prop_assert_eq!(decision, FlushDecision::CacheOnly);
        }
    }

    #[test]
    fn prop_first_save_always_writes_through(
        changed in field_set_strategy(),
        force in any::<bool>(),
        gap in gap_strategy(),
    ) {
        let decision = policy().evaluate(
            None,
            Some(t0() + Duration::seconds(gap)),
            &changed,
            &cached(),
            force,
        );
        prop_assert_eq!(
            decision,
            FlushDecision::WriteThrough(FlushReason::NeverPersisted)
        );
    }

    #[test]
    fn prop_force_never_yields_cache_only(changed in field_set_strategy(), gap in gap_strategy()) {
        let decision = policy().evaluate(
            Some(t0()),
            Some(t0() + Duration::seconds(gap)),
            &changed,
            &cached(),
            true,
        );
        prop_assert!(decision.is_write_through());
    }
}
