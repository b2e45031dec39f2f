//! Cache Entry Helpers
//!
//! Seeding and freshness comparison for the per-record cache entry, plus
//! JSON codec helpers for blob-oriented providers. An entry always carries
//! every configured cached attribute (absent record fields seed as null),
//! so a restored snapshot is complete.

use chrono::{DateTime, Utc};

use super::manager::CacheConfig;
use crate::domain::{AttrMap, Value};
use crate::error::Result;

/// Extract the watermark timestamp from an attribute mapping.
///
/// A missing attribute or a non-timestamp value reads as absent.
pub(crate) fn watermark_of(map: &AttrMap, by: &str) -> Option<DateTime<Utc>> {
    map.get(by).and_then(Value::as_time)
}

/// Freshness comparison between a cache entry and the in-memory record.
///
/// The entry wins unless both watermarks are present and the entry's is
/// strictly older; ties go to the entry.
pub(crate) fn entry_wins(
    entry_watermark: Option<DateTime<Utc>>,
    record_watermark: Option<DateTime<Utc>>,
) -> bool {
    match (entry_watermark, record_watermark) {
        (Some(entry), Some(record)) => entry >= record,
        _ => true,
    }
}

/// Seed the memoized cache entry for a record.
///
/// Starts from the provider blob when it is at least as fresh as the
/// record; otherwise overwrites every cached attribute with the record's
/// current value. Either way the result holds all configured attributes.
pub(crate) fn seed(blob: Option<AttrMap>, record: &AttrMap, config: &CacheConfig) -> AttrMap {
    let mut entry = blob.unwrap_or_default();

    let fresh = !entry.is_empty()
        && entry_wins(
            watermark_of(&entry, config.by()),
            watermark_of(record, config.by()),
        );

    if !fresh {
        for attribute in config.attributes() {
            entry.insert(
                attribute.clone(),
                record.get(attribute).cloned().unwrap_or(Value::Null),
            );
        }
    }

    entry
}

/// Encode a cache entry as a JSON blob.
///
/// For providers that store opaque strings rather than typed mappings.
pub fn encode(entry: &AttrMap) -> Result<String> {
    Ok(serde_json::to_string(entry)?)
}

/// Decode a cache entry from a JSON blob.
pub fn decode(blob: &str) -> Result<AttrMap> {
    Ok(serde_json::from_str(blob)?)
}

// =============================================================================
// Tests
// =============================================================================
