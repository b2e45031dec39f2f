//! Domain Layer
//!
//! Value model and ports for the write-deferral cache. The core depends
//! only on the abstractions here; infrastructure adapters implement them.

pub mod ports;
pub mod value;

pub use ports::{CacheKey, CacheProvider, DurableStore, RecordId, CACHE_KEY_TAG};
pub use value::{AttrMap, Value};
