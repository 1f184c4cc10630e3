//! Two-tier caching of provider results.
//!
//! A bounded in-process tier ([`MemoryTier`]) sits in front of an optional shared tier
//! ([`SharedTier`], normally Redis). [`CacheStore::get_or_fetch`] consults them in order,
//! falls back to the provider, and serves an expired in-process copy when the provider
//! fails.

mod entry;
mod key;
mod memory;
mod shared;
mod store;

pub use entry::{CacheEntry, CacheOrigin, StoredEntry};
pub use key::CacheKey;
pub use memory::{MemoryEntry, MemoryTier};
pub use shared::{DisabledTier, RedisTier, SharedTier, connect_shared_tier};
pub use store::{CacheSettings, CacheStore};
