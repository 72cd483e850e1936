//! On-disk response cache: one JSON document per key, named by the key.

mod entry;
mod key;
mod store;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use store::CacheStore;
