use sha2::{Digest, Sha256};
use std::fmt;

/// Hex digest of a resolved origin URL. Doubles as the cache file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_url(origin_url: &str) -> Self {
        CacheKey(hex::encode(Sha256::digest(origin_url.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
