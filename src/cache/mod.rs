//! Persistent response caching keyed by canonical request hashes.

pub mod key;
pub mod response_cache;

pub use key::{cache_key, CacheKey};
pub use response_cache::{CacheStats, ResponseCache};
