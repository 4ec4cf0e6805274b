//! Cache domain - deterministic key construction for memo caches

mod key;

pub use key::CacheKeyParams;
