//! Durable query cache store implementations

mod in_memory;

pub use in_memory::InMemoryQueryCacheStore;
