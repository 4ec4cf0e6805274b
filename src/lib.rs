//! Semantic Answer Cache
//!
//! Sits in front of an expensive answer-generation pipeline and protects it
//! two ways:
//! - answer caching keyed on normalized query text and context, with
//!   exact-hash matching first and embedding-similarity matching second
//! - a circuit breaker wrapping every call to the durable relational store,
//!   so a failing database degrades lookups to misses instead of cascading
//!
//! A generic in-process TTL cache with wildcard invalidation underlies the
//! embedding memoization and is usable on its own for other read-heavy
//! lookups.
//!
//! Construct the pieces explicitly and inject the collaborators:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use semantic_answer_cache::config::AppConfig;
//! use semantic_answer_cache::domain::QueryContext;
//! use semantic_answer_cache::infrastructure::breaker::CircuitBreaker;
//! use semantic_answer_cache::infrastructure::query_cache::InMemoryQueryCacheStore;
//! use semantic_answer_cache::infrastructure::services::SemanticQueryCache;
//! use semantic_answer_cache::infrastructure::vector::InMemoryVectorIndex;
//! use semantic_answer_cache::infrastructure::embedding::OpenAiEmbeddingProvider;
//! use semantic_answer_cache::infrastructure::http::HttpClient;
//!
//! # async fn example() {
//! let config = AppConfig::load().unwrap_or_default();
//! let breaker = Arc::new(CircuitBreaker::new(config.breaker.to_breaker_config()));
//! let provider = OpenAiEmbeddingProvider::new(HttpClient::new(), "sk-...");
//!
//! let cache = Arc::new(SemanticQueryCache::with_config(
//!     Arc::new(InMemoryQueryCacheStore::new()),
//!     Arc::new(InMemoryVectorIndex::new()),
//!     Arc::new(provider),
//!     breaker,
//!     config.query_cache,
//! ));
//!
//! let context = QueryContext::new("yucatan", "amura");
//! if let Some(answer) = cache.find_cached_response("precio de amura?", &context).await {
//!     println!("hit ({:.2}): {}", answer.similarity, answer.entry.response);
//! }
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    CachedAnswer, CircuitBreakerConfig, CircuitState, DomainError, EmbeddingProvider,
    QueryCacheConfig, QueryCacheEntry, QueryCacheStore, QueryContext, VectorIndex,
};
pub use infrastructure::breaker::CircuitBreaker;
pub use infrastructure::cache::{CacheStats, TtlCache};
pub use infrastructure::services::SemanticQueryCache;
