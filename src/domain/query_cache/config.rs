//! Semantic query cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the semantic query cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCacheConfig {
    /// Whether caching is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Similarity threshold for semantic hits (0.0 to 1.0)
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Nearest neighbors requested per similarity lookup; results come back
    /// ranked, so a small number is enough
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Vector index namespace isolating cache vectors
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Time-to-live for durable entries, in days
    #[serde(default = "default_entry_ttl_days")]
    pub entry_ttl_days: i64,

    /// Time-to-live for memoized embeddings, in seconds
    #[serde(default = "default_memo_ttl_secs")]
    pub memo_ttl_secs: u64,

    /// Capacity bound for the embedding memo
    #[serde(default = "default_memo_capacity")]
    pub memo_capacity: usize,

    /// Timeout applied to every collaborator call, in seconds
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_similarity_threshold() -> f32 {
    0.85
}

fn default_top_k() -> usize {
    3
}

fn default_namespace() -> String {
    "query-cache".to_string()
}

fn default_entry_ttl_days() -> i64 {
    30
}

fn default_memo_ttl_secs() -> u64 {
    3600
}

fn default_memo_capacity() -> usize {
    100
}

fn default_operation_timeout_secs() -> u64 {
    10
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            namespace: default_namespace(),
            entry_ttl_days: default_entry_ttl_days(),
            memo_ttl_secs: default_memo_ttl_secs(),
            memo_capacity: default_memo_capacity(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl QueryCacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durable entry TTL as a chrono duration
    pub fn entry_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.entry_ttl_days)
    }

    /// Embedding memo TTL
    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.memo_ttl_secs)
    }

    /// Collaborator call timeout
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_entry_ttl_days(mut self, days: i64) -> Self {
        self.entry_ttl_days = days;
        self
    }

    pub fn with_memo_ttl(mut self, ttl: Duration) -> Self {
        self.memo_ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_memo_capacity(mut self, capacity: usize) -> Self {
        self.memo_capacity = capacity;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_secs = timeout.as_secs();
        self
    }
}
