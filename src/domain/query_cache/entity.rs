//! Durable query cache entry and lookup context

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context a query was asked in
///
/// Cache hits are scoped to the context: an answer computed for one zone or
/// development is never served for another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryContext {
    pub zone: String,
    pub development: String,
    pub document_type: Option<String>,
}

impl QueryContext {
    pub fn new(zone: impl Into<String>, development: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            development: development.into(),
            document_type: None,
        }
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }
}

/// A previously computed answer, persisted in the durable store
///
/// Entries are immutable apart from the hit counter. A changed answer is a
/// new entry with a new hash and embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCacheEntry {
    /// Unique identifier
    pub id: Uuid,
    /// Normalized query text
    pub query_text: String,
    /// SHA-256 of the normalized query text
    pub query_hash: String,
    /// Context zone
    pub zone: String,
    /// Context development
    pub development: String,
    /// Optional document type scope
    pub document_type: Option<String>,
    /// The cached answer
    pub response: String,
    /// Ordered list of source filenames the answer was built from
    pub sources_used: Vec<String>,
    /// Vector id in the cache namespace, absent when embedding failed
    pub embedding_id: Option<String>,
    /// Number of cache hits served from this entry
    pub hit_count: u32,
    /// When this entry was created
    pub created_at: DateTime<Utc>,
    /// When this entry expires
    pub expires_at: DateTime<Utc>,
}

impl QueryCacheEntry {
    /// Create a new entry expiring `ttl` from now
    pub fn new(
        query_text: impl Into<String>,
        query_hash: impl Into<String>,
        context: &QueryContext,
        response: impl Into<String>,
        sources_used: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4(),
            query_text: query_text.into(),
            query_hash: query_hash.into(),
            zone: context.zone.clone(),
            development: context.development.clone(),
            document_type: context.document_type.clone(),
            response: response.into(),
            sources_used,
            embedding_id: None,
            hit_count: 0,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn with_embedding_id(mut self, embedding_id: impl Into<String>) -> Self {
        self.embedding_id = Some(embedding_id.into());
        self
    }

    /// Check if the entry has passed its expiry
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// True when the entry belongs to the given lookup context
    ///
    /// Zone and development must match exactly; a document type in the
    /// context restricts matches to entries with that type, while a context
    /// without one accepts any entry.
    pub fn matches_context(&self, context: &QueryContext) -> bool {
        if self.zone != context.zone || self.development != context.development {
            return false;
        }

        match context.document_type {
            Some(ref dt) => self.document_type.as_deref() == Some(dt.as_str()),
            None => true,
        }
    }
}

/// A cache hit: the stored entry plus how close the query came to it
///
/// Exact-hash hits report similarity 1.0; similarity-path hits report the
/// vector score that cleared the threshold.
#[derive(Debug, Clone)]
pub struct CachedAnswer {
    pub entry: QueryCacheEntry,
    pub similarity: f32,
}

impl CachedAnswer {
    pub fn new(entry: QueryCacheEntry, similarity: f32) -> Self {
        Self { entry, similarity }
    }
}
