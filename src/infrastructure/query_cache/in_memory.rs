//! In-memory durable store implementation
//!
//! Backs tests and development. Mirrors the relational store's observable
//! behavior: expired entries are invisible to lookups until the periodic
//! purge deletes them.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::query_cache::{normalize_query, QueryCacheEntry, QueryCacheStore, QueryContext};
use crate::domain::DomainError;

/// In-memory query cache store with feedback bookkeeping
#[derive(Debug, Default)]
pub struct InMemoryQueryCacheStore {
    entries: RwLock<HashMap<Uuid, QueryCacheEntry>>,
    negative_feedback: RwLock<HashSet<String>>,
}

impl InMemoryQueryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn feedback_key(normalized_query: &str, context: &QueryContext) -> String {
        format!(
            "{}|{}|{}|{}",
            normalized_query,
            context.zone,
            context.development,
            context.document_type.as_deref().unwrap_or("")
        )
    }

    /// Record negative feedback against a query/context combination; the
    /// query is normalized the same way lookups normalize it
    pub fn record_negative_feedback(&self, query: &str, context: &QueryContext) {
        let key = Self::feedback_key(&normalize_query(query), context);
        self.negative_feedback.write().unwrap().insert(key);
    }

    /// Number of stored entries, expired included
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch an entry by primary id regardless of context or expiry
    pub fn entry(&self, id: Uuid) -> Option<QueryCacheEntry> {
        self.entries.read().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl QueryCacheStore for InMemoryQueryCacheStore {
    async fn get_by_hash(
        &self,
        query_hash: &str,
        context: &QueryContext,
    ) -> Result<Option<QueryCacheEntry>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(entries
            .values()
            .find(|entry| {
                entry.query_hash == query_hash
                    && entry.matches_context(context)
                    && !entry.is_expired()
            })
            .cloned())
    }

    async fn get_by_embedding_ids(
        &self,
        ids: &[String],
        context: &QueryContext,
    ) -> Result<Vec<QueryCacheEntry>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(entries
            .values()
            .filter(|entry| {
                entry
                    .embedding_id
                    .as_ref()
                    .is_some_and(|id| ids.contains(id))
                    && entry.matches_context(context)
                    && !entry.is_expired()
            })
            .cloned()
            .collect())
    }

    async fn save(&self, entry: QueryCacheEntry) -> Result<QueryCacheEntry, DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        entries.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn increment_hit(&self, id: Uuid) -> Result<(), DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        match entries.get_mut(&id) {
            Some(entry) => {
                entry.hit_count += 1;
                Ok(())
            }
            None => Err(DomainError::not_found(format!(
                "Cache entry '{}' not found",
                id
            ))),
        }
    }

    async fn has_negative_feedback(
        &self,
        normalized_query: &str,
        context: &QueryContext,
    ) -> Result<bool, DomainError> {
        let feedback = self
            .negative_feedback
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))?;

        Ok(feedback.contains(&Self::feedback_key(normalized_query, context)))
    }

    async fn cleanup_expired(&self) -> Result<usize, DomainError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))?;

        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());

        Ok(before - entries.len())
    }
}
