//! Durable query cache store trait

use std::fmt::Debug;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::DomainError;

use super::entity::{QueryCacheEntry, QueryContext};

/// Trait for the durable relational store behind the query cache
///
/// All calls go through the circuit breaker; implementations should tag
/// their errors with the matching [`DomainError`] variant (`Connection`,
/// `ResourceLimit`, `Configuration`) so failure accounting does not have to
/// fall back to message parsing.
#[async_trait]
pub trait QueryCacheStore: Send + Sync + Debug {
    /// Fetch a non-expired entry with the exact query hash and context
    async fn get_by_hash(
        &self,
        query_hash: &str,
        context: &QueryContext,
    ) -> Result<Option<QueryCacheEntry>, DomainError>;

    /// Fetch non-expired entries whose embedding id is in `ids`, scoped to
    /// the context; used after a similarity hit
    async fn get_by_embedding_ids(
        &self,
        ids: &[String],
        context: &QueryContext,
    ) -> Result<Vec<QueryCacheEntry>, DomainError>;

    /// Persist an entry
    async fn save(&self, entry: QueryCacheEntry) -> Result<QueryCacheEntry, DomainError>;

    /// Bump the hit counter; fire-and-forget, callers ignore failures
    async fn increment_hit(&self, id: Uuid) -> Result<(), DomainError>;

    /// True when negative feedback has been recorded against this
    /// query/context combination
    async fn has_negative_feedback(
        &self,
        normalized_query: &str,
        context: &QueryContext,
    ) -> Result<bool, DomainError>;

    /// Bulk-delete entries past their expiry; returns count removed
    async fn cleanup_expired(&self) -> Result<usize, DomainError>;
}
