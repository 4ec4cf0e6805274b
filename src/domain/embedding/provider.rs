//! Embedding provider trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Trait for embedding providers (OpenAI, Cohere, etc.)
///
/// Callers treat provider failures as non-fatal: the cache degrades to
/// hash-only lookups when no embedding can be produced.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Generate an embedding vector for the given text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Get the embedding dimensions this provider produces
    fn dimensions(&self) -> usize;
}
