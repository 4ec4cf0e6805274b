//! Vector index contract
//!
//! Cache vectors live in their own namespace inside whatever index backs the
//! deployment, isolated from document vectors stored elsewhere.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Metadata stored alongside a cache vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    /// Normalized query text the vector was produced from
    pub normalized_query: String,
    /// Context zone
    pub zone: String,
    /// Context development
    pub development: String,
    /// Optional document type scope
    pub document_type: Option<String>,
    /// Hash of the normalized query, links back to the durable entry
    pub query_hash: String,
}

/// Exact-match conjunction filter over vector metadata
#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub zone: Option<String>,
    pub development: Option<String>,
    pub document_type: Option<String>,
}

impl VectorFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_development(mut self, development: impl Into<String>) -> Self {
        self.development = Some(development.into());
        self
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = Some(document_type.into());
        self
    }

    /// True when every set field matches the metadata exactly
    pub fn matches(&self, metadata: &VectorMetadata) -> bool {
        if let Some(ref zone) = self.zone {
            if metadata.zone != *zone {
                return false;
            }
        }

        if let Some(ref development) = self.development {
            if metadata.development != *development {
                return false;
            }
        }

        if let Some(ref document_type) = self.document_type {
            if metadata.document_type.as_deref() != Some(document_type.as_str()) {
                return false;
            }
        }

        true
    }
}

/// A ranked match from a vector query
#[derive(Debug, Clone)]
pub struct VectorMatch {
    /// Id the vector was upserted under
    pub id: String,
    /// Similarity score (0.0 to 1.0, higher is closer)
    pub score: f32,
}

/// Trait for vector index backends (Pinecone, pgvector, in-memory, ...)
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug {
    /// Insert or replace a vector under the given id; idempotent on `id`
    async fn upsert(
        &self,
        namespace: &str,
        id: &str,
        vector: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Result<(), DomainError>;

    /// Query the nearest neighbors of `vector` within a namespace,
    /// restricted to entries whose metadata passes the filter
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> VectorMetadata {
        VectorMetadata {
            normalized_query: "precio de amura?".to_string(),
            zone: "yucatan".to_string(),
            development: "amura".to_string(),
            document_type: Some("brochure".to_string()),
            query_hash: "abc123".to_string(),
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(VectorFilter::new().matches(&metadata()));
    }

    #[test]
    fn test_filter_is_conjunction() {
        let filter = VectorFilter::new()
            .with_zone("yucatan")
            .with_development("amura");
        assert!(filter.matches(&metadata()));

        let filter = VectorFilter::new()
            .with_zone("yucatan")
            .with_development("other");
        assert!(!filter.matches(&metadata()));
    }

    #[test]
    fn test_document_type_filter() {
        let filter = VectorFilter::new().with_document_type("brochure");
        assert!(filter.matches(&metadata()));

        let filter = VectorFilter::new().with_document_type("price-list");
        assert!(!filter.matches(&metadata()));

        let mut untyped = metadata();
        untyped.document_type = None;
        let filter = VectorFilter::new().with_document_type("brochure");
        assert!(!filter.matches(&untyped));
    }
}
