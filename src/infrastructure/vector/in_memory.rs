//! In-memory vector index using linear search
//!
//! Suitable for development, tests, and small deployments. For production
//! cache sizes use a hosted index behind the same trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::embedding::cosine_similarity;
use crate::domain::vector::{VectorFilter, VectorIndex, VectorMatch, VectorMetadata};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct VectorRecord {
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

/// Namespaced in-memory vector store
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors in a namespace
    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .map(|ns| ns.get(namespace).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(
        &self,
        namespace: &str,
        id: &str,
        vector: Vec<f32>,
        metadata: VectorMetadata,
    ) -> Result<(), DomainError> {
        let mut namespaces = self
            .namespaces
            .write()
            .map_err(|e| DomainError::internal(format!("Failed to acquire write lock: {}", e)))?;

        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(id.to_string(), VectorRecord { vector, metadata });

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
        filter: &VectorFilter,
    ) -> Result<Vec<VectorMatch>, DomainError> {
        let namespaces = self
            .namespaces
            .read()
            .map_err(|e| DomainError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let Some(records) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .filter(|(_, record)| filter.matches(&record.metadata))
            .map(|(id, record)| VectorMatch {
                id: id.clone(),
                score: cosine_similarity(vector, &record.vector),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(zone: &str, development: &str) -> VectorMetadata {
        VectorMetadata {
            normalized_query: "q".to_string(),
            zone: zone.to_string(),
            development: development.to_string(),
            document_type: None,
            query_hash: "h".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let index = InMemoryVectorIndex::new();

        index
            .upsert("cache", "a", vec![1.0, 0.0], metadata("yucatan", "amura"))
            .await
            .unwrap();
        index
            .upsert("cache", "b", vec![0.0, 1.0], metadata("yucatan", "amura"))
            .await
            .unwrap();

        let matches = index
            .query("cache", &[1.0, 0.0], 3, &VectorFilter::new())
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a");
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_id() {
        let index = InMemoryVectorIndex::new();

        index
            .upsert("cache", "a", vec![1.0, 0.0], metadata("yucatan", "amura"))
            .await
            .unwrap();
        index
            .upsert("cache", "a", vec![0.0, 1.0], metadata("yucatan", "amura"))
            .await
            .unwrap();

        assert_eq!(index.len("cache"), 1);

        let matches = index
            .query("cache", &[0.0, 1.0], 1, &VectorFilter::new())
            .await
            .unwrap();
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_query_respects_filter() {
        let index = InMemoryVectorIndex::new();

        index
            .upsert("cache", "a", vec![1.0, 0.0], metadata("yucatan", "amura"))
            .await
            .unwrap();
        index
            .upsert("cache", "b", vec![1.0, 0.0], metadata("yucatan", "aria"))
            .await
            .unwrap();

        let filter = VectorFilter::new().with_development("amura");
        let matches = index.query("cache", &[1.0, 0.0], 3, &filter).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "a");
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let index = InMemoryVectorIndex::new();

        index
            .upsert("cache", "a", vec![1.0], metadata("yucatan", "amura"))
            .await
            .unwrap();

        let matches = index
            .query("documents", &[1.0], 3, &VectorFilter::new())
            .await
            .unwrap();

        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_truncates() {
        let index = InMemoryVectorIndex::new();

        for i in 0..10 {
            index
                .upsert(
                    "cache",
                    &format!("v{}", i),
                    vec![1.0, i as f32 * 0.1],
                    metadata("yucatan", "amura"),
                )
                .await
                .unwrap();
        }

        let matches = index
            .query("cache", &[1.0, 0.0], 3, &VectorFilter::new())
            .await
            .unwrap();

        assert_eq!(matches.len(), 3);
    }
}
