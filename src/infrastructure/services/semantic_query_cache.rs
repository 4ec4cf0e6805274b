//! Semantic query cache service
//!
//! Two-tier lookup over previously computed answers: exact match on the
//! hash of the normalized query, then nearest-neighbor search over
//! embeddings, both scoped by context and gated on recorded feedback.
//!
//! Caching is strictly an optimization. Every failure inside this service
//! (embedding provider down, vector index unreachable, circuit open) is
//! logged and surfaces as a plain miss or no-op; nothing here may block the
//! caller's answer-generation path.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::cache::CacheKeyParams;
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::query_cache::{
    normalize_query, query_hash, CachedAnswer, QueryCacheConfig, QueryCacheEntry, QueryCacheStore,
    QueryContext,
};
use crate::domain::vector::{VectorFilter, VectorIndex, VectorMetadata};
use crate::domain::DomainError;
use crate::infrastructure::breaker::CircuitBreaker;
use crate::infrastructure::cache::{CacheStats, TtlCache};

/// Semantic cache over the answer-generation pipeline
///
/// Durable store calls go through the circuit breaker; embedding and vector
/// calls are plain network I/O with a timeout. The embedding memo avoids
/// re-embedding repeated queries within the memo TTL.
#[derive(Debug)]
pub struct SemanticQueryCache {
    store: Arc<dyn QueryCacheStore>,
    vector_index: Arc<dyn VectorIndex>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    breaker: Arc<CircuitBreaker>,
    embedding_memo: TtlCache<Vec<f32>>,
    config: QueryCacheConfig,
}

impl SemanticQueryCache {
    /// Create a new semantic query cache with the default configuration
    pub fn new(
        store: Arc<dyn QueryCacheStore>,
        vector_index: Arc<dyn VectorIndex>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self::with_config(
            store,
            vector_index,
            embedding_provider,
            breaker,
            QueryCacheConfig::default(),
        )
    }

    /// Create a new semantic query cache with a custom configuration
    pub fn with_config(
        store: Arc<dyn QueryCacheStore>,
        vector_index: Arc<dyn VectorIndex>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        breaker: Arc<CircuitBreaker>,
        config: QueryCacheConfig,
    ) -> Self {
        let embedding_memo = TtlCache::with_capacity(config.memo_ttl(), config.memo_capacity);

        Self {
            store,
            vector_index,
            embedding_provider,
            breaker,
            embedding_memo,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn config(&self) -> &QueryCacheConfig {
        &self.config
    }

    /// Embedding memo occupancy, for observability
    pub fn memo_stats(&self) -> CacheStats {
        self.embedding_memo.stats()
    }

    /// Look up a cached answer for the query in the given context
    ///
    /// The exact-hash path always runs before the similarity path: an exact
    /// match is authoritative and skips embedding generation and the vector
    /// query entirely. Any hit is checked against recorded feedback before
    /// it is returned.
    pub async fn find_cached_response(
        &self,
        query: &str,
        context: &QueryContext,
    ) -> Option<CachedAnswer> {
        if !self.config.enabled {
            return None;
        }

        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return None;
        }

        let hash = query_hash(&normalized);

        match self.exact_lookup(&hash, context).await {
            Ok(Some(answer)) => return Some(answer),
            Ok(None) => {}
            Err(error) if error.is_circuit_open() => {
                warn!(%error, "durable store unavailable, skipping cache lookup");
                return None;
            }
            Err(error) => {
                warn!(%error, "exact cache lookup failed, treating as miss");
                return None;
            }
        }

        match self.similarity_lookup(&normalized, context).await {
            Ok(Some(answer)) => Some(answer),
            Ok(None) => {
                debug!(query = %normalized, "cache miss");
                None
            }
            Err(error) => {
                warn!(%error, "similarity cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Persist a freshly generated answer
    ///
    /// No-op when negative feedback already exists for the query/context.
    /// Embedding or vector upsert failure is non-fatal: the entry is saved
    /// without an embedding id and stays reachable via exact hash only.
    pub async fn save_to_cache(
        &self,
        query: &str,
        context: &QueryContext,
        response: &str,
        sources: Vec<String>,
    ) {
        if !self.config.enabled {
            return;
        }

        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return;
        }

        match self.is_feedback_blocked(&normalized, context).await {
            Ok(false) => {}
            Ok(true) => {
                info!(query = %normalized, "negative feedback recorded, not persisting answer");
                return;
            }
            Err(error) => {
                warn!(%error, "feedback check failed, skipping cache save");
                return;
            }
        }

        let hash = query_hash(&normalized);
        let embedding_id = self.upsert_embedding(&normalized, &hash, context).await;

        let mut entry = QueryCacheEntry::new(
            &normalized,
            &hash,
            context,
            response,
            sources,
            self.config.entry_ttl(),
        );
        if let Some(id) = embedding_id {
            entry = entry.with_embedding_id(id);
        }

        match self.guarded("save", || self.store.save(entry)).await {
            Ok(saved) => debug!(query = %normalized, id = %saved.id, "answer cached"),
            Err(error) => warn!(%error, "failed to persist cache entry"),
        }
    }

    /// Purge expired durable entries; returns count removed (0 on failure)
    pub async fn cleanup_cache(&self) -> usize {
        match self
            .guarded("cleanup_expired", || self.store.cleanup_expired())
            .await
        {
            Ok(count) => {
                if count > 0 {
                    info!(count, "purged expired cache entries");
                }
                count
            }
            Err(error) => {
                warn!(%error, "cache cleanup failed");
                0
            }
        }
    }

    /// Spawn the periodic maintenance sweep over the embedding memo and
    /// the durable store
    pub fn spawn_maintenance(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let memo_removed = cache.embedding_memo.cleanup();
                let store_removed = cache.cleanup_cache().await;
                debug!(memo_removed, store_removed, "cache maintenance sweep");
            }
        })
    }

    async fn exact_lookup(
        &self,
        hash: &str,
        context: &QueryContext,
    ) -> Result<Option<CachedAnswer>, DomainError> {
        let entry = self
            .guarded("get_by_hash", || self.store.get_by_hash(hash, context))
            .await?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        if self.is_feedback_blocked(&entry.query_text, context).await? {
            info!(query = %entry.query_text, "cached answer suppressed by negative feedback");
            return Ok(None);
        }

        debug!(query = %entry.query_text, "exact cache hit");
        let entry = self.bump_hit_count(entry).await;

        Ok(Some(CachedAnswer::new(entry, 1.0)))
    }

    async fn similarity_lookup(
        &self,
        normalized: &str,
        context: &QueryContext,
    ) -> Result<Option<CachedAnswer>, DomainError> {
        let embedding = match self.embedding_for(normalized, context).await {
            Ok(embedding) => embedding,
            Err(error) => {
                warn!(%error, "embedding unavailable, skipping similarity lookup");
                return Ok(None);
            }
        };

        let filter = Self::context_filter(context);
        let matches = self
            .with_timeout(
                "vector_query",
                self.vector_index.query(
                    &self.config.namespace,
                    &embedding,
                    self.config.top_k,
                    &filter,
                ),
            )
            .await?;

        let best = matches
            .into_iter()
            .filter(|m| m.score >= self.config.similarity_threshold)
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        let Some(best) = best else {
            return Ok(None);
        };

        let entries = self
            .guarded("get_by_embedding_ids", || {
                self.store
                    .get_by_embedding_ids(std::slice::from_ref(&best.id), context)
            })
            .await?;

        let Some(entry) = entries.into_iter().next() else {
            debug!(embedding_id = %best.id, "vector match without durable entry");
            return Ok(None);
        };

        if self.is_feedback_blocked(&entry.query_text, context).await? {
            info!(query = %entry.query_text, "cached answer suppressed by negative feedback");
            return Ok(None);
        }

        debug!(
            query = %entry.query_text,
            similarity = best.score,
            "similarity cache hit"
        );
        let entry = self.bump_hit_count(entry).await;

        Ok(Some(CachedAnswer::new(entry, best.score)))
    }

    /// Memoized embedding lookup; on memo miss the provider is called and
    /// the result stored under the query+context key
    async fn embedding_for(
        &self,
        normalized: &str,
        context: &QueryContext,
    ) -> Result<Vec<f32>, DomainError> {
        let key = Self::memo_key(normalized, context);

        if let Some(vector) = self.embedding_memo.get(&key) {
            debug!("embedding memo hit");
            return Ok(vector);
        }

        let vector = self
            .with_timeout("embed", self.embedding_provider.embed(normalized))
            .await?;
        self.embedding_memo.set(key, vector.clone());

        Ok(vector)
    }

    fn memo_key(normalized: &str, context: &QueryContext) -> String {
        CacheKeyParams::new(normalized)
            .with_component("zone", &context.zone)
            .with_component("development", &context.development)
            .with_optional_component("document_type", context.document_type.as_deref())
            .build_with_namespace("embedding")
    }

    fn context_filter(context: &QueryContext) -> VectorFilter {
        let mut filter = VectorFilter::new()
            .with_zone(&context.zone)
            .with_development(&context.development);

        if let Some(ref document_type) = context.document_type {
            filter = filter.with_document_type(document_type);
        }

        filter
    }

    /// Embed and upsert; returns the vector id on success, None when the
    /// entry has to stay hash-only
    async fn upsert_embedding(
        &self,
        normalized: &str,
        hash: &str,
        context: &QueryContext,
    ) -> Option<String> {
        let embedding = match self.embedding_for(normalized, context).await {
            Ok(embedding) => embedding,
            Err(error) => {
                warn!(%error, "embedding failed, entry will be reachable by exact hash only");
                return None;
            }
        };

        let id = format!("qc_{}", hash);
        let metadata = VectorMetadata {
            normalized_query: normalized.to_string(),
            zone: context.zone.clone(),
            development: context.development.clone(),
            document_type: context.document_type.clone(),
            query_hash: hash.to_string(),
        };

        let upsert = self.vector_index.upsert(&self.config.namespace, &id, embedding, metadata);
        match self.with_timeout("vector_upsert", upsert).await {
            Ok(()) => Some(id),
            Err(error) => {
                warn!(%error, "vector upsert failed, entry will be reachable by exact hash only");
                None
            }
        }
    }

    async fn is_feedback_blocked(
        &self,
        normalized: &str,
        context: &QueryContext,
    ) -> Result<bool, DomainError> {
        self.guarded("has_negative_feedback", || {
            self.store.has_negative_feedback(normalized, context)
        })
        .await
    }

    /// Fire-and-forget hit counter bump; failures are logged and the
    /// returned entry reflects the new count
    async fn bump_hit_count(&self, mut entry: QueryCacheEntry) -> QueryCacheEntry {
        let id = entry.id;

        match self
            .guarded("increment_hit", || self.store.increment_hit(id))
            .await
        {
            Ok(()) => entry.hit_count += 1,
            Err(error) => debug!(%error, "failed to bump hit counter"),
        }

        entry
    }

    /// Run a durable-store call through the breaker with a timeout; a
    /// timed-out call counts as a connection failure
    async fn guarded<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let timeout = self.config.operation_timeout();

        self.breaker
            .guard(operation, move || async move {
                match tokio::time::timeout(timeout, f()).await {
                    Ok(result) => result,
                    Err(_) => Err(DomainError::connection(format!(
                        "{} timed out after {}s",
                        operation,
                        timeout.as_secs()
                    ))),
                }
            })
            .await
    }

    /// Timeout wrapper for collaborator calls outside the breaker
    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        match tokio::time::timeout(self.config.operation_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::connection(format!(
                "{} timed out after {}s",
                operation,
                self.config.operation_timeout().as_secs()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::breaker::CircuitBreakerConfig;
    use crate::domain::embedding::MockEmbeddingProvider;
    use crate::infrastructure::query_cache::InMemoryQueryCacheStore;
    use crate::infrastructure::vector::InMemoryVectorIndex;

    /// Embedding provider that counts calls, for memo assertions
    #[derive(Debug)]
    struct CountingEmbeddingProvider {
        inner: MockEmbeddingProvider,
        calls: AtomicUsize,
    }

    impl CountingEmbeddingProvider {
        fn new() -> Self {
            Self {
                inner: MockEmbeddingProvider::new("counting", 64),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbeddingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        fn provider_name(&self) -> &'static str {
            "counting"
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    struct Harness {
        cache: SemanticQueryCache,
        store: Arc<InMemoryQueryCacheStore>,
        provider: Arc<CountingEmbeddingProvider>,
        breaker: Arc<CircuitBreaker>,
    }

    fn harness(config: QueryCacheConfig) -> Harness {
        let store = Arc::new(InMemoryQueryCacheStore::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let provider = Arc::new(CountingEmbeddingProvider::new());
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::production()));

        let cache = SemanticQueryCache::with_config(
            Arc::clone(&store) as Arc<dyn QueryCacheStore>,
            index as Arc<dyn VectorIndex>,
            Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
            Arc::clone(&breaker),
            config,
        );

        Harness {
            cache,
            store,
            provider,
            breaker,
        }
    }

    fn default_harness() -> Harness {
        harness(QueryCacheConfig::default())
    }

    fn context() -> QueryContext {
        QueryContext::new("yucatan", "amura")
    }

    #[tokio::test]
    async fn test_save_then_find_exact_hit() {
        let h = default_harness();

        h.cache
            .save_to_cache(
                "precio de Amura?",
                &context(),
                "Desde $2.5M MXN",
                vec!["brochure.pdf".to_string()],
            )
            .await;

        let answer = h
            .cache
            .find_cached_response("precio de Amura?", &context())
            .await
            .expect("expected a cache hit");

        assert_eq!(answer.similarity, 1.0);
        assert_eq!(answer.entry.response, "Desde $2.5M MXN");
        assert_eq!(answer.entry.sources_used, vec!["brochure.pdf".to_string()]);
        assert_eq!(answer.entry.hit_count, 1);
        // The durable counter was bumped as well
        assert_eq!(h.store.entry(answer.entry.id).unwrap().hit_count, 1);
    }

    #[tokio::test]
    async fn test_case_difference_is_still_exact_hit() {
        let h = default_harness();

        h.cache
            .save_to_cache("precio de Amura?", &context(), "respuesta", vec![])
            .await;

        let answer = h
            .cache
            .find_cached_response("PRECIO DE AMURA?", &context())
            .await
            .expect("normalization should collapse case");

        assert_eq!(answer.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_exact_path_works_without_embeddings() {
        // Provider always fails: the entry is hash-only and the similarity
        // path is dead, so any hit proves the exact path ran first
        let store = Arc::new(InMemoryQueryCacheStore::new());
        let index = Arc::new(InMemoryVectorIndex::new());
        let provider = Arc::new(MockEmbeddingProvider::new("mock", 64).with_error("down"));
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig::production()));
        let cache = SemanticQueryCache::new(
            Arc::clone(&store) as Arc<dyn QueryCacheStore>,
            index,
            provider,
            breaker,
        );

        cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        let saved = store
            .get_by_hash(&query_hash("precio de amura?"), &context())
            .await
            .unwrap()
            .expect("entry persisted");
        assert!(saved.embedding_id.is_none());

        let answer = cache
            .find_cached_response("precio de amura?", &context())
            .await
            .expect("exact hit despite embedding provider being down");
        assert_eq!(answer.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_similarity_hit_on_paraphrase() {
        // Zero threshold: the nearest neighbor wins no matter the score,
        // which lets the deterministic mock embeddings produce a hit
        let h = harness(QueryCacheConfig::new().with_similarity_threshold(0.0));

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        let answer = h
            .cache
            .find_cached_response("cual es el precio de amura", &context())
            .await
            .expect("expected a similarity hit");

        assert_eq!(answer.entry.query_text, "precio de amura?");
        assert!(answer.similarity > 0.0 && answer.similarity <= 1.0);
        assert_eq!(answer.entry.hit_count, 1);
    }

    #[tokio::test]
    async fn test_similarity_miss_below_threshold() {
        let h = harness(QueryCacheConfig::new().with_similarity_threshold(0.999));

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        let result = h
            .cache
            .find_cached_response("horario de la oficina de ventas", &context())
            .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_negative_feedback_suppresses_exact_hit() {
        let h = default_harness();

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;
        h.store.record_negative_feedback("precio de amura?", &context());

        let result = h
            .cache
            .find_cached_response("precio de amura?", &context())
            .await;

        assert!(result.is_none());
        // The entry itself is only suppressed, not deleted
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_negative_feedback_suppresses_similarity_hit() {
        let h = harness(QueryCacheConfig::new().with_similarity_threshold(0.0));

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;
        h.store.record_negative_feedback("precio de amura?", &context());

        let result = h
            .cache
            .find_cached_response("cual es el precio de amura", &context())
            .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_save_skipped_for_poisoned_query() {
        let h = default_harness();

        h.store.record_negative_feedback("precio de amura?", &context());
        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_context_scopes_hits() {
        let h = harness(QueryCacheConfig::new().with_similarity_threshold(0.0));

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        // Same query, different development: neither path may serve it
        let other = QueryContext::new("yucatan", "aria");
        let result = h.cache.find_cached_response("precio de amura?", &other).await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_open_breaker_degrades_to_miss() {
        let h = default_harness();

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        for _ in 0..5 {
            h.breaker
                .record_failure(&DomainError::connection("connection refused"));
        }

        let result = h
            .cache
            .find_cached_response("precio de amura?", &context())
            .await;
        assert!(result.is_none());

        // Saves are silently dropped while the store is unreachable
        h.cache
            .save_to_cache("otra pregunta", &context(), "otra", vec![])
            .await;
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_embedding_memo_avoids_repeat_provider_calls() {
        let h = default_harness();

        // Two misses for the same query: one provider call
        h.cache.find_cached_response("precio de amura?", &context()).await;
        h.cache.find_cached_response("precio de amura?", &context()).await;
        assert_eq!(h.provider.call_count(), 1);

        // Same text in a different context is a different memo key
        let other = QueryContext::new("yucatan", "aria");
        h.cache.find_cached_response("precio de amura?", &other).await;
        assert_eq!(h.provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_memo_capacity_is_bounded() {
        let h = harness(QueryCacheConfig::new().with_memo_capacity(3));

        for i in 0..10 {
            h.cache
                .find_cached_response(&format!("pregunta numero {}", i), &context())
                .await;
        }

        assert!(h.cache.memo_stats().total <= 3);
    }

    #[tokio::test]
    async fn test_disabled_cache_is_inert() {
        let h = harness(QueryCacheConfig::new().with_enabled(false));

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        assert!(h.store.is_empty());
        assert!(h
            .cache
            .find_cached_response("precio de amura?", &context())
            .await
            .is_none());
        assert_eq!(h.provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_query_is_a_miss() {
        let h = default_harness();

        assert!(h.cache.find_cached_response("   ", &context()).await.is_none());
        h.cache.save_to_cache("  \t ", &context(), "respuesta", vec![]).await;
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_cache_reports_count() {
        let h = default_harness();

        let mut stale = QueryCacheEntry::new(
            "vieja pregunta",
            "h-old",
            &context(),
            "respuesta",
            vec![],
            chrono::Duration::days(30),
        );
        stale.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        h.store.save(stale).await.unwrap();

        assert_eq!(h.cache.cleanup_cache().await, 1);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_sweep_purges_expired() {
        let h = default_harness();
        let cache = Arc::new(h.cache);

        let mut stale = QueryCacheEntry::new(
            "vieja pregunta",
            "h-old",
            &context(),
            "respuesta",
            vec![],
            chrono::Duration::days(30),
        );
        stale.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        h.store.save(stale).await.unwrap();

        let handle = cache.spawn_maintenance(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.abort();

        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_entry_ttl_applied_on_save() {
        let h = default_harness();

        h.cache
            .save_to_cache("precio de amura?", &context(), "respuesta", vec![])
            .await;

        let entry = h
            .store
            .get_by_hash(&query_hash("precio de amura?"), &context())
            .await
            .unwrap()
            .unwrap();

        let ttl = entry.expires_at - entry.created_at;
        assert_eq!(ttl, chrono::Duration::days(30));
    }
}
