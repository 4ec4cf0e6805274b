//! Service layer composing the infrastructure pieces

mod semantic_query_cache;

pub use semantic_query_cache::SemanticQueryCache;
