//! Deterministic cache key construction

use std::collections::BTreeMap;

/// Parameters for building a memo cache key
///
/// Components are kept sorted (BTreeMap) and empty values are dropped, so two
/// logically-identical parameter sets always produce the same key regardless
/// of the order the call site added them in.
#[derive(Debug, Clone, Default)]
pub struct CacheKeyParams {
    /// Primary identifier (e.g., the normalized query text)
    primary: String,
    /// Secondary components, sorted by name
    components: BTreeMap<String, String>,
}

impl CacheKeyParams {
    /// Creates new cache key parameters with a primary identifier
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            components: BTreeMap::new(),
        }
    }

    /// Adds a component; empty values are dropped
    pub fn with_component(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();

        if !value.is_empty() {
            self.components.insert(key.into(), value);
        }

        self
    }

    /// Adds a component only when a value is present
    pub fn with_optional_component(self, key: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.with_component(key, v),
            None => self,
        }
    }

    /// Builds the key string: `primary:k1=v1:k2=v2` with components sorted
    pub fn build(&self) -> String {
        let mut parts = vec![self.primary.clone()];

        for (k, v) in &self.components {
            parts.push(format!("{}={}", k, v));
        }

        parts.join(":")
    }

    /// Builds the key with a namespace prefix
    pub fn build_with_namespace(&self, namespace: &str) -> String {
        format!("{}:{}", namespace, self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_params_new() {
        let params = CacheKeyParams::new("test-key");
        assert_eq!(params.build(), "test-key");
    }

    #[test]
    fn test_components_are_sorted() {
        let params = CacheKeyParams::new("test")
            .with_component("zebra", "z")
            .with_component("apple", "a")
            .with_component("mango", "m");

        assert_eq!(params.build(), "test:apple=a:mango=m:zebra=z");
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let a = CacheKeyParams::new("q")
            .with_component("zone", "yucatan")
            .with_component("development", "amura");
        let b = CacheKeyParams::new("q")
            .with_component("development", "amura")
            .with_component("zone", "yucatan");

        assert_eq!(a.build(), b.build());
    }

    #[test]
    fn test_empty_components_dropped() {
        let params = CacheKeyParams::new("q")
            .with_component("zone", "yucatan")
            .with_component("document_type", "");

        assert_eq!(params.build(), "q:zone=yucatan");
    }

    #[test]
    fn test_optional_component() {
        let with_type = CacheKeyParams::new("q")
            .with_optional_component("document_type", Some("brochure"))
            .build();
        let without_type = CacheKeyParams::new("q")
            .with_optional_component("document_type", None)
            .build();

        assert_eq!(with_type, "q:document_type=brochure");
        assert_eq!(without_type, "q");
    }

    #[test]
    fn test_build_with_namespace() {
        let params = CacheKeyParams::new("user-123");
        assert_eq!(params.build_with_namespace("embeddings"), "embeddings:user-123");
    }
}
