//! Query normalization and hashing

use sha2::{Digest, Sha256};

/// Normalize a raw query: lowercase, collapse whitespace runs, trim
pub fn normalize_query(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 hex digest of a normalized query
///
/// Callers must pass already-normalized text; the hash is the exact-match
/// key for durable entries.
pub fn query_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases() {
        assert_eq!(normalize_query("Precio De AMURA?"), "precio de amura?");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_query("  precio   de\tamura \n"),
            "precio de amura"
        );
    }

    #[test]
    fn test_case_and_whitespace_variants_hash_equal() {
        let a = query_hash(&normalize_query("Precio de Amura?"));
        let b = query_hash(&normalize_query("  precio   DE amura?  "));

        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_queries_hash_differently() {
        let a = query_hash(&normalize_query("precio de amura"));
        let b = query_hash(&normalize_query("precio de aria"));

        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = query_hash("precio de amura?");

        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
