//! Deterministic node-key hashing for identifier synthesis.
//!
//! Synthesized identifiers must be a pure function of (type, node key) so
//! that resolving the logically same node twice in one build yields the
//! same identifier. The key is a truncated, domain-separated SHA-256 of
//! the node's identity seed.

use sha2::{Digest, Sha256};

/// Domain separation label. Must remain stable across versions.
const ID_DOMAIN: &str = "pagegraph.v1.id";

/// Hex length of the truncated digest used in `#/schema/{slug}/{key}`.
const KEY_LEN: usize = 10;

/// Compute the identifier suffix key for a node of `type_slug` with the
/// given identity seed.
pub fn node_key(type_slug: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ID_DOMAIN.as_bytes());
    hasher.update([0x1f]);
    hasher.update(type_slug.as_bytes());
    hasher.update([0x1f]);
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..KEY_LEN].to_string()
}

/// Lowercase slug of a type name, used in synthesized fragments
/// (`Organization` -> `organization`).
pub fn type_slug(type_name: &str) -> String {
    type_name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable_and_truncated() {
        let a = node_key("organization", "Acme");
        let b = node_key("organization", "Acme");
        assert_eq!(a, b);
        assert_eq!(a.len(), KEY_LEN);
    }

    #[test]
    fn key_separates_type_and_seed() {
        assert_ne!(node_key("organization", "Acme"), node_key("person", "Acme"));
        assert_ne!(
            node_key("organization", "Acme"),
            node_key("organization", "Other")
        );
        // The separator must prevent boundary ambiguity.
        assert_ne!(node_key("ab", "c"), node_key("a", "bc"));
    }

    #[test]
    fn slug_lowercases() {
        assert_eq!(type_slug("ImageObject"), "imageobject");
    }
}
