//! Canonical serialization, id computation, and content-hash computation.
//!
//! These are pure functions deliberately kept free of any `nostr::Event`
//! dependency so they can be unit tested without pulling in signature
//! verification, and so the id-invariant check (spec §8: "for every accepted
//! event e, sha256(canonical(e)) == e.id") is independently verifiable from
//! whatever `event.verify()` the `nostr` crate does internally.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// `[0, pubkey, created_at, kind, tags, content]`, compact JSON, per NIP-01.
pub fn canonical_json(pubkey_hex: &str, created_at: i64, kind: u64, tags: &[Vec<String>], content: &str) -> String {
    let tags_value: Value = Value::Array(
        tags.iter()
            .map(|t| Value::Array(t.iter().map(|v| Value::String(v.clone())).collect()))
            .collect(),
    );
    let arr = Value::Array(vec![
        Value::Number(0.into()),
        Value::String(pubkey_hex.to_lowercase()),
        Value::Number(created_at.into()),
        Value::Number(kind.into()),
        tags_value,
        Value::String(content.to_string()),
    ]);
    // serde_json's default writer never inserts whitespace, matching the
    // compact-JSON requirement of NIP-01 canonicalization.
    serde_json::to_string(&arr).expect("canonical array always serializes")
}

pub fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Recomputes the event id from its constituent fields and returns the hex
/// digest for comparison against the event's claimed `id`.
pub fn compute_event_id(pubkey_hex: &str, created_at: i64, kind: u64, tags: &[Vec<String>], content: &str) -> String {
    sha256_hex(&canonical_json(pubkey_hex, created_at, kind, tags, content))
}

/// Global content hash for anti-spam dedup: sha256 of `{kind, tags, content}`.
pub fn global_content_hash(kind: u64, tags: &[Vec<String>], content: &str) -> String {
    let tags_value: Value = Value::Array(
        tags.iter()
            .map(|t| Value::Array(t.iter().map(|v| Value::String(v.clone())).collect()))
            .collect(),
    );
    let obj = serde_json::json!({ "kind": kind, "tags": tags_value, "content": content });
    sha256_hex(&serde_json::to_string(&obj).expect("json object always serializes"))
}

/// Per-pubkey content hash for anti-spam dedup: sha256 of
/// `{pubkey, kind, tags, content}`.
pub fn per_pubkey_content_hash(pubkey_hex: &str, kind: u64, tags: &[Vec<String>], content: &str) -> String {
    let tags_value: Value = Value::Array(
        tags.iter()
            .map(|t| Value::Array(t.iter().map(|v| Value::String(v.clone())).collect()))
            .collect(),
    );
    let obj = serde_json::json!({
        "pubkey": pubkey_hex.to_lowercase(),
        "kind": kind,
        "tags": tags_value,
        "content": content,
    });
    sha256_hex(&serde_json::to_string(&obj).expect("json object always serializes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_is_compact_and_stable() {
        let tags = vec![vec!["e".to_string(), "abc".to_string()]];
        let a = canonical_json("ABCDEF", 100, 1, &tags, "hello");
        let b = canonical_json("abcdef", 100, 1, &tags, "hello");
        assert_eq!(a, b, "pubkey is lowercased consistently");
        assert!(!a.contains(' '), "no whitespace in canonical form");
        assert_eq!(a, r#"[0,"abcdef",100,1,[["e","abc"]],"hello"]"#);
    }

    #[test]
    fn same_logical_event_produces_same_id() {
        let tags = vec![vec!["t".to_string(), "music".to_string()]];
        let id1 = compute_event_id("deadbeef", 5, 34236, &tags, "hi");
        let id2 = compute_event_id("deadbeef", 5, 34236, &tags, "hi");
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 64);
    }

    #[test]
    fn different_content_changes_id() {
        let tags: Vec<Vec<String>> = vec![];
        let id1 = compute_event_id("deadbeef", 5, 1, &tags, "hi");
        let id2 = compute_event_id("deadbeef", 5, 1, &tags, "bye");
        assert_ne!(id1, id2);
    }

    #[test]
    fn content_hashes_distinguish_global_from_per_pubkey() {
        let tags: Vec<Vec<String>> = vec![];
        let global = global_content_hash(1, &tags, "spam");
        let per_pubkey_a = per_pubkey_content_hash("aaaa", 1, &tags, "spam");
        let per_pubkey_b = per_pubkey_content_hash("bbbb", 1, &tags, "spam");
        assert_ne!(global, per_pubkey_a);
        assert_ne!(per_pubkey_a, per_pubkey_b);
    }
}
