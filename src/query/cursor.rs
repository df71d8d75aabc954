//! C6 — cursor authenticator (spec §4.6): HMAC-signed, query-bound keyset
//! pagination cursors.
//!
//! Grounded on `jmanm-nostr-rs-relay`'s `hmac`+`sha2` pair for an analogous
//! signed-token purpose; payload framing is base64url, as `servuscms-servus`
//! uses for its own opaque tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{RelayError, Result};
use crate::query::filter::{SortDir, SortField};

type HmacSha256 = Hmac<Sha256>;

/// Recursively sorts every object's keys so the resulting JSON is a stable
/// byte sequence regardless of field insertion order (spec §4.6: "canonical
/// (lex-sorted keys, recursively) JSON").
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> = map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Strips the `cursor` field before hashing: page 1 is requested without a
/// `cursor` key and page N resends the same filter plus `cursor`, so the
/// binding hash must be computed over the filter minus that one field or
/// every continuation request would fail its own query-hash check.
fn filter_without_cursor(filter: &Value) -> Value {
    match filter {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove("cursor");
            Value::Object(map)
        }
        other => other.clone(),
    }
}

fn canonical_query_bytes(filter: &Value, sort: &Value) -> Vec<u8> {
    let wrapper = serde_json::json!({ "filter": canonicalize(&filter_without_cursor(filter)), "sort": canonicalize(sort) });
    serde_json::to_vec(&wrapper).expect("canonical query JSON never fails to serialize")
}

fn hmac_tag(secret: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CursorPayload {
    pub sort_field: String,
    pub sort_dir: String,
    pub sort_field_value: f64,
    pub created_at: i64,
    pub event_id: String,
    pub query_hash: String,
}

impl CursorPayload {
    pub fn sort_field(&self) -> Option<SortField> {
        match self.sort_field.as_str() {
            "loop_count" => Some(SortField::LoopCount),
            "likes" => Some(SortField::Likes),
            "views" => Some(SortField::Views),
            "comments" => Some(SortField::Comments),
            "avg_completion" => Some(SortField::AvgCompletion),
            "created_at" => Some(SortField::CreatedAt),
            _ => None,
        }
    }

    pub fn sort_dir(&self) -> Option<SortDir> {
        match self.sort_dir.as_str() {
            "asc" => Some(SortDir::Asc),
            "desc" => Some(SortDir::Desc),
            _ => None,
        }
    }
}

/// Encodes a keyset position into an opaque, authenticated cursor string.
///
/// `filter`/`sort` are the raw JSON of the originating request, used only to
/// compute the binding `query_hash` — they are not embedded in the cursor.
pub fn encode(
    secret: &[u8],
    sort_field: &str,
    sort_dir: &str,
    sort_field_value: f64,
    created_at: i64,
    event_id: &str,
    filter: &Value,
    sort: &Value,
) -> String {
    let query_hash = hex::encode(hmac_tag(secret, &canonical_query_bytes(filter, sort)));
    let payload = CursorPayload {
        sort_field: sort_field.to_string(),
        sort_dir: sort_dir.to_string(),
        sort_field_value,
        created_at,
        event_id: event_id.to_string(),
        query_hash,
    };
    let payload_bytes = serde_json::to_vec(&payload).expect("cursor payload always serializes");
    let tag = hmac_tag(secret, &payload_bytes);
    let envelope = serde_json::json!({
        "payload": URL_SAFE_NO_PAD.encode(&payload_bytes),
        "hmac": URL_SAFE_NO_PAD.encode(&tag),
    });
    URL_SAFE_NO_PAD.encode(serde_json::to_vec(&envelope).expect("envelope always serializes"))
}

/// Decodes and verifies a cursor against the current query, trying `secret`
/// first and then `secret_previous` (rotation support, spec §4.6).
pub fn decode(
    cursor: &str,
    secret: &[u8],
    secret_previous: Option<&[u8]>,
    filter: &Value,
    sort: &Value,
) -> Result<CursorPayload> {
    let envelope_bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| RelayError::CursorTampered)?;
    let envelope: Value = serde_json::from_slice(&envelope_bytes).map_err(|_| RelayError::CursorTampered)?;
    let payload_b64 = envelope.get("payload").and_then(|v| v.as_str()).ok_or(RelayError::CursorTampered)?;
    let hmac_b64 = envelope.get("hmac").and_then(|v| v.as_str()).ok_or(RelayError::CursorTampered)?;
    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| RelayError::CursorTampered)?;
    let tag = URL_SAFE_NO_PAD.decode(hmac_b64).map_err(|_| RelayError::CursorTampered)?;

    let secrets = std::iter::once(secret).chain(secret_previous);
    let mut outer_ok = false;
    for s in secrets {
        if hmac_tag(s, &payload_bytes) == tag {
            outer_ok = true;
            break;
        }
    }
    if !outer_ok {
        return Err(RelayError::CursorTampered);
    }

    let payload: CursorPayload = serde_json::from_slice(&payload_bytes).map_err(|_| RelayError::CursorTampered)?;

    let expected_hash = hex::encode(hmac_tag(secret, &canonical_query_bytes(filter, sort)));
    let expected_hash_previous = secret_previous.map(|s| hex::encode(hmac_tag(s, &canonical_query_bytes(filter, sort))));
    if payload.query_hash != expected_hash && Some(&payload.query_hash) != expected_hash_previous.as_ref() {
        return Err(RelayError::CursorQueryMismatch);
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_with_the_same_secret() {
        let secret = b"a-relay-secret";
        let filter = json!({"kinds": [34236]});
        let sort = json!({"field": "loop_count", "dir": "desc"});
        let cursor = encode(secret, "loop_count", "desc", 200.0, 7, "eventid", &filter, &sort);
        let decoded = decode(&cursor, secret, None, &filter, &sort).unwrap();
        assert_eq!(decoded.sort_field, "loop_count");
        assert_eq!(decoded.event_id, "eventid");
    }

    #[test]
    fn fails_with_a_different_secret() {
        let filter = json!({"kinds": [34236]});
        let sort = json!({"field": "loop_count", "dir": "desc"});
        let cursor = encode(b"secret-a", "loop_count", "desc", 200.0, 7, "eventid", &filter, &sort);
        assert!(decode(&cursor, b"secret-b", None, &filter, &sort).is_err());
    }

    #[test]
    fn succeeds_against_previous_secret_during_rotation() {
        let filter = json!({"kinds": [34236]});
        let sort = json!({"field": "loop_count", "dir": "desc"});
        let cursor = encode(b"old-secret", "loop_count", "desc", 200.0, 7, "eventid", &filter, &sort);
        let decoded = decode(&cursor, b"new-secret", Some(b"old-secret"), &filter, &sort).unwrap();
        assert_eq!(decoded.event_id, "eventid");
    }

    #[test]
    fn rejects_a_mutated_query_hash() {
        let secret = b"a-relay-secret";
        let filter = json!({"kinds": [34236]});
        let sort = json!({"field": "loop_count", "dir": "desc"});
        let cursor = encode(secret, "loop_count", "desc", 200.0, 7, "eventid", &filter, &sort);
        let different_sort = json!({"field": "loop_count", "dir": "asc"});
        let result = decode(&cursor, secret, None, &filter, &different_sort);
        assert!(matches!(result, Err(RelayError::CursorQueryMismatch)));
    }

    #[test]
    fn canonicalization_is_stable_under_key_permutation() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn continuation_request_with_cursor_field_still_matches_page_one_hash() {
        let secret = b"a-relay-secret";
        let sort = json!({"field": "loop_count", "dir": "desc"});
        let page_one_filter = json!({"kinds": [34236]});
        let cursor = encode(secret, "loop_count", "desc", 200.0, 7, "eventid", &page_one_filter, &sort);

        // The client resends the identical filter plus the cursor it was given.
        let continuation_filter = json!({"kinds": [34236], "cursor": cursor});
        let decoded = decode(&cursor, secret, None, &continuation_filter, &sort).unwrap();
        assert_eq!(decoded.event_id, "eventid");
    }
}
