//! NIP-11 relay information document (spec §6), including the vendor
//! extension schema under `divine_extensions`.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::event::VIDEO_KIND;
use crate::query::filter::{MAX_INT_FILTERS, MAX_TAG_VALUES_ARRAY};
use crate::state::AppState;
use crate::video::VerificationLevel;

const SUPPORTED_NIPS: &[u32] = &[1, 2, 4, 5, 9, 11, 12, 15, 16, 17, 20, 22, 33, 40, 50];
const METRICS_FRESHNESS_SEC: u64 = 3600;
const SORT_FIELDS: &[&str] = &["loop_count", "likes", "views", "comments", "avg_completion", "created_at"];
const INT_METRICS: &[&str] = &[
    "loop_count",
    "likes",
    "views",
    "comments",
    "avg_completion",
    "has_proofmode",
    "has_device_attestation",
    "has_pgp_signature",
];
const VERIFICATION_LEVELS: &[&str] = &["verified_mobile", "verified_web", "basic_proof", "unverified"];
const SEARCH_ENTITY_TYPES: &[&str] = &["users", "notes", "videos", "lists", "articles", "communities", "hashtags"];

pub async fn info(State(state): State<AppState>) -> Response {
    let cfg = &state.config;
    let verification_levels: Vec<&str> = VERIFICATION_LEVELS.to_vec();
    let _ = VerificationLevel::Unverified; // keeps the enum linked to the advertised level list

    let doc = json!({
        "name": cfg.relay_name,
        "description": cfg.relay_description,
        "pubkey": cfg.relay_pubkey,
        "contact": cfg.relay_contact,
        "supported_nips": SUPPORTED_NIPS,
        "limitation": {
            "payment_required": cfg.pay_to_relay_enabled,
            "restricted_writes": cfg.pay_to_relay_enabled || cfg.pubkey_allowlist.is_some(),
        },
        "divine_extensions": {
            "int_filters": INT_METRICS,
            "sort_fields": SORT_FIELDS,
            "max_int_filters": MAX_INT_FILTERS,
            "max_tag_values": MAX_TAG_VALUES_ARRAY,
            "cursor_format": "base64url-encoded HMAC-SHA256 with query hash binding",
            "videos_kind": VIDEO_KIND,
            "metrics_freshness_sec": METRICS_FRESHNESS_SEC,
            "limit_max": cfg.projection_limit_max,
            "proofmode": {
                "enabled": true,
                "verification_filter": "verification",
                "verification_levels": verification_levels,
                "tags": ["proofmode", "device_attestation", "pgp_fingerprint"],
                "info_url": "https://proofmode.org",
            },
        },
        "search": {
            "enabled": true,
            "entity_types": SEARCH_ENTITY_TYPES,
            "extensions": ["search", "search_types"],
            "max_results": cfg.projection_limit_max,
            "ranking_algorithm": "bm25",
            "features": ["prefix_matching", "autocomplete", "snippet_generation", "relevance_scoring"],
        },
    });

    ([(axum::http::header::CONTENT_TYPE, "application/nostr+json")], Json(doc)).into_response()
}

pub async fn landing_page() -> Response {
    "A Nostr relay specialized for short-form video.".into_response()
}
