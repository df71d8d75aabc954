//! `.well-known/nostr.json` responder: this relay acts as the NIP-05
//! identity server for its own users, resolving `name` to the pubkey of the
//! most recent kind-0 profile advertising `nip05: "<name>@<any domain>"`.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct NameQuery {
    name: Option<String>,
}

pub async fn lookup(State(state): State<AppState>, Query(q): Query<NameQuery>) -> Response {
    let Some(name) = q.name.filter(|n| !n.is_empty()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let pattern = format!("{name}@%");
    let row = sqlx::query(
        "SELECT pubkey FROM events
         WHERE kind = 0 AND content::jsonb ->> 'nip05' ILIKE $1
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(&pattern)
    .fetch_optional(state.store.pool())
    .await;

    match row {
        Ok(Some(r)) => {
            let pubkey: String = r.get("pubkey");
            Json(json!({
                "names": { (name): pubkey.clone() },
                "relays": { (pubkey): ([] as [&str; 0]) },
            }))
            .into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
