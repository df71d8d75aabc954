//! Pay-to-relay gate endpoints. This relay never settles payment itself
//! (settlement is a named non-goal) — these routes only check and record the
//! `paid_pubkeys` gate an external payment processor would populate.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use axum::Json as JsonBody;
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct PubkeyQuery {
    pubkey: String,
}

pub async fn check(State(state): State<AppState>, Query(q): Query<PubkeyQuery>) -> Response {
    if !state.config.pay_to_relay_enabled {
        return Json(json!({ "paid": true, "enabled": false })).into_response();
    }

    let row = sqlx::query("SELECT 1 FROM paid_pubkeys WHERE pubkey = $1")
        .bind(&q.pubkey)
        .fetch_optional(state.store.pool())
        .await;

    let paid = matches!(row, Ok(Some(_)));
    Json(json!({
        "paid": paid,
        "enabled": true,
        "price_sats": state.config.pay_to_relay_price_sats,
        "pay_to": state.config.pay_to_relay_pubkey,
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct NotifyPayment {
    pubkey: String,
    amount_sats: i64,
}

/// Records a completed payment. A real deployment would verify this call
/// against the processor's webhook signature; that verification step is the
/// "payment gateway" the spec lists as an external collaborator.
pub async fn notify(State(state): State<AppState>, JsonBody(body): JsonBody<NotifyPayment>) -> Response {
    let result = sqlx::query(
        "INSERT INTO paid_pubkeys (pubkey, amount) VALUES ($1, $2)
         ON CONFLICT (pubkey) DO UPDATE SET amount = paid_pubkeys.amount + EXCLUDED.amount, paid_at = now()",
    )
    .bind(&body.pubkey)
    .bind(body.amount_sats)
    .execute(state.store.pool())
    .await;

    match result {
        Ok(_) => Json(json!({ "recorded": true })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to record payment");
            Json(json!({ "recorded": false })).into_response()
        }
    }
}
