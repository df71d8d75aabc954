//! WebSocket upgrade entry point (spec §4.10/§4.9): resolves the caller's
//! home shard via [`LocationRouter`] before handing the socket to
//! [`session::run`].

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::state::AppState;
use crate::ws::session;

const UNKNOWN: &str = "ZZ";

fn header_or_unknown<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or(UNKNOWN)
}

pub async fn upgrade(ws: WebSocketUpgrade, headers: HeaderMap, State(state): State<AppState>) -> Response {
    let continent = header_or_unknown(&headers, "x-geo-continent");
    let country = header_or_unknown(&headers, "x-geo-country");
    let region = header_or_unknown(&headers, "x-geo-region");
    let shard_id = state.router.resolve(continent, country, region).to_string();

    let shard = match state.broker.shard(&shard_id) {
        Some(s) => s,
        None => {
            warn!(shard = %shard_id, "resolved shard has no running actor, falling back to any shard");
            match state.broker.shard_ids().first().and_then(|id| state.broker.shard(id)) {
                Some(s) => s,
                None => return axum::http::StatusCode::SERVICE_UNAVAILABLE.into_response(),
            }
        }
    };

    ws.on_upgrade(move |socket| session::run(socket, state, shard))
}
