//! C11 — relay coordinator / frontend: the stateless HTTP surface plus the
//! WebSocket upgrade route, assembled exactly as the teacher builds its
//! router (`Router::new().route(...).with_state(...)`).

pub mod migrations_endpoint;
pub mod nip11;
pub mod payment;
pub mod wellknown;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws::handler;

/// `GET /`: NIP-11 info document when the client asks for
/// `application/nostr+json`, otherwise the landing page. Also the WebSocket
/// upgrade point, since Nostr relays conventionally serve both off `/`.
async fn root(
    ws: Option<axum::extract::ws::WebSocketUpgrade>,
    headers: HeaderMap,
    state: State<AppState>,
) -> Response {
    if let Some(ws) = ws {
        return handler::upgrade(ws, headers, state).await;
    }

    if let Some(accept) = headers.get(axum::http::header::ACCEPT) {
        if accept.to_str().unwrap_or_default().contains("application/nostr+json") {
            return nip11::info(state).await;
        }
    }

    nip11::landing_page().await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/.well-known/nostr.json", get(wellknown::lookup))
        .route("/_migrations", get(migrations_endpoint::applied))
        .route("/payment/check", get(payment::check))
        .route("/payment/notify", post(payment::notify))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
