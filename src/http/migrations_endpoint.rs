//! `/_migrations` diagnostic endpoint: lists the migrations `sqlx::migrate!`
//! has recorded as applied, from its `_sqlx_migrations` bookkeeping table.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use sqlx::Row;

use crate::state::AppState;

pub async fn applied(State(state): State<AppState>) -> Response {
    let rows = sqlx::query(
        "SELECT version, description, installed_on, success
         FROM _sqlx_migrations ORDER BY version ASC",
    )
    .fetch_all(state.store.pool())
    .await;

    match rows {
        Ok(rows) => {
            let migrations: Vec<_> = rows
                .iter()
                .map(|r| {
                    let version: i64 = r.get("version");
                    let description: String = r.get("description");
                    let installed_on: chrono::DateTime<chrono::Utc> = r.get("installed_on");
                    let success: bool = r.get("success");
                    json!({
                        "version": version,
                        "description": description,
                        "installed_on": installed_on.to_rfc3339(),
                        "success": success,
                    })
                })
                .collect();
            Json(json!({ "migrations": migrations })).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to read migration history");
            Json(json!({ "migrations": [] })).into_response()
        }
    }
}
