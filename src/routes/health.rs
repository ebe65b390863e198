use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde_json::json;

use crate::responses::{ok, Envelope};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
        .route("/live", get(live))
        .route("/ready", get(ready))
}

async fn health() -> Envelope<serde_json::Value> {
    ok(json!({ "status": "ok" }))
}

/// Always 200 once the process is up; does not touch the database. Used by
/// the orchestrator to decide whether to restart the container.
async fn live() -> Envelope<serde_json::Value> {
    ok(json!({ "status": "live" }))
}

/// Gated on the database connection actually answering. Used by the
/// orchestrator to decide whether to route traffic to this instance.
async fn ready(State(state): State<AppState>) -> Result<Envelope<serde_json::Value>, StatusCode> {
    match state.store.ping().await {
        Ok(()) => Ok(ok(json!({ "status": "ready" }))),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}
