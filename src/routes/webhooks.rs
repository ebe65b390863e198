use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::workflow::TriggerKind;
use crate::models::IdempotencyClaim;
use crate::responses::{accepted, ok, Envelope};
use crate::state::AppState;
use crate::worker::{Job, SubmitError};

pub fn router() -> Router<AppState> {
    Router::new().route("/{workflow_id}", post(ingest))
}

const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Public, unauthenticated ingress. A workflow that is missing, inactive, or
/// not a webhook trigger is indistinguishable from the outside: both return
/// 404, so this endpoint never leaks which workflow IDs exist.
async fn ingest(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<Value>,
) -> Result<Envelope<Value>, EngineError> {
    let workflow = state
        .store
        .get_workflow(workflow_id)
        .await?
        .filter(|w| w.active && w.trigger_kind == TriggerKind::Webhook)
        .ok_or(EngineError::NotFound)?;

    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let receipt = serde_json::json!({
        "workflow_id": workflow.id,
        "accepted": true,
    });

    // The atomic claim is the gate, not a prior plain read: two
    // near-simultaneous deliveries with the same key race on this insert and
    // exactly one of them wins and proceeds to submit.
    if let Some(key) = &idempotency_key {
        match state
            .store
            .put_idempotency_record(workflow_id, key, receipt.clone())
            .await?
        {
            IdempotencyClaim::Existing(existing) => {
                return Ok(ok(existing.result_snapshot));
            }
            IdempotencyClaim::Created(_) => {}
        }
    }

    let cancellation = CancellationToken::new();
    let job = Job {
        workflow: workflow.clone(),
        trigger_payload: payload,
        dry_run: false,
        idempotency_key: idempotency_key.clone(),
        cancellation,
    };

    match state.worker_pool.submit(job).await {
        Ok(()) => Ok(accepted(receipt)),
        Err(SubmitError::Overloaded) | Err(SubmitError::Closed) => {
            // The job never ran, so the claimed record must not keep
            // replaying the optimistic "accepted" snapshot forever.
            if let Some(key) = idempotency_key {
                let dropped = serde_json::json!({
                    "workflow_id": workflow.id,
                    "accepted": false,
                    "error": "worker pool overloaded",
                });
                let _ = state
                    .store
                    .update_idempotency_snapshot(workflow_id, &key, dropped)
                    .await;
            }
            Err(EngineError::Overloaded)
        }
    }
}
