use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::engine::executor::{dry_run_receipt, execute};
use crate::error::EngineError;
use crate::models::workflow::TriggerKind;
use crate::responses::{created, ok, Envelope};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/dry-run", post(dry_run))
        .route("/{id}/toggle", put(toggle))
        .route("/{id}", axum::routing::delete(delete_workflow))
}

#[derive(Deserialize)]
struct CreateWorkflowBody {
    name: String,
    trigger_kind: TriggerKind,
    action_kind: String,
    config: Value,
    #[serde(default)]
    action_chain: Value,
}

#[derive(Serialize)]
struct WorkflowView {
    id: Uuid,
    name: String,
    trigger_kind: TriggerKind,
    action_kind: String,
    config: Value,
    action_chain: Value,
    active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    last_executed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl From<crate::models::Workflow> for WorkflowView {
    fn from(w: crate::models::Workflow) -> Self {
        Self {
            id: w.id,
            name: w.name,
            trigger_kind: w.trigger_kind,
            action_kind: w.action_kind,
            config: w.config,
            action_chain: w.action_chain,
            active: w.active,
            last_executed_at: w.last_executed_at,
            created_at: w.created_at,
        }
    }
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    axum::Json(body): axum::Json<CreateWorkflowBody>,
) -> Result<Envelope<WorkflowView>, EngineError> {
    if body.name.trim().is_empty() {
        return Err(EngineError::Validation("name is required".to_string()));
    }
    if state.connectors.get(&body.action_kind).is_none() {
        return Err(EngineError::Validation(format!(
            "unknown action kind: {}",
            body.action_kind
        )));
    }
    let action_chain = if body.action_chain.is_null() {
        Value::Array(vec![])
    } else {
        body.action_chain
    };

    let workflow = state
        .store
        .create_workflow(
            user.user_id,
            body.name.trim(),
            body.trigger_kind,
            &body.action_kind,
            body.config,
            action_chain,
        )
        .await?;

    Ok(created(WorkflowView::from(workflow)))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Envelope<Vec<WorkflowView>>, EngineError> {
    let workflows = state.store.list_workflows(user.user_id).await?;
    Ok(ok(workflows.into_iter().map(WorkflowView::from).collect()))
}

async fn toggle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Envelope<WorkflowView>, EngineError> {
    let workflow = state.store.get_workflow(id).await?.ok_or(EngineError::NotFound)?;
    if workflow.owner_id != user.user_id {
        return Err(EngineError::Forbidden);
    }
    state.store.set_workflow_active(id, !workflow.active).await?;
    let updated = state.store.get_workflow(id).await?.ok_or(EngineError::NotFound)?;
    Ok(ok(WorkflowView::from(updated)))
}

async fn delete_workflow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Envelope<()>, EngineError> {
    let workflow = state.store.get_workflow(id).await?.ok_or(EngineError::NotFound)?;
    if workflow.owner_id != user.user_id {
        return Err(EngineError::Forbidden);
    }
    state.store.delete_workflow(id).await?;
    Ok(ok(()))
}

#[derive(Deserialize)]
struct DryRunBody {
    name: String,
    trigger_kind: TriggerKind,
    action_kind: String,
    config: Value,
    #[serde(default)]
    action_chain: Value,
    #[serde(default)]
    trigger_payload: Value,
}

/// Runs the chain synchronously against a throwaway, never-persisted
/// workflow. No log row, no `last_executed_at` touch, no credential writes.
async fn dry_run(
    State(state): State<AppState>,
    user: AuthUser,
    axum::Json(body): axum::Json<DryRunBody>,
) -> Result<Envelope<Value>, EngineError> {
    if state.connectors.get(&body.action_kind).is_none() {
        return Err(EngineError::Validation(format!(
            "unknown action kind: {}",
            body.action_kind
        )));
    }
    let action_chain = if body.action_chain.is_null() {
        Value::Array(vec![])
    } else {
        body.action_chain
    };

    let workflow = crate::models::Workflow {
        id: Uuid::new_v4(),
        owner_id: user.user_id,
        name: body.name,
        trigger_kind: body.trigger_kind,
        action_kind: body.action_kind,
        config: body.config,
        action_chain,
        active: true,
        last_executed_at: None,
        created_at: OffsetDateTime::now_utc(),
    };

    let outcome = execute(
        state.store.as_ref(),
        state.vault.as_ref(),
        state.connectors.as_ref(),
        state.breakers.as_ref(),
        &workflow,
        body.trigger_payload,
        true,
        CancellationToken::new(),
    )
    .await;

    Ok(ok(dry_run_receipt(&outcome)))
}
