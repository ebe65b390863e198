use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::EngineError;
use crate::responses::{created, ok, Envelope};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
}

#[derive(Deserialize)]
struct CreateCredentialBody {
    service_name: String,
    value: String,
}

#[derive(Serialize)]
struct CredentialView {
    id: Uuid,
    service_name: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    axum::Json(body): axum::Json<CreateCredentialBody>,
) -> Result<Envelope<CredentialView>, EngineError> {
    if body.service_name.trim().is_empty() {
        return Err(EngineError::Validation("service_name is required".to_string()));
    }
    if body.value.is_empty() {
        return Err(EngineError::Validation("value is required".to_string()));
    }

    let encrypted = state
        .vault
        .encrypt(&body.value)
        .map_err(|err| EngineError::Internal(anyhow::anyhow!(err)))?;

    let credential = state
        .store
        .create_credential(user.user_id, body.service_name.trim(), &encrypted)
        .await?;

    Ok(created(CredentialView {
        id: credential.id,
        service_name: credential.service_name,
        created_at: credential.created_at,
    }))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Envelope<Vec<CredentialView>>, EngineError> {
    let credentials = state.store.list_credentials(user.user_id).await?;
    Ok(ok(credentials
        .into_iter()
        .map(|c| CredentialView {
            id: c.id,
            service_name: c.service_name,
            created_at: c.created_at,
        })
        .collect()))
}
