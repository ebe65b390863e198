use axum::extract::State;
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::issue_token;
use crate::error::EngineError;
use crate::models::User;
use crate::responses::{created, ok, Envelope};
use crate::state::AppState;
use crate::utils::jwt::Claims;
use crate::utils::password::{hash_password, verify_password};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[derive(Deserialize)]
struct RegisterBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    token: String,
    expires_at: i64,
    user: UserView,
}

#[derive(Serialize)]
struct UserView {
    id: uuid::Uuid,
    email: String,
}

const TOKEN_TTL_SECONDS: i64 = 60 * 60 * 24;

async fn register(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<RegisterBody>,
) -> Result<Envelope<AuthResponse>, EngineError> {
    if body.password.len() < 6 {
        return Err(EngineError::Validation(
            "password must be at least 6 characters".to_string(),
        ));
    }
    let email = User::normalize_email(&body.email);
    if state.store.get_user_by_email(&email).await?.is_some() {
        return Err(EngineError::Conflict("email already registered".to_string()));
    }

    let password_hash =
        hash_password(&body.password).map_err(|err| EngineError::Internal(anyhow::anyhow!(err)))?;
    let user = state.store.create_user(&email, &password_hash).await?;

    let response = issue_session(&state, &user)?;
    Ok(created(response))
}

async fn login(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<LoginBody>,
) -> Result<Envelope<AuthResponse>, EngineError> {
    let email = User::normalize_email(&body.email);
    let user = state
        .store
        .get_user_by_email(&email)
        .await?
        .ok_or(EngineError::Unauthorized)?;

    let valid = verify_password(&body.password, &user.password_hash)
        .map_err(|err| EngineError::Internal(anyhow::anyhow!(err)))?;
    if !valid {
        return Err(EngineError::Unauthorized);
    }

    let response = issue_session(&state, &user)?;
    Ok(ok(response))
}

fn issue_session(state: &AppState, user: &User) -> Result<AuthResponse, EngineError> {
    let expires_at = Utc::now().timestamp() + TOKEN_TTL_SECONDS;
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        exp: expires_at,
    };
    let token = issue_token(&claims, &state.config.jwt_secret)?;
    Ok(AuthResponse {
        token,
        expires_at,
        user: UserView {
            id: user.id,
            email: user.email.clone(),
        },
    })
}
