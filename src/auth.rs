use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::EngineError;
use crate::state::AppState;
use crate::utils::jwt::{decode_jwt, Claims};

/// Identity of the caller, extracted from a `Bearer` token and validated
/// against the configured JWT secret. Any route taking this as an argument
/// is implicitly authenticated; axum rejects the request before the handler
/// body runs if the header is missing or the token doesn't verify.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = EngineError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(EngineError::Unauthorized)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(EngineError::Unauthorized)?;

        let data = decode_jwt(token, &app_state.config.jwt_secret)
            .map_err(|_| EngineError::Unauthorized)?;

        Ok(AuthUser {
            user_id: data.claims.sub,
            email: data.claims.email,
        })
    }
}

pub fn issue_token(claims: &Claims, secret: &str) -> Result<String, EngineError> {
    crate::utils::jwt::create_jwt(claims, secret)
        .map_err(|err| EngineError::Internal(err.into()))
}
