use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;

use crate::auth::AuthUser;
use crate::error::EngineError;
use crate::models::log::{ExecutionLog, LogFilter};
use crate::responses::{ok, Envelope};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list))
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<LogFilter>,
) -> Result<Envelope<Vec<ExecutionLog>>, EngineError> {
    let logs = state.store.list_logs(user.user_id, filter).await?;
    Ok(ok(logs))
}
