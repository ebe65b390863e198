use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Success,
    Failure,
}

/// Append-only. One record per execution; the chain outcome is
/// first-failure-wins so `message` always carries the relevant detail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExecutionLog {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: LogStatus,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub executed_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogFilter {
    pub status: Option<LogStatus>,
    pub workflow_id: Option<Uuid>,
}
