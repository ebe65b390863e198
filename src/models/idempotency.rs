use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// Scoped to `(workflow_id, key)` with a 24h TTL. `result_snapshot` stores the
/// full execution outcome so a replay survives log retention/purging.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdempotencyRecord {
    pub workflow_id: Uuid,
    pub key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub result_snapshot: Value,
}

pub const IDEMPOTENCY_TTL: time::Duration = time::Duration::hours(24);

/// Result of the atomic claim in `Store::put_idempotency_record`: whether
/// this call is the one that created the record, or whether a delivery
/// within TTL already holds the key.
#[derive(Debug, Clone)]
pub enum IdempotencyClaim {
    Created(IdempotencyRecord),
    Existing(IdempotencyRecord),
}

impl IdempotencyClaim {
    pub fn record(&self) -> &IdempotencyRecord {
        match self {
            IdempotencyClaim::Created(r) | IdempotencyClaim::Existing(r) => r,
        }
    }
}
