use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// `encrypted_value` stores `nonce || ciphertext`, base64 encoded. Plaintext
/// never leaves the vault except to the connector executing within one step.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub service_name: String,
    #[serde(skip_serializing)]
    pub encrypted_value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
