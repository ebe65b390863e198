pub mod postgres;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::log::LogFilter;
use crate::models::{Credential, ExecutionLog, IdempotencyClaim, LogStatus, User, Workflow};

pub use postgres::PostgresStore;

/// Persistence contract. SQL-agnostic by design: a SQLite-class backend
/// fits equally well, the only atomicity requirement beyond a single-row
/// compare-and-swap is `claim_due_scheduled_workflow`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, sqlx::Error>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error>;
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error>;

    async fn create_credential(
        &self,
        owner_id: Uuid,
        service_name: &str,
        encrypted_value: &str,
    ) -> Result<Credential, sqlx::Error>;
    async fn list_credentials(&self, owner_id: Uuid) -> Result<Vec<Credential>, sqlx::Error>;
    async fn get_credential(
        &self,
        owner_id: Uuid,
        service_name: &str,
    ) -> Result<Option<Credential>, sqlx::Error>;

    async fn create_workflow(
        &self,
        owner_id: Uuid,
        name: &str,
        trigger_kind: crate::models::workflow::TriggerKind,
        action_kind: &str,
        config: Value,
        action_chain: Value,
    ) -> Result<Workflow, sqlx::Error>;
    async fn list_workflows(&self, owner_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error>;
    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>, sqlx::Error>;
    async fn set_workflow_active(&self, id: Uuid, active: bool) -> Result<(), sqlx::Error>;
    async fn touch_workflow_executed(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<(), sqlx::Error>;
    async fn delete_workflow(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    async fn list_due_scheduled_workflows(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Workflow>, sqlx::Error>;

    /// Atomic compare-and-swap on `last_executed_at`. Only on success may the
    /// caller submit the job; this is the sole scheduler concurrency control.
    async fn claim_due_scheduled_workflow(
        &self,
        id: Uuid,
        now: OffsetDateTime,
        expected_last: Option<OffsetDateTime>,
    ) -> Result<bool, sqlx::Error>;

    async fn create_log(
        &self,
        workflow_id: Uuid,
        status: LogStatus,
        message: &str,
    ) -> Result<ExecutionLog, sqlx::Error>;
    async fn list_logs(
        &self,
        owner_id: Uuid,
        filter: LogFilter,
    ) -> Result<Vec<ExecutionLog>, sqlx::Error>;
    async fn list_logs_by_workflow(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<ExecutionLog>, sqlx::Error>;

    /// Atomic insert-if-absent. `Created` means this call won the race and the
    /// caller should proceed; `Existing` means a delivery within TTL already
    /// holds the key and the caller must replay its stored snapshot instead.
    async fn put_idempotency_record(
        &self,
        workflow_id: Uuid,
        key: &str,
        snapshot: Value,
    ) -> Result<IdempotencyClaim, sqlx::Error>;

    /// Overwrites the snapshot of an existing record once the real execution
    /// outcome is known, so later replays see the actual result.
    async fn update_idempotency_snapshot(
        &self,
        workflow_id: Uuid,
        key: &str,
        snapshot: Value,
    ) -> Result<(), sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
    async fn close(&self);
}
