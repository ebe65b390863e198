use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::log::LogFilter;
use crate::models::workflow::TriggerKind;
use crate::models::{
    Credential, ExecutionLog, IdempotencyClaim, IdempotencyRecord, LogStatus, User, Workflow,
};

use super::Store;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_user(&self, email: &str, password_hash: &str) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, email, password_hash, created_at)
               VALUES ($1, $2, $3, now())
               RETURNING id, email, password_hash, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(User::normalize_email(email))
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(User::normalize_email(email))
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_credential(
        &self,
        owner_id: Uuid,
        service_name: &str,
        encrypted_value: &str,
    ) -> Result<Credential, sqlx::Error> {
        sqlx::query_as::<_, Credential>(
            r#"INSERT INTO credentials (id, owner_id, service_name, encrypted_value, created_at)
               VALUES ($1, $2, $3, $4, now())
               ON CONFLICT (owner_id, service_name)
               DO UPDATE SET encrypted_value = EXCLUDED.encrypted_value
               RETURNING id, owner_id, service_name, encrypted_value, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(service_name)
        .bind(encrypted_value)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_credentials(&self, owner_id: Uuid) -> Result<Vec<Credential>, sqlx::Error> {
        sqlx::query_as::<_, Credential>(
            "SELECT id, owner_id, service_name, encrypted_value, created_at FROM credentials WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_credential(
        &self,
        owner_id: Uuid,
        service_name: &str,
    ) -> Result<Option<Credential>, sqlx::Error> {
        sqlx::query_as::<_, Credential>(
            "SELECT id, owner_id, service_name, encrypted_value, created_at FROM credentials WHERE owner_id = $1 AND service_name = $2",
        )
        .bind(owner_id)
        .bind(service_name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_workflow(
        &self,
        owner_id: Uuid,
        name: &str,
        trigger_kind: TriggerKind,
        action_kind: &str,
        config: Value,
        action_chain: Value,
    ) -> Result<Workflow, sqlx::Error> {
        sqlx::query_as::<_, Workflow>(
            r#"INSERT INTO workflows
                 (id, owner_id, name, trigger_kind, action_kind, config, action_chain, active, last_executed_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, true, NULL, now())
               RETURNING id, owner_id, name, trigger_kind, action_kind, config, action_chain, active, last_executed_at, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(name)
        .bind(trigger_kind)
        .bind(action_kind)
        .bind(config)
        .bind(action_chain)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_workflows(&self, owner_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        sqlx::query_as::<_, Workflow>(
            "SELECT id, owner_id, name, trigger_kind, action_kind, config, action_chain, active, last_executed_at, created_at FROM workflows WHERE owner_id = $1",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<Workflow>, sqlx::Error> {
        sqlx::query_as::<_, Workflow>(
            "SELECT id, owner_id, name, trigger_kind, action_kind, config, action_chain, active, last_executed_at, created_at FROM workflows WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_workflow_active(&self, id: Uuid, active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workflows SET active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_workflow_executed(
        &self,
        id: Uuid,
        at: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workflows SET last_executed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_due_scheduled_workflows(
        &self,
        now: OffsetDateTime,
    ) -> Result<Vec<Workflow>, sqlx::Error> {
        // The DB narrows to active schedule workflows; `Workflow::is_due` decides
        // due-ness so the interval rule lives in one place, not duplicated in SQL.
        let candidates = sqlx::query_as::<_, Workflow>(
            r#"SELECT id, owner_id, name, trigger_kind, action_kind, config, action_chain, active, last_executed_at, created_at
               FROM workflows
               WHERE trigger_kind = 'schedule' AND active = true"#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates
            .into_iter()
            .filter(|w| {
                let Some(interval_minutes) =
                    w.config.get("interval_minutes").and_then(|v| v.as_i64())
                else {
                    return w.last_executed_at.is_none();
                };
                w.is_due(interval_minutes, now)
            })
            .collect())
    }

    async fn claim_due_scheduled_workflow(
        &self,
        id: Uuid,
        now: OffsetDateTime,
        expected_last: Option<OffsetDateTime>,
    ) -> Result<bool, sqlx::Error> {
        // WITH ... FOR UPDATE SKIP LOCKED mirrors the run-claim pattern used
        // elsewhere; the CAS on last_executed_at is what makes dispatch
        // at-most-once per interval even with overlapping scheduler ticks.
        let result = sqlx::query(
            r#"WITH sel AS (
                 SELECT id FROM workflows
                 WHERE id = $1
                   AND last_executed_at IS NOT DISTINCT FROM $3
                 FOR UPDATE SKIP LOCKED
               )
               UPDATE workflows SET last_executed_at = $2
               FROM sel WHERE workflows.id = sel.id"#,
        )
        .bind(id)
        .bind(now)
        .bind(expected_last)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_log(
        &self,
        workflow_id: Uuid,
        status: LogStatus,
        message: &str,
    ) -> Result<ExecutionLog, sqlx::Error> {
        sqlx::query_as::<_, ExecutionLog>(
            r#"INSERT INTO logs (id, workflow_id, status, message, executed_at)
               VALUES ($1, $2, $3, $4, now())
               RETURNING id, workflow_id, status, message, executed_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(workflow_id)
        .bind(status)
        .bind(message)
        .fetch_one(&self.pool)
        .await
    }

    async fn list_logs(
        &self,
        owner_id: Uuid,
        filter: LogFilter,
    ) -> Result<Vec<ExecutionLog>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionLog>(
            r#"SELECT l.id, l.workflow_id, l.status, l.message, l.executed_at
               FROM logs l
               JOIN workflows w ON w.id = l.workflow_id
               WHERE w.owner_id = $1
                 AND ($2::text IS NULL OR l.status = $2)
                 AND ($3::uuid IS NULL OR l.workflow_id = $3)
               ORDER BY l.executed_at DESC"#,
        )
        .bind(owner_id)
        .bind(filter.status)
        .bind(filter.workflow_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_logs_by_workflow(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<ExecutionLog>, sqlx::Error> {
        sqlx::query_as::<_, ExecutionLog>(
            "SELECT id, workflow_id, status, message, executed_at FROM logs WHERE workflow_id = $1 ORDER BY executed_at DESC",
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn put_idempotency_record(
        &self,
        workflow_id: Uuid,
        key: &str,
        snapshot: Value,
    ) -> Result<IdempotencyClaim, sqlx::Error> {
        // ON CONFLICT ... RETURNING tells us, in one round trip, whether this
        // call's insert (or reclaim of an expired row) actually landed.
        // `fetch_optional` is `Some` only when we won the claim.
        let inserted = sqlx::query_as::<_, IdempotencyRecord>(
            r#"INSERT INTO idempotency (workflow_id, key, created_at, result_snapshot)
               VALUES ($1, $2, now(), $3)
               ON CONFLICT (workflow_id, key) DO UPDATE
                 SET created_at = now(), result_snapshot = $3
                 WHERE idempotency.created_at <= now() - interval '24 hours'
               RETURNING workflow_id, key, created_at, result_snapshot"#,
        )
        .bind(workflow_id)
        .bind(key)
        .bind(&snapshot)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = inserted {
            return Ok(IdempotencyClaim::Created(record));
        }

        let existing = sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT workflow_id, key, created_at, result_snapshot FROM idempotency WHERE workflow_id = $1 AND key = $2",
        )
        .bind(workflow_id)
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(IdempotencyClaim::Existing(existing))
    }

    async fn update_idempotency_snapshot(
        &self,
        workflow_id: Uuid,
        key: &str,
        snapshot: Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE idempotency SET result_snapshot = $3 WHERE workflow_id = $1 AND key = $2",
        )
        .bind(workflow_id)
        .bind(key)
        .bind(snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
