use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::store::Store;
use crate::worker::{Job, WorkerPool};

/// Ticks every `poll_interval`, offering every due scheduled workflow a
/// claim. Only the workflow that wins the claim's compare-and-swap gets
/// submitted, guaranteeing at-most-once dispatch per interval even with
/// overlapping ticks. Each tick runs on its own task so a panic inside it is
/// caught at the task boundary instead of taking the scheduler down.
pub async fn run(store: Arc<dyn Store>, pool: WorkerPool, poll_interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                return;
            }
            _ = ticker.tick() => {
                let store = store.clone();
                let pool = pool.clone();
                if let Err(panic) = tokio::spawn(tick(store, pool)).await {
                    error!(?panic, "scheduler tick panicked, continuing on next tick");
                }
            }
        }
    }
}

async fn tick(store: Arc<dyn Store>, pool: WorkerPool) {
    let now = OffsetDateTime::now_utc();
    let due = match store.list_due_scheduled_workflows(now).await {
        Ok(workflows) => workflows,
        Err(err) => {
            warn!(%err, "failed to list due scheduled workflows");
            return;
        }
    };

    for workflow in due {
        let claimed = store
            .claim_due_scheduled_workflow(workflow.id, now, workflow.last_executed_at)
            .await;
        match claimed {
            Ok(true) => {
                let job = Job {
                    workflow,
                    trigger_payload: Value::Null,
                    dry_run: false,
                    idempotency_key: None,
                    cancellation: CancellationToken::new(),
                };
                if pool.submit(job).await.is_err() {
                    warn!("scheduler dispatch dropped: worker pool overloaded");
                }
            }
            Ok(false) => {
                // Lost the race to another tick/instance; this interval's
                // dispatch is already accounted for.
            }
            Err(err) => {
                warn!(%err, workflow_id = %workflow.id, "failed to claim due scheduled workflow");
            }
        }
    }
}
