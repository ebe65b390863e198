use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::connectors::ConnectorRegistry;
use crate::engine::breaker::BreakerManager;
use crate::engine::executor;
use crate::models::workflow::Workflow;
use crate::store::Store;
use crate::vault::Vault;

/// A unit of work dispatched to the pool. The workflow is value-copied at
/// enqueue time so it is immune to concurrent edits or deletes.
pub struct Job {
    pub workflow: Workflow,
    pub trigger_payload: Value,
    pub dry_run: bool,
    /// Present for webhook deliveries carrying an idempotency key; the
    /// executor overwrites the stored snapshot with the real outcome once
    /// this job completes.
    pub idempotency_key: Option<String>,
    pub cancellation: CancellationToken,
}

#[derive(Clone)]
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    depth: Arc<AtomicUsize>,
    enqueue_timeout: Duration,
}

pub struct WorkerPoolHandle {
    shutdown: CancellationToken,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` fixed workers draining a bounded FIFO channel of
    /// capacity `queue_capacity`. Returns the submit-side handle plus a
    /// shutdown handle to drain and join the workers.
    pub fn spawn(
        worker_count: usize,
        queue_capacity: usize,
        enqueue_timeout: Duration,
        store: Arc<dyn Store>,
        vault: Arc<Vault>,
        connectors: Arc<ConnectorRegistry>,
        breakers: Arc<BreakerManager>,
    ) -> (Self, WorkerPoolHandle) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let depth = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let mut tasks = JoinSet::new();
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            let depth = depth.clone();
            let store = store.clone();
            let vault = vault.clone();
            let connectors = connectors.clone();
            let breakers = breakers.clone();
            let shutdown = shutdown.clone();

            tasks.spawn(async move {
                loop {
                    let job = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(job) = job else {
                        break;
                    };
                    depth.fetch_sub(1, Ordering::SeqCst);

                    if shutdown.is_cancelled() {
                        job.cancellation.cancel();
                    }

                    let outcome_cancellation = job.cancellation.clone();
                    executor::execute(
                        store.as_ref(),
                        vault.as_ref(),
                        connectors.as_ref(),
                        breakers.as_ref(),
                        &job.workflow,
                        job.trigger_payload,
                        job.dry_run,
                        job.idempotency_key,
                        outcome_cancellation,
                    )
                    .await;
                }
            });
        }

        (
            Self {
                sender,
                depth,
                enqueue_timeout,
            },
            WorkerPoolHandle {
                shutdown,
                tasks: tokio::sync::Mutex::new(tasks),
            },
        )
    }

    /// Waits up to `enqueue_timeout` for room in the queue. If the queue is
    /// still full, the job is dropped with a structured warning rather than
    /// blocked on forever — visible backpressure, not unbounded growth.
    pub async fn submit(&self, job: Job) -> Result<(), SubmitError> {
        match tokio::time::timeout(self.enqueue_timeout, self.sender.send(job)).await {
            Ok(Ok(())) => {
                self.depth.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            Ok(Err(_)) => Err(SubmitError::Closed),
            Err(_) => {
                warn!("worker pool overloaded, dropping job after enqueue timeout");
                Err(SubmitError::Overloaded)
            }
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    Overloaded,
    Closed,
}

impl WorkerPoolHandle {
    /// Closes the ingress channel, then waits for in-flight workers to drain
    /// up to `deadline`; anything still running at the deadline has its job
    /// cancellation token tripped.
    pub async fn shutdown(self, deadline: Duration) {
        self.shutdown.cancel();
        let mut tasks = self.tasks.lock().await;
        let _ = tokio::time::timeout(deadline, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        tasks.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::TriggerKind;
    use serde_json::json;

    fn sample_workflow() -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "test".into(),
            trigger_kind: TriggerKind::Webhook,
            action_kind: "testing".into(),
            config: json!({ "status_code": 200, "delay_ms": 50 }),
            action_chain: json!([]),
            active: true,
            last_executed_at: None,
            created_at: time::OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn overloaded_queue_drops_with_error() {
        let store: Arc<dyn Store> = Arc::new(crate::store::MockStore::new());
        let (pool, handle) = WorkerPool::spawn(
            1,
            1,
            Duration::from_millis(50),
            store,
            Arc::new(Vault::new([1u8; 32])),
            Arc::new(ConnectorRegistry::new()),
            Arc::new(BreakerManager::new()),
        );

        let make_job = || Job {
            workflow: sample_workflow(),
            trigger_payload: Value::Null,
            dry_run: true,
            idempotency_key: None,
            cancellation: CancellationToken::new(),
        };

        // Occupy the single worker, fill the single queue slot, then expect
        // the next submit to be rejected as overloaded.
        pool.submit(make_job()).await.unwrap();
        pool.submit(make_job()).await.unwrap();
        let result = pool.submit(make_job()).await;

        assert_eq!(result, Err(SubmitError::Overloaded));
        handle.shutdown(Duration::from_secs(1)).await;
    }
}
