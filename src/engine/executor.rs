use std::time::Duration;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::connectors::{ConnectorRegistry, ConnectorStatus};
use crate::engine::breaker::{Admission, BreakerManager};
use crate::engine::templating::templ_value;
use crate::masker::{mask_string, mask_value};
use crate::models::log::LogStatus;
use crate::models::workflow::{ChainedAction, InputSource, Workflow};
use crate::store::Store;
use crate::vault::Vault;

pub const DEFAULT_EXECUTION_DEADLINE: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step_n: usize,
    pub status: LogStatus,
    pub message: String,
    pub data: Value,
}

#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub status: LogStatus,
    pub message: String,
    pub steps: Vec<StepOutcome>,
}

struct Step {
    action_kind: String,
    config: Value,
    input_source: InputSource,
}

fn build_steps(workflow: &Workflow) -> Vec<Step> {
    let mut steps = vec![Step {
        action_kind: workflow.action_kind.clone(),
        config: workflow.config.clone(),
        input_source: InputSource::Trigger,
    }];
    for chained in workflow.action_chain_vec() {
        let input_source = InputSource::parse(&chained.input_source).unwrap_or(InputSource::Previous);
        steps.push(Step {
            action_kind: chained.action_kind,
            config: chained.config,
            input_source,
        });
    }
    steps
}

fn resolve_input_data(source: &InputSource, trigger: &Value, completed: &[StepOutcome]) -> Value {
    match source {
        InputSource::Trigger => trigger.clone(),
        InputSource::Previous => completed.last().map(|s| s.data.clone()).unwrap_or(Value::Null),
        InputSource::Step { index } => completed
            .get(*index)
            .map(|s| s.data.clone())
            .unwrap_or(Value::Null),
    }
}

fn merge_context(trigger: &Value, input_data: &Value) -> Value {
    let mut merged = trigger.clone().as_object().cloned().unwrap_or_default();
    if let Some(obj) = input_data.as_object() {
        for (k, v) in obj {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}

/// Runs the primary action followed by every chained action, in order. Stops
/// at the first failing step. Never retries: a connector's own bounded
/// backoff is its private concern.
#[allow(clippy::too_many_arguments)]
pub async fn execute(
    store: &dyn Store,
    vault: &Vault,
    connectors: &ConnectorRegistry,
    breakers: &BreakerManager,
    workflow: &Workflow,
    trigger_payload: Value,
    dry_run: bool,
    idempotency_key: Option<String>,
    cancellation: CancellationToken,
) -> ExecutionOutcome {
    if cancellation.is_cancelled() {
        return ExecutionOutcome {
            status: LogStatus::Failure,
            message: "cancelled".to_string(),
            steps: vec![],
        };
    }

    let steps_def = build_steps(workflow);
    let mut completed: Vec<StepOutcome> = Vec::with_capacity(steps_def.len());
    let mut failure_message: Option<String> = None;

    for (n, step) in steps_def.iter().enumerate() {
        if cancellation.is_cancelled() {
            failure_message = Some("cancelled".to_string());
            break;
        }

        let input_data = resolve_input_data(&step.input_source, &trigger_payload, &completed);
        let merged = merge_context(&trigger_payload, &input_data);
        let rendered_config = templ_value(&step.config, &merged);

        let credential_id = rendered_config
            .get("credential_id")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let credential = match &credential_id {
            Some(service_name) => {
                match resolve_credential(store, vault, workflow.owner_id, service_name).await {
                    Ok(Some(secret)) => Some(secret),
                    Ok(None) => {
                        let msg = format!("credential not found: {service_name}");
                        completed.push(StepOutcome {
                            step_n: n,
                            status: LogStatus::Failure,
                            message: msg.clone(),
                            data: Value::Null,
                        });
                        failure_message = Some(msg);
                        break;
                    }
                    Err(err) => {
                        let msg = format!("failed to resolve credential {service_name}: {err}");
                        warn!(workflow_id = %workflow.id, step = n, %err, "credential lookup failed");
                        completed.push(StepOutcome {
                            step_n: n,
                            status: LogStatus::Failure,
                            message: msg.clone(),
                            data: Value::Null,
                        });
                        failure_message = Some(msg);
                        break;
                    }
                }
            }
            None => None,
        };

        let Some(connector) = connectors.get(&step.action_kind) else {
            failure_message = Some(format!("unknown action kind: {}", step.action_kind));
            completed.push(StepOutcome {
                step_n: n,
                status: LogStatus::Failure,
                message: failure_message.clone().unwrap(),
                data: Value::Null,
            });
            break;
        };

        let service = connector.name().to_string();
        match breakers.admit(&service, workflow.owner_id).await {
            Admission::Rejected => {
                let msg = "breaker_open".to_string();
                warn!(
                    workflow_id = %workflow.id,
                    step = n,
                    service = %service,
                    "circuit breaker open, rejecting without I/O"
                );
                completed.push(StepOutcome {
                    step_n: n,
                    status: LogStatus::Failure,
                    message: msg.clone(),
                    data: Value::Null,
                });
                failure_message = Some(msg);
                break;
            }
            Admission::Admitted => {}
        }

        if cancellation.is_cancelled() {
            failure_message = Some("cancelled".to_string());
            break;
        }

        let result = connector
            .execute(
                workflow.owner_id,
                &rendered_config,
                &input_data,
                credential.as_deref(),
                cancellation.clone(),
            )
            .await;

        if cancellation.is_cancelled() {
            failure_message = Some("cancelled".to_string());
            break;
        }

        match result.status {
            ConnectorStatus::Success => {
                breakers.report_success(&service, workflow.owner_id).await;
                completed.push(StepOutcome {
                    step_n: n,
                    status: LogStatus::Success,
                    message: result.message,
                    data: result.data.unwrap_or(Value::Null),
                });
            }
            ConnectorStatus::Failure => {
                breakers.report_failure(&service, workflow.owner_id).await;
                failure_message = Some(result.message.clone());
                completed.push(StepOutcome {
                    step_n: n,
                    status: LogStatus::Failure,
                    message: result.message,
                    data: Value::Null,
                });
                break;
            }
        }
    }

    let (status, message) = match failure_message {
        Some(msg) => (LogStatus::Failure, msg),
        None => (
            LogStatus::Success,
            completed
                .last()
                .map(|s| s.message.clone())
                .unwrap_or_else(|| "no steps executed".to_string()),
        ),
    };

    let outcome = ExecutionOutcome {
        status,
        message,
        steps: completed,
    };

    if dry_run {
        return outcome;
    }

    let masked_message = mask_string(&outcome.message);
    if let Err(err) = store
        .create_log(workflow.id, outcome.status, &masked_message)
        .await
    {
        warn!(workflow_id = %workflow.id, %err, "failed to persist execution log");
    }
    if let Err(err) = store
        .touch_workflow_executed(workflow.id, now())
        .await
    {
        warn!(workflow_id = %workflow.id, %err, "failed to touch workflow last_executed_at");
    }

    if let Some(key) = idempotency_key {
        let masked_snapshot = mask_value(&dry_run_receipt(&outcome));
        if let Err(err) = store
            .update_idempotency_snapshot(workflow.id, &key, masked_snapshot)
            .await
        {
            warn!(workflow_id = %workflow.id, %err, "failed to overwrite idempotency snapshot");
        }
    }

    info!(
        workflow_id = %workflow.id,
        status = ?outcome.status,
        "workflow execution completed"
    );

    outcome
}

/// Resolves a step's required credential through the vault, never logging
/// the plaintext. Every chained step runs as the same owner as the workflow.
pub async fn resolve_credential(
    store: &dyn Store,
    vault: &Vault,
    owner_id: Uuid,
    service_name: &str,
) -> Result<Option<String>, sqlx::Error> {
    let Some(credential) = store.get_credential(owner_id, service_name).await? else {
        return Ok(None);
    };
    match vault.decrypt(&credential.encrypted_value) {
        Ok(plaintext) => Ok(Some(plaintext)),
        Err(_) => Ok(None),
    }
}

fn now() -> time::OffsetDateTime {
    time::OffsetDateTime::now_utc()
}

pub fn dry_run_receipt(outcome: &ExecutionOutcome) -> Value {
    json!({
        "status": match outcome.status { LogStatus::Success => "success", LogStatus::Failure => "failure" },
        "message": outcome.message,
        "steps": outcome.steps.iter().map(|s| json!({
            "step": s.step_n,
            "status": match s.status { LogStatus::Success => "success", LogStatus::Failure => "failure" },
            "message": s.message,
            "data": s.data,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::TriggerKind;
    use crate::store::MockStore;
    use serde_json::json;

    fn sample_workflow(config: Value, chain: Value) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "test".into(),
            trigger_kind: TriggerKind::Webhook,
            action_kind: "testing".into(),
            config,
            action_chain: chain,
            active: true,
            last_executed_at: None,
            created_at: time::OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn dry_run_skips_log_and_touch() {
        let mut store = MockStore::new();
        store.expect_create_log().times(0);
        store.expect_touch_workflow_executed().times(0);

        let workflow = sample_workflow(json!({ "status_code": 200, "body": { "ok": true } }), json!([]));
        let outcome = execute(
            &store,
            &Vault::new([1u8; 32]),
            &ConnectorRegistry::new(),
            &BreakerManager::new(),
            &workflow,
            Value::Null,
            true,
            None,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.status, LogStatus::Success);
    }

    #[tokio::test]
    async fn already_cancelled_context_aborts_without_steps() {
        let store = MockStore::new();
        let workflow = sample_workflow(json!({ "status_code": 200 }), json!([]));
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let outcome = execute(
            &store,
            &Vault::new([1u8; 32]),
            &ConnectorRegistry::new(),
            &BreakerManager::new(),
            &workflow,
            Value::Null,
            true,
            None,
            cancellation,
        )
        .await;

        assert_eq!(outcome.status, LogStatus::Failure);
        assert_eq!(outcome.message, "cancelled");
        assert!(outcome.steps.is_empty());
    }

    #[tokio::test]
    async fn chained_step_failure_stops_the_chain() {
        let store = MockStore::new();
        let chain = json!([{
            "action_kind": "testing",
            "config": { "status_code": 500 },
            "input_source": "previous"
        }, {
            "action_kind": "testing",
            "config": { "status_code": 200 },
            "input_source": "previous"
        }]);
        let workflow = sample_workflow(json!({ "status_code": 200, "body": {} }), chain);

        let outcome = execute(
            &store,
            &Vault::new([1u8; 32]),
            &ConnectorRegistry::new(),
            &BreakerManager::new(),
            &workflow,
            Value::Null,
            true,
            None,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.status, LogStatus::Failure);
        assert_eq!(outcome.steps.len(), 2);
    }

    #[tokio::test]
    async fn template_substitution_uses_trigger_payload() {
        let store = MockStore::new();
        let workflow = sample_workflow(
            json!({ "status_code": 200, "body": "{{user.name}}" }),
            json!([]),
        );

        let outcome = execute(
            &store,
            &Vault::new([1u8; 32]),
            &ConnectorRegistry::new(),
            &BreakerManager::new(),
            &workflow,
            json!({ "user": { "name": "Alex" } }),
            true,
            None,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.steps[0].data, json!("Alex"));
    }

    #[tokio::test]
    async fn missing_credential_fails_the_step_without_calling_the_connector() {
        let mut store = MockStore::new();
        store
            .expect_get_credential()
            .returning(|_, _| Ok(None));

        let workflow = sample_workflow(
            json!({ "credential_id": "cred_1", "status_code": 200 }),
            json!([]),
        );

        let outcome = execute(
            &store,
            &Vault::new([1u8; 32]),
            &ConnectorRegistry::new(),
            &BreakerManager::new(),
            &workflow,
            Value::Null,
            true,
            None,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.status, LogStatus::Failure);
        assert!(outcome.message.contains("credential not found"));
    }

    #[tokio::test]
    async fn resolved_credential_is_passed_to_the_connector() {
        let vault = Vault::new([1u8; 32]);
        let encrypted = vault.encrypt("sekret-token").unwrap();
        let owner_id = Uuid::new_v4();

        let mut store = MockStore::new();
        store.expect_get_credential().returning(move |_, _| {
            Ok(Some(crate::models::Credential {
                id: Uuid::new_v4(),
                owner_id,
                service_name: "cred_1".into(),
                encrypted_value: encrypted.clone(),
                created_at: time::OffsetDateTime::now_utc(),
            }))
        });

        let mut workflow = sample_workflow(
            json!({ "credential_id": "cred_1", "status_code": 200, "body": {} }),
            json!([]),
        );
        workflow.owner_id = owner_id;

        let outcome = execute(
            &store,
            &vault,
            &ConnectorRegistry::new(),
            &BreakerManager::new(),
            &workflow,
            Value::Null,
            true,
            None,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(outcome.status, LogStatus::Success);
    }
}
