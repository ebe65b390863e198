use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Connector, ConnectorResult};

/// The dry-run/mocking primitive. Returns the caller-supplied JSON body
/// (already template-substituted by the executor) under `data`, honoring an
/// optional bounded, cancellable delay and a caller-chosen status code.
pub struct TestingConnector;

#[async_trait]
impl Connector for TestingConnector {
    fn name(&self) -> &'static str {
        "testing"
    }

    async fn execute(
        &self,
        _owner_id: Uuid,
        config: &Value,
        _input_data: &Value,
        _credential: Option<&str>,
        cancellation: CancellationToken,
    ) -> ConnectorResult {
        let delay_ms = config
            .get("delay_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            .min(30_000);

        if delay_ms > 0 {
            tokio::select! {
                _ = cancellation.cancelled() => return ConnectorResult::failure("cancelled"),
                _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
            }
        }

        let status_code = config
            .get("status_code")
            .and_then(|v| v.as_u64())
            .unwrap_or(200);
        let body = config.get("body").cloned().unwrap_or(Value::Null);

        if (200..300).contains(&status_code) {
            ConnectorResult::success(format!("testing connector status {status_code}"), Some(body))
        } else {
            ConnectorResult::failure(format!("testing connector status {status_code}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn returns_supplied_body_and_success_status() {
        let connector = TestingConnector;
        let result = connector
            .execute(
                Uuid::new_v4(),
                &json!({ "status_code": 200, "body": { "ok": true } }),
                &Value::Null,
                None,
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.status, super::super::ConnectorStatus::Success);
        assert_eq!(result.data.unwrap()["ok"], true);
    }

    #[tokio::test]
    async fn non_2xx_status_reports_failure() {
        let connector = TestingConnector;
        let result = connector
            .execute(
                Uuid::new_v4(),
                &json!({ "status_code": 500 }),
                &Value::Null,
                None,
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.status, super::super::ConnectorStatus::Failure);
    }

    #[tokio::test]
    async fn delay_is_cancellable() {
        let connector = TestingConnector;
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let result = connector
            .execute(
                Uuid::new_v4(),
                &json!({ "delay_ms": 5000 }),
                &Value::Null,
                None,
                cancellation,
            )
            .await;
        assert_eq!(result.message, "cancelled");
    }
}
