use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Connector, ConnectorResult};

/// Posts a message to a Slack incoming webhook. The webhook URL comes from a
/// resolved credential when the step names one, falling back to a literal
/// `webhook_url` in `config`; `slack_message` is the already template-resolved
/// message body.
pub struct SlackConnector {
    client: Arc<reqwest::Client>,
}

impl SlackConnector {
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for SlackConnector {
    fn name(&self) -> &'static str {
        "slack_message"
    }

    async fn execute(
        &self,
        _owner_id: Uuid,
        config: &Value,
        _input_data: &Value,
        credential: Option<&str>,
        cancellation: CancellationToken,
    ) -> ConnectorResult {
        let webhook_url = credential.or_else(|| config.get("webhook_url").and_then(|v| v.as_str()));
        let Some(webhook_url) = webhook_url else {
            return ConnectorResult::failure("slack_message requires a resolved credential or webhook_url");
        };
        let Some(message) = config.get("slack_message").and_then(|v| v.as_str()) else {
            return ConnectorResult::failure("slack_message requires slack_message");
        };

        let request = self
            .client
            .post(webhook_url)
            .timeout(Duration::from_secs(10))
            .json(&json!({ "text": message }));

        let response = tokio::select! {
            _ = cancellation.cancelled() => return ConnectorResult::failure("cancelled"),
            res = request.send() => res,
        };

        match response {
            Ok(resp) if resp.status().is_success() => {
                ConnectorResult::success("Slack message delivered", None)
            }
            Ok(resp) => ConnectorResult::failure(format!(
                "Slack webhook returned status {}",
                resp.status().as_u16()
            )),
            Err(e) => ConnectorResult::failure(format!("Slack request failed: {e}")),
        }
    }
}
