use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Connector, ConnectorResult};

/// Generic outbound HTTP call. `config` supports `url`, `method`, `headers`
/// (object), `body` (any JSON value), `timeout_ms` (default 10s, capped at
/// 30s to mirror the SOAP-class ceiling). A resolved credential is sent as
/// `Authorization: Bearer <credential>` unless `headers` already sets one.
pub struct HttpConnector {
    client: Arc<reqwest::Client>,
}

impl HttpConnector {
    pub fn new(client: Arc<reqwest::Client>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn execute(
        &self,
        _owner_id: Uuid,
        config: &Value,
        _input_data: &Value,
        credential: Option<&str>,
        cancellation: CancellationToken,
    ) -> ConnectorResult {
        let Some(url) = config.get("url").and_then(|v| v.as_str()) else {
            return ConnectorResult::failure("http connector requires a url");
        };
        let method = config
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
            .to_uppercase();
        let timeout_ms = config
            .get("timeout_ms")
            .and_then(|v| v.as_u64())
            .unwrap_or(10_000)
            .min(30_000);

        let mut builder = match method.as_str() {
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "PATCH" => self.client.patch(url),
            "DELETE" => self.client.delete(url),
            _ => self.client.get(url),
        };
        builder = builder.timeout(Duration::from_millis(timeout_ms));

        let mut has_authorization = false;
        if let Some(headers) = config.get("headers").and_then(|v| v.as_object()) {
            for (k, v) in headers {
                if let Some(v) = v.as_str() {
                    if k.eq_ignore_ascii_case("authorization") {
                        has_authorization = true;
                    }
                    builder = builder.header(k, v);
                }
            }
        }
        if !has_authorization {
            if let Some(credential) = credential {
                builder = builder.header("Authorization", format!("Bearer {credential}"));
            }
        }
        if let Some(body) = config.get("body") {
            builder = builder.json(body);
        }

        let request = builder.build();
        let request = match request {
            Ok(r) => r,
            Err(e) => return ConnectorResult::failure(format!("invalid request: {e}")),
        };

        let response_fut = self.client.execute(request);
        let response = tokio::select! {
            _ = cancellation.cancelled() => {
                return ConnectorResult::failure("cancelled");
            }
            res = response_fut => res,
        };

        match response {
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                let body_value =
                    serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
                if status.is_success() {
                    ConnectorResult::success(
                        format!("http {} -> {}", method, status.as_u16()),
                        Some(json!({ "status": status.as_u16(), "body": body_value })),
                    )
                } else {
                    ConnectorResult::failure(format!(
                        "http request returned status {}",
                        status.as_u16()
                    ))
                }
            }
            Err(e) => ConnectorResult::failure(format!("http request failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_url_fails_validation() {
        let connector = HttpConnector::new(Arc::new(reqwest::Client::new()));
        let result = connector
            .execute(
                Uuid::new_v4(),
                &json!({}),
                &Value::Null,
                None,
                CancellationToken::new(),
            )
            .await;
        assert_eq!(result.status, super::super::ConnectorStatus::Failure);
        assert!(result.message.contains("url"));
    }
}
