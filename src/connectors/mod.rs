pub mod discord;
pub mod http;
pub mod slack;
pub mod testing;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct ConnectorResult {
    pub status: ConnectorStatus,
    pub message: String,
    pub data: Option<Value>,
}

impl ConnectorResult {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: ConnectorStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: ConnectorStatus::Failure,
            message: message.into(),
            data: None,
        }
    }
}

/// A single outbound integration. Implementations must honor cancellation at
/// every suspension point, bound their own I/O with a connector-local
/// timeout, never log secrets directly, and stay pure with respect to shared
/// process state.
#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(
        &self,
        owner_id: Uuid,
        config: &Value,
        input_data: &Value,
        credential: Option<&str>,
        cancellation: CancellationToken,
    ) -> ConnectorResult;
}

/// Default per-connector timeout absent an explicit override in config.
pub const DEFAULT_CONNECTOR_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
        let http_client = Arc::new(reqwest::Client::new());
        connectors.insert(
            "http".to_string(),
            Arc::new(http::HttpConnector::new(http_client.clone())) as Arc<dyn Connector>,
        );
        connectors.insert(
            "slack_message".to_string(),
            Arc::new(slack::SlackConnector::new(http_client.clone())) as Arc<dyn Connector>,
        );
        connectors.insert(
            "discord_post".to_string(),
            Arc::new(discord::DiscordConnector::new(http_client.clone())) as Arc<dyn Connector>,
        );
        connectors.insert(
            "testing".to_string(),
            Arc::new(testing::TestingConnector) as Arc<dyn Connector>,
        );
        Self { connectors }
    }

    pub fn get(&self, action_kind: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(action_kind).cloned()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
