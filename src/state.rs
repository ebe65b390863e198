use std::sync::Arc;

use crate::config::Config;
use crate::connectors::ConnectorRegistry;
use crate::engine::breaker::BreakerManager;
use crate::store::Store;
use crate::vault::Vault;
use crate::worker::WorkerPool;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub vault: Arc<Vault>,
    pub connectors: Arc<ConnectorRegistry>,
    pub breakers: Arc<BreakerManager>,
    pub worker_pool: WorkerPool,
    pub config: Arc<Config>,
    pub http_client: Arc<reqwest::Client>,
}
