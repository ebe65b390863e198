use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tokio::signal;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use flowbridge_engine::config::Config;
use flowbridge_engine::connectors::ConnectorRegistry;
use flowbridge_engine::engine::breaker::BreakerManager;
use flowbridge_engine::routes;
use flowbridge_engine::scheduler;
use flowbridge_engine::state::AppState;
use flowbridge_engine::store::{PostgresStore, Store};
use flowbridge_engine::vault::Vault;
use flowbridge_engine::worker::WorkerPool;

const WEBHOOK_BODY_LIMIT_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let config = Arc::new(config);

    let webhook_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(5)
            .burst_size(20)
            .use_headers()
            .finish()
            .ok_or_else(|| anyhow::anyhow!("failed to build webhook rate limiter configuration"))?,
    );
    let webhook_limiter = webhook_governor_conf.limiter().clone();
    std::thread::spawn(move || loop {
        std::thread::sleep(std::time::Duration::from_secs(60));
        webhook_limiter.retain_recent();
    });

    let store: Arc<dyn Store> = Arc::new(connect_with_retry(&config).await?);

    let vault = Arc::new(Vault::new(config.encryption_key));
    let connectors = Arc::new(ConnectorRegistry::new());
    let breakers = Arc::new(BreakerManager::new());
    let http_client = Arc::new(reqwest::Client::new());

    let (worker_pool, pool_handle) = WorkerPool::spawn(
        config.worker_count,
        config.queue_capacity,
        config.enqueue_timeout,
        store.clone(),
        vault.clone(),
        connectors.clone(),
        breakers.clone(),
    );

    let scheduler_shutdown = tokio_util::sync::CancellationToken::new();
    let scheduler_handle = tokio::spawn(scheduler::run(
        store.clone(),
        worker_pool.clone(),
        config.scheduler_poll_interval,
        scheduler_shutdown.clone(),
    ));

    let state = AppState {
        store: store.clone(),
        vault,
        connectors,
        breakers,
        worker_pool,
        config: config.clone(),
        http_client,
    };

    let cors = if config.cors_allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    let app = Router::new()
        .nest("/api/auth", routes::auth::router())
        .nest("/api/credentials", routes::credentials::router())
        .nest("/api/workflows", routes::workflows::router())
        .nest("/api/logs", routes::logs::router())
        .nest(
            "/api/webhooks",
            routes::webhooks::router()
                .layer(GovernorLayer {
                    config: webhook_governor_conf,
                })
                .layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT_BYTES)),
        )
        .nest("/health", routes::health::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "flowbridge-engine listening");

    let make_service = app.into_make_service_with_connect_info::<std::net::SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler_shutdown.cancel();
    let _ = scheduler_handle.await;
    pool_handle.shutdown(std::time::Duration::from_secs(30)).await;
    store.close().await;

    Ok(())
}

async fn connect_with_retry(config: &Config) -> anyhow::Result<PostgresStore> {
    let mut attempt = 0u32;
    loop {
        match PostgresStore::connect(&config.database_url).await {
            Ok(store) => return Ok(store),
            Err(err) if attempt < config.db_max_retries => {
                attempt += 1;
                let delay = config.db_retry_delay * attempt.min(16);
                tracing::warn!(%err, attempt, "database connection failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
