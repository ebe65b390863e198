use std::env;
use std::time::Duration;

/// Process-wide configuration, loaded once at startup and never hot-reloaded.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: String,
    pub encryption_key: [u8; 32],
    pub cors_allowed_origins: Vec<String>,
    pub db_max_retries: u32,
    pub db_retry_delay: Duration,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub enqueue_timeout: Duration,
    pub scheduler_poll_interval: Duration,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("DB_PATH"))
            .map_err(|_| anyhow::anyhow!("DATABASE_URL or DB_PATH must be set"))?;

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let environment = match env::var("ENVIRONMENT").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 bytes");
        }

        let encryption_key_raw = env::var("ENCRYPTION_KEY")
            .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be set"))?;
        let encryption_key = parse_encryption_key(&encryption_key_raw)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let db_max_retries = env::var("DB_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let db_retry_delay = Duration::from_millis(
            env::var("DB_RETRY_DELAY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
        );

        let worker_count = env::var("WORKER_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        let queue_capacity = env::var("QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);

        let enqueue_timeout = Duration::from_millis(
            env::var("ENQUEUE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
        );

        let scheduler_poll_interval = Duration::from_secs(
            env::var("SCHEDULER_POLL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        );

        Ok(Self {
            database_url,
            port,
            environment,
            jwt_secret,
            encryption_key,
            cors_allowed_origins,
            db_max_retries,
            db_retry_delay,
            worker_count,
            queue_capacity,
            enqueue_timeout,
            scheduler_poll_interval,
        })
    }
}

fn parse_encryption_key(raw: &str) -> anyhow::Result<[u8; 32]> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .or_else(|_| hex_decode(raw.trim()))
        .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be base64 or hex encoded"))?;
    if bytes.len() != 32 {
        anyhow::bail!("ENCRYPTION_KEY must decode to exactly 32 bytes, got {}", bytes.len());
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}
