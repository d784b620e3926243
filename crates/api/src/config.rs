use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Public base URL used in output locators and webhook payloads
    /// (default: `http://localhost:3000`).
    pub base_url: String,
    /// Directory where transformed images are written and served from
    /// (default: `processed`).
    pub processed_dir: PathBuf,
    /// Webhook signing secret. No signature header is sent when unset.
    pub webhook_secret: Option<String>,
    /// Number of concurrent unit workers (default: `4`).
    pub worker_count: usize,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How often the rescan loop looks for stale pending units, in
    /// seconds (default: `30`).
    pub rescan_interval_secs: u64,
    /// Minimum age before a pending unit counts as stale, in seconds
    /// (default: `60`).
    pub rescan_min_age_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `HOST`                 | `0.0.0.0`               |
    /// | `PORT`                 | `3000`                  |
    /// | `BASE_URL`             | `http://localhost:3000` |
    /// | `PROCESSED_DIR`        | `processed`             |
    /// | `WEBHOOK_SECRET`       | unset                   |
    /// | `WORKER_COUNT`         | `4`                     |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                    |
    /// | `RESCAN_INTERVAL_SECS` | `30`                    |
    /// | `RESCAN_MIN_AGE_SECS`  | `60`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let base_url =
            std::env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".into());

        let processed_dir =
            PathBuf::from(std::env::var("PROCESSED_DIR").unwrap_or_else(|_| "processed".into()));

        let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());

        let worker_count: usize = std::env::var("WORKER_COUNT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("WORKER_COUNT must be a valid usize");

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let rescan_interval_secs: u64 = std::env::var("RESCAN_INTERVAL_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("RESCAN_INTERVAL_SECS must be a valid u64");

        let rescan_min_age_secs: i64 = std::env::var("RESCAN_MIN_AGE_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("RESCAN_MIN_AGE_SECS must be a valid i64");

        Self {
            host,
            port,
            base_url,
            processed_dir,
            webhook_secret,
            worker_count,
            request_timeout_secs,
            rescan_interval_secs,
            rescan_min_age_secs,
        }
    }
}
