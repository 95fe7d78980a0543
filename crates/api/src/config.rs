use std::time::Duration;

use swapdeck_core::admission::DEFAULT_MAX_CONCURRENT;
use swapdeck_upstream::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use swapdeck_upstream::UpstreamConfig;

/// Master code accepted when `MASTER_ACCESS_CODE` is unset. Development only.
pub const DEV_MASTER_ACCESS_CODE: &str = "change-me";

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// set at least `MASTER_ACCESS_CODE` and `DATABASE_URL`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `10000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Whole-request timeout in seconds (default: `240`). Must exceed the
    /// upstream timeout so upstream timeouts reach the caller as JSON.
    pub request_timeout_secs: u64,
    /// Simultaneous upstream generations allowed (default: `3`).
    pub max_concurrent_generations: usize,
    /// Shared secret required to register an account.
    pub master_access_code: String,
    /// Upstream host and per-call timeout.
    pub upstream: UpstreamConfig,
    /// Directory served at `/` for the browser UI (default: `public`).
    pub static_dir: String,
    /// Postgres URL. `None` keeps accounts in process memory.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                    |
    /// |------------------------------|----------------------------|
    /// | `HOST`                       | `0.0.0.0`                  |
    /// | `PORT`                       | `10000`                    |
    /// | `CORS_ORIGINS`               | `http://localhost:10000`   |
    /// | `REQUEST_TIMEOUT_SECS`       | `240`                      |
    /// | `MAX_CONCURRENT_GENERATIONS` | `3`                        |
    /// | `MASTER_ACCESS_CODE`         | `change-me`                |
    /// | `UPSTREAM_BASE_URL`          | `https://api.wavespeed.ai` |
    /// | `UPSTREAM_TIMEOUT_SECS`      | `180`                      |
    /// | `STATIC_DIR`                 | `public`                   |
    /// | `DATABASE_URL`               | unset (in-memory accounts) |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "10000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:10000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "240".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_concurrent_generations: usize = std::env::var("MAX_CONCURRENT_GENERATIONS")
            .unwrap_or_else(|_| DEFAULT_MAX_CONCURRENT.to_string())
            .parse()
            .expect("MAX_CONCURRENT_GENERATIONS must be a valid usize");

        let master_access_code = std::env::var("MASTER_ACCESS_CODE").unwrap_or_else(|_| {
            tracing::warn!("MASTER_ACCESS_CODE not set, using the development default");
            DEV_MASTER_ACCESS_CODE.into()
        });

        let upstream_timeout_secs: u64 = std::env::var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("UPSTREAM_TIMEOUT_SECS must be a valid u64");

        let upstream = UpstreamConfig {
            base_url: std::env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            timeout: Duration::from_secs(upstream_timeout_secs),
        };

        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "public".into());

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_concurrent_generations,
            master_access_code,
            upstream,
            static_dir,
            database_url,
        }
    }
}
