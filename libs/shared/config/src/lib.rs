use std::env;
use tracing::warn;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_AVAILABILITY_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub graphql_endpoint: String,
    pub request_timeout_secs: u64,
    pub availability_window_days: i64,
    pub fetch_concurrency: usize,
    pub snapshot_path: String,
}

impl ClinicConfig {
    pub fn from_env() -> Self {
        let config = Self {
            graphql_endpoint: env::var("GRAPHQL_ENDPOINT")
                .unwrap_or_else(|_| {
                    warn!("GRAPHQL_ENDPOINT not set, using empty value");
                    String::new()
                }),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            availability_window_days: env::var("AVAILABILITY_WINDOW_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_AVAILABILITY_WINDOW_DAYS),
            fetch_concurrency: env::var("FETCH_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(DEFAULT_FETCH_CONCURRENCY),
            snapshot_path: env::var("SNAPSHOT_PATH")
                .unwrap_or_else(|_| "results.json".to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.graphql_endpoint.is_empty()
    }
}
