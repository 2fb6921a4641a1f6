use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error};

use shared_config::ClinicConfig;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote error: {0}")]
    Remote(String),
}

/// Executes one GraphQL query or mutation against the remote service.
///
/// Runtime values travel as bound variables, never interpolated into the
/// query text. Implementations must enforce a request timeout so no call
/// can block an aggregation indefinitely.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GatewayError>;
}

pub struct GraphQlClient {
    client: Client,
    endpoint: String,
}

impl GraphQlClient {
    pub fn new(config: &ClinicConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            endpoint: config.graphql_endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryGateway for GraphQlClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GatewayError> {
        debug!("Sending request to {}", self.endpoint);

        let payload = json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gateway HTTP error ({}): {}", status, body);
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Malformed(e.to_string())
            }
        })?;

        // The service reports query/mutation rejection as an `errors` array
        // on a 200 response.
        if let Some(errors) = body.get("errors") {
            if !errors.is_null() {
                error!("Gateway returned errors: {}", errors);
                return Err(GatewayError::Remote(errors.to_string()));
            }
        }

        body.get("data")
            .filter(|data| !data.is_null())
            .cloned()
            .ok_or_else(|| GatewayError::Malformed("response has no data field".to_string()))
    }
}
