use async_trait::async_trait;
use serde::Serialize;

use crate::config::GatewayConfig;

/// Outbound message delivery, provided by the hosting chat-bot runtime.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_group_message(&self, group_id: &str, text: &str) -> Result<(), DispatchError>;
}

/// Group membership lookup; used only for display (activity rate), so an
/// unknown count is `None`, never an error.
#[async_trait]
pub trait GroupMembershipProvider: Send + Sync {
    async fn member_count(&self, group_id: &str) -> Option<u64>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("gateway is disabled")]
    Disabled,
    #[error("gateway network error: {0}")]
    Network(String),
    #[error("gateway api error: status={status}")]
    ApiError { status: u16 },
}

/// HTTP client for the host bot gateway. In mock mode every send succeeds
/// without touching the network (development and tests).
#[derive(Debug, Clone)]
pub struct HostGateway {
    config: GatewayConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody<'a> {
    group_id: &'a str,
    message: &'a str,
}

impl HostGateway {
    pub fn new(config: &GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config: config.clone(),
            client,
        }
    }

    /// Validate gateway configuration at startup.
    /// Panics if `enabled=true`, `mock=false` and no base URL is configured.
    pub fn validate_config(config: &GatewayConfig) {
        if config.enabled && !config.mock && config.base_url.trim().is_empty() {
            panic!(
                "Invalid gateway configuration: enabled=true and mock=false \
                 but GATEWAY_BASE_URL is empty. Set GATEWAY_BASE_URL or GATEWAY_MOCK=true."
            );
        }
    }
}

#[async_trait]
impl MessageSender for HostGateway {
    async fn send_group_message(&self, group_id: &str, text: &str) -> Result<(), DispatchError> {
        if !self.config.enabled {
            return Err(DispatchError::Disabled);
        }
        if self.config.mock {
            tracing::debug!(group_id, "Mock gateway send");
            return Ok(());
        }

        let url = format!(
            "{}/send_group_message",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_token)
            .json(&SendMessageBody {
                group_id,
                message: text,
            })
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DispatchError::ApiError {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GroupMembershipProvider for HostGateway {
    async fn member_count(&self, group_id: &str) -> Option<u64> {
        if !self.config.enabled || self.config.mock {
            return None;
        }

        let url = format!(
            "{}/groups/{}/member-count",
            self.config.base_url.trim_end_matches('/'),
            group_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }

        let body: serde_json::Value = response.json().await.ok()?;
        body.get("memberCount").and_then(|v| v.as_u64())
    }
}
