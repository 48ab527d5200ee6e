//! Vision-provider token acquisition
//!
//! A token-acquisition step precedes every vision call. Acquisition is itself
//! fallback-protected: on any failure the service hands out
//! [`AccessToken::Offline`], which recognizers interpret as "skip the network
//! call, go straight to fallback" rather than attempting a doomed request.

use crate::config::ServiceConfig;
use crate::types::{AccessToken, ServiceError};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Token issuance provider seam
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquire a bearer token from the issuance endpoint
    async fn acquire(&self) -> Result<AccessToken, ServiceError>;
}

/// Token issuance response payload
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error_description: Option<String>,
}

/// HTTP token provider (OAuth client-credentials style)
pub struct HttpTokenProvider {
    http_client: reqwest::Client,
    token_url: String,
    api_key: String,
    secret: String,
}

impl HttpTokenProvider {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            token_url: config.endpoints.token_url.clone(),
            api_key: config.vision_api_key.clone(),
            secret: config.vision_secret.clone(),
        })
    }
}

#[async_trait::async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn acquire(&self) -> Result<AccessToken, ServiceError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.api_key.as_str()),
            ("client_secret", self.secret.as_str()),
        ];

        debug!("Requesting vision provider access token");

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(ServiceError::Auth(format!("token endpoint status {}", status)));
        }
        if !status.is_success() {
            return Err(ServiceError::Network(format!(
                "token endpoint status {}",
                status
            )));
        }

        let payload: TokenResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        match payload.access_token {
            Some(token) if !token.trim().is_empty() => Ok(AccessToken::Bearer(token)),
            _ => Err(ServiceError::Auth(
                payload
                    .error_description
                    .unwrap_or_else(|| "no access_token in response".to_string()),
            )),
        }
    }
}

/// Fallback-protected token service.
///
/// Demo credentials pin the service offline permanently so the pipeline runs
/// fallback-only instead of sending known-bad keys to real providers.
#[derive(Clone)]
pub struct TokenService {
    provider: Arc<dyn TokenProvider>,
    pinned_offline: bool,
}

impl TokenService {
    pub fn new(provider: Arc<dyn TokenProvider>, pinned_offline: bool) -> Self {
        Self {
            provider,
            pinned_offline,
        }
    }

    /// Acquire a token, absorbing every failure into the Offline sentinel
    pub async fn acquire(&self) -> AccessToken {
        if self.pinned_offline {
            return AccessToken::Offline;
        }
        match self.provider.acquire().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token acquisition failed, using offline sentinel");
                AccessToken::Offline
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait::async_trait]
    impl TokenProvider for FailingProvider {
        async fn acquire(&self) -> Result<AccessToken, ServiceError> {
            Err(ServiceError::Auth("credentials rejected".to_string()))
        }
    }

    struct FixedProvider;

    #[async_trait::async_trait]
    impl TokenProvider for FixedProvider {
        async fn acquire(&self) -> Result<AccessToken, ServiceError> {
            Ok(AccessToken::Bearer("token-abc".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failure_absorbed_into_offline_sentinel() {
        let service = TokenService::new(Arc::new(FailingProvider), false);
        assert_eq!(service.acquire().await, AccessToken::Offline);
    }

    #[tokio::test]
    async fn test_pinned_offline_never_calls_provider() {
        let service = TokenService::new(Arc::new(FailingProvider), true);
        assert!(service.acquire().await.is_offline());
    }

    #[tokio::test]
    async fn test_successful_acquisition() {
        let service = TokenService::new(Arc::new(FixedProvider), false);
        assert_eq!(
            service.acquire().await,
            AccessToken::Bearer("token-abc".to_string())
        );
    }
}
