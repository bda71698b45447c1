//! 3Commas REST API client with rate limiting.
//!
//! Provides typed access to the bot endpoints needed to coordinate a
//! cluster: reading a bot with its active deals, and replacing its pair list.
//!
//! # Example
//!
//! ```ignore
//! use deal_cluster_threecommas::{ThreeCommasAuth, ThreeCommasClient, ThreeCommasClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = ThreeCommasAuth::new("api-key", "api-secret")?;
//!     let client = ThreeCommasClient::new(ThreeCommasClientConfig::default(), auth)?;
//!
//!     let bot = client.show_bot(12345).await?;
//!     println!("{} has {} active deal(s)", bot.name, bot.active_deals.len());
//!     Ok(())
//! }
//! ```

use crate::auth::ThreeCommasAuth;
use crate::error::{Result, ThreeCommasError};
use crate::types::{update_payload, RawApiError, RawBot};
use async_trait::async_trait;
use deal_cluster_core::{BotId, BotService, BotServiceError, BotSnapshot, ThreeCommasConfig};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;

// =============================================================================
// Constants
// =============================================================================

/// 3Commas production API base URL.
pub const THREECOMMAS_API_URL: &str = "https://api.3commas.io";

/// Path prefix shared by every public API endpoint.
pub const API_PREFIX: &str = "/public/api";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the 3Commas client.
#[derive(Debug, Clone)]
pub struct ThreeCommasClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Requests per minute limit.
    pub requests_per_minute: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ThreeCommasClientConfig {
    fn default() -> Self {
        Self {
            base_url: THREECOMMAS_API_URL.to_string(),
            requests_per_minute: nonzero!(60u32),
            timeout_secs: 30,
        }
    }
}

impl ThreeCommasClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl From<&ThreeCommasConfig> for ThreeCommasClientConfig {
    fn from(config: &ThreeCommasConfig) -> Self {
        let defaults = Self::default();
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            requests_per_minute: NonZeroU32::new(config.requests_per_minute)
                .unwrap_or(defaults.requests_per_minute),
            timeout_secs: config.timeout_secs,
        }
    }
}

// =============================================================================
// ThreeCommasClient
// =============================================================================

/// 3Commas REST API client.
///
/// All requests are rate-limited and signed.
pub struct ThreeCommasClient {
    /// Configuration.
    config: ThreeCommasClientConfig,

    /// HTTP client.
    http: Client,

    /// Rate limiter.
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,

    /// Request signer.
    auth: ThreeCommasAuth,
}

impl std::fmt::Debug for ThreeCommasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreeCommasClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_minute", &self.config.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl ThreeCommasClient {
    /// Creates a new client with the given configuration and signer.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: ThreeCommasClientConfig, auth: ThreeCommasAuth) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ThreeCommasError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
            auth,
        })
    }

    /// Creates a client from the `[threecommas]` configuration section.
    ///
    /// # Errors
    /// Returns error if the credentials are empty or the HTTP client cannot be built.
    pub fn from_config(config: &ThreeCommasConfig) -> Result<Self> {
        let auth = ThreeCommasAuth::new(config.api_key.clone(), config.api_secret.clone())?;
        Self::new(ThreeCommasClientConfig::from(config), auth)
    }

    /// Waits for rate limiter and makes a signed GET request.
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let signed_path = format!("{API_PREFIX}{path}");
        let url = format!("{}{}", self.config.base_url, signed_path);
        let headers = self.auth.sign_request(&signed_path, "")?;

        tracing::debug!("GET {}", url);

        let [key, signature] = headers.as_tuples();
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .header(key.0, key.1)
            .header(signature.0, signature.1)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Waits for rate limiter and makes a signed PATCH request.
    async fn patch<T: serde::de::DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let signed_path = format!("{API_PREFIX}{path}");
        let url = format!("{}{}", self.config.base_url, signed_path);
        let body_json = serde_json::to_string(body)?;
        let headers = self.auth.sign_request(&signed_path, &body_json)?;

        tracing::debug!("PATCH {} body_len={}", url, body_json.len());

        let [key, signature] = headers.as_tuples();
        let response = self
            .http
            .patch(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json")
            .header(key.0, key.1)
            .header(signature.0, signature.1)
            .body(body_json)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handles API response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ThreeCommasError::rate_limit(retry_after));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<RawApiError>(&text)
                .ok()
                .and_then(RawApiError::message)
                .unwrap_or(text);
            return Err(ThreeCommasError::api(status.as_u16(), message));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    // =========================================================================
    // Bot Endpoints
    // =========================================================================

    /// Gets a bot with its active deals and candidate pairs.
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn show_bot(&self, bot_id: BotId) -> Result<BotSnapshot> {
        let path = format!("/ver1/bots/{bot_id}/show");
        let raw: RawBot = self.get(&path).await?;
        Ok(raw.into())
    }

    /// Replaces the pair list of a bot, keeping its other settings.
    ///
    /// # Errors
    /// Returns error if the update is rejected or the API call fails.
    pub async fn update_pairs(&self, bot: &BotSnapshot, pairs: &[String]) -> Result<BotSnapshot> {
        let path = format!("/ver1/bots/{}/update", bot.id);
        let payload = update_payload(bot, pairs);
        let raw: RawBot = self.patch(&path, &payload).await?;
        Ok(raw.into())
    }
}

#[async_trait]
impl BotService for ThreeCommasClient {
    async fn fetch_bot(&self, bot_id: BotId) -> std::result::Result<BotSnapshot, BotServiceError> {
        self.show_bot(bot_id).await.map_err(|e| {
            let message = match e {
                ThreeCommasError::Api { message, .. } => message,
                other => other.to_string(),
            };
            BotServiceError::query(bot_id, Some(message))
        })
    }

    async fn update_bot_pairs(
        &self,
        bot: &BotSnapshot,
        pairs: &[String],
    ) -> std::result::Result<(), BotServiceError> {
        let updated = self
            .update_pairs(bot, pairs)
            .await
            .map_err(|e| BotServiceError::update(bot.id, e.to_string()))?;

        tracing::info!(
            "Bot \"{}\" ({}) updated with {} pair(s)",
            updated.name,
            updated.id,
            pairs.len()
        );
        Ok(())
    }
}
