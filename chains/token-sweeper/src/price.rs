//! Best-effort ETH/USD quotes used to annotate fees and balances.

use async_trait::async_trait;
use core_logic::{with_retry, NetworkError, RetryConfig};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current ETH price in USD, or `None` when no quote is available.
    async fn eth_usd(&self) -> Option<f64>;
}

/// Used when price lookups are disabled.
pub struct NoPriceFeed;

#[async_trait]
impl PriceFeed for NoPriceFeed {
    async fn eth_usd(&self) -> Option<f64> {
        None
    }
}

/// CoinGecko `simple/price` endpoint (`{"ethereum":{"usd":1234.5}}`).
pub struct CoinGeckoFeed {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl CoinGeckoFeed {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            url: url.into(),
            retry: RetryConfig::new(2, 500),
        })
    }

    async fn fetch(&self) -> anyhow::Result<f64> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            NetworkError::RequestFailed {
                endpoint: self.url.clone(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint: self.url.clone(),
            }
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NetworkError::InvalidResponse {
                endpoint: self.url.clone(),
                reason: e.to_string(),
            })?;
        parse_quote(&body).ok_or_else(|| {
            NetworkError::InvalidResponse {
                endpoint: self.url.clone(),
                reason: "missing ethereum.usd".to_string(),
            }
            .into()
        })
    }
}

fn parse_quote(body: &Value) -> Option<f64> {
    body.get("ethereum")?.get("usd")?.as_f64()
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn eth_usd(&self) -> Option<f64> {
        match with_retry(self.retry.clone(), "eth_usd", || self.fetch()).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!("ETH price unavailable: {:#}", e);
                None
            }
        }
    }
}
