//! REST client for a Binance-compatible USDT-margined futures API.
//!
//! Public endpoints are plain GETs. Account endpoints are signed: a millisecond
//! `timestamp` is appended to the query string, the whole query string is
//! HMAC-SHA256 signed with the API secret, and the hex signature is appended as
//! the final `signature` parameter. The API key travels in `X-MBX-APIKEY`.

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::auth::sign_request;
use super::types::*;
use super::{ApiError, ExchangeClient};

pub const DEFAULT_BASE_URL: &str = "https://fapi.asterdex.com";
const API_KEY_HEADER: &str = "X-MBX-APIKEY";
const ORDER_BOOK_DEPTH: u32 = 5;

/// Credentials for one account.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

/// Transport settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout: Duration,

    /// Maximum attempts for idempotent requests (1 disables retries)
    pub retry_attempts: u32,

    /// Initial delay between retries; grows exponentially
    pub retry_delay: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Signed futures API client bound to one account.
pub struct AsterClient {
    http: Client,
    base_url: Url,
    api_secret: String,
    settings: ClientSettings,
}

impl AsterClient {
    pub fn new(credentials: &ApiCredentials, settings: &ClientSettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&credentials.api_key)
            .map_err(|_| ApiError::InvalidRequest("API key is not a valid header value".into()))?;
        headers.insert(API_KEY_HEADER, key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base URL {}: {}", settings.base_url, e)))?;

        Ok(Self {
            http,
            base_url,
            api_secret: credentials.api_secret.clone(),
            settings: settings.clone(),
        })
    }

    /// Build the request URL. Signed requests get `timestamp` and `signature`
    /// appended, computed over the exact encoded query string.
    fn build_url(&self, path: &str, params: &[(&str, String)], signed: bool) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid path {}: {}", path, e)))?;

        if signed || !params.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if signed {
                query.append_pair("timestamp", &Utc::now().timestamp_millis().to_string());
            }
        }

        if signed {
            let signature = sign_request(&self.api_secret, url.query().unwrap_or_default())?;
            url.query_pairs_mut().append_pair("signature", &signature);
        }

        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T, ApiError> {
        debug!(method = %method, path = %url.path(), "Exchange request");

        let response = self.http.request(method, url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("{}: {}", e, text)));
        }

        let (code, msg) = match serde_json::from_str::<ApiErrorResponse>(&text) {
            Ok(body) => (Some(body.code), body.msg),
            Err(_) => (None, text),
        };
        Err(ApiError::Status {
            status: status.as_u16(),
            code,
            msg,
        })
    }

    /// GET with retries on transient failures. Signed requests are re-signed on
    /// every attempt so the timestamp stays fresh.
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T, ApiError> {
        let max_attempts = self.settings.retry_attempts.max(1);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.settings.retry_delay)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0u32;
        backoff::future::retry(policy, || {
            attempt += 1;
            let last_attempt = attempt >= max_attempts;
            let current = attempt;

            async move {
                let url = self.build_url(path, params, signed).map_err(backoff::Error::permanent)?;
                match self.send(Method::GET, url).await {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_transient() && !last_attempt => {
                        warn!(path = %path, attempt = current, error = %e, "Retrying exchange request");
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    /// Signed POST. Never retried: a repeated market order could fill twice.
    async fn post_signed<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T, ApiError> {
        let url = self.build_url(path, params, true)?;
        self.send(Method::POST, url).await
    }
}

#[async_trait]
impl ExchangeClient for AsterClient {
    async fn exchange_info(&self) -> Result<ExchangeInfo, ApiError> {
        self.get("/fapi/v1/exchangeInfo", &[], false).await
    }

    async fn order_book(&self, symbol: &str, depth: u32) -> Result<OrderBook, ApiError> {
        let depth = if depth == 0 { ORDER_BOOK_DEPTH } else { depth };
        let params = [("symbol", symbol.to_string()), ("limit", depth.to_string())];
        self.get("/fapi/v1/depth", &params, false).await
    }

    async fn dual_side_position(&self) -> Result<bool, ApiError> {
        let resp: DualSideResponse = self.get("/fapi/v1/positionSide/dual", &[], true).await?;
        Ok(resp.dual_side_position)
    }

    async fn set_dual_side_position(&self, enabled: bool) -> Result<(), ApiError> {
        let params = [("dualSidePosition", enabled.to_string())];
        let _: serde_json::Value = self.post_signed("/fapi/v1/positionSide/dual", &params).await?;
        Ok(())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ApiError> {
        let params = [("symbol", symbol.to_string()), ("leverage", leverage.to_string())];
        let _: serde_json::Value = self.post_signed("/fapi/v1/leverage", &params).await?;
        Ok(())
    }

    async fn place_order(&self, order: &MarketOrder) -> Result<OrderResponse, ApiError> {
        let params = [
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("positionSide", order.position_side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", order.quantity.normalize().to_string()),
            ("newClientOrderId", format!("hf-{}", uuid::Uuid::new_v4().simple())),
        ];
        self.post_signed("/fapi/v1/order", &params).await
    }

    async fn position_risk(&self, symbol: Option<&str>) -> Result<Vec<PositionRisk>, ApiError> {
        let params: Vec<(&str, String)> = symbol.map(|s| ("symbol", s.to_string())).into_iter().collect();
        self.get("/fapi/v2/positionRisk", &params, true).await
    }

    async fn account_balance(&self) -> Result<Vec<AssetBalance>, ApiError> {
        self.get("/fapi/v2/balance", &[], true).await
    }
}
