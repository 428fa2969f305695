//! Futures exchange API: signed REST client and wire types.

mod auth;
mod client;
mod error;
mod types;

use async_trait::async_trait;

pub use client::{ApiCredentials, AsterClient, ClientSettings, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use types::*;

/// Operations the trading layer needs from one exchange account.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn exchange_info(&self) -> Result<ExchangeInfo, ApiError>;

    async fn order_book(&self, symbol: &str, depth: u32) -> Result<OrderBook, ApiError>;

    /// Whether the account is in hedge (dual-side) position mode.
    async fn dual_side_position(&self) -> Result<bool, ApiError>;

    async fn set_dual_side_position(&self, enabled: bool) -> Result<(), ApiError>;

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ApiError>;

    async fn place_order(&self, order: &MarketOrder) -> Result<OrderResponse, ApiError>;

    /// Position rows, optionally filtered to one symbol. Includes flat rows.
    async fn position_risk(&self, symbol: Option<&str>) -> Result<Vec<PositionRisk>, ApiError>;

    async fn account_balance(&self) -> Result<Vec<AssetBalance>, ApiError>;
}
