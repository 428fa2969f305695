//! Request and response types for the futures REST API.
//!
//! Numeric fields arrive as JSON strings and are decoded straight into
//! `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderSide, PositionSide};

/// Response from `/fapi/v1/exchangeInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<SymbolInfo>,
}

/// One tradable symbol and its filters.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Symbol filters the sizing logic cares about. Everything else is `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    PriceFilter { tick_size: Decimal },

    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize { step_size: Decimal, min_qty: Decimal },

    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional { notional: Decimal },

    #[serde(other)]
    Other,
}

/// Response from `/fapi/v1/depth`. Levels are `[price, quantity]` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBook {
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
}

/// Response from `GET /fapi/v1/positionSide/dual`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DualSideResponse {
    #[serde(default)]
    pub dual_side_position: bool,
}

/// A market order to submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub position_side: PositionSide,
    pub quantity: Decimal,
}

impl MarketOrder {
    pub fn new(symbol: &str, side: OrderSide, position_side: PositionSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            position_side,
            quantity,
        }
    }
}

/// Response from `POST /fapi/v1/order`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub client_order_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub executed_qty: Option<Decimal>,
    #[serde(default)]
    pub avg_price: Option<Decimal>,
}

impl OrderResponse {
    /// Realized average price, or `fallback` when the exchange did not report
    /// one (absent or zero for an order still being matched).
    pub fn fill_price_or(&self, fallback: Decimal) -> Decimal {
        match self.avg_price {
            Some(price) if price > Decimal::ZERO => price,
            _ => fallback,
        }
    }
}

/// One row from `/fapi/v2/positionRisk`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRisk {
    pub symbol: String,
    pub position_amt: Decimal,
    #[serde(default)]
    pub entry_price: Decimal,
    #[serde(default)]
    pub un_realized_profit: Decimal,
    pub position_side: PositionSide,
    #[serde(default)]
    pub isolated_wallet: Decimal,
    #[serde(default)]
    pub initial_margin: Decimal,
}

/// One asset row from `/fapi/v2/balance`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    pub asset: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub available_balance: Decimal,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
