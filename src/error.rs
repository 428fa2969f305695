use rust_decimal::Decimal;
use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by the trading layer.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Exchange request failed: {0}")]
    ExchangeRequest(#[from] ApiError),

    #[error("Insufficient balance on {account}: {balance} USDT available")]
    InsufficientBalance { account: String, balance: Decimal },

    #[error("Trading rules unavailable for {0}")]
    SymbolInfoUnavailable(String),

    #[error("No market data for {0}")]
    MarketDataUnavailable(String),

    #[error("{account} is in one-way position mode; a hedged pair needs dual-side mode")]
    HedgeModeDisabled { account: String },

    #[error("Failed to open position on {account}: {source}")]
    PositionOpen {
        account: String,
        #[source]
        source: Box<BotError>,
    },
}

impl BotError {
    pub fn position_open(account: &str, source: BotError) -> Self {
        BotError::PositionOpen {
            account: account.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
