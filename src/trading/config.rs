//! Trading configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{BotError, Result};

/// Which engine `run` drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingMode {
    /// One hedged pair on one account, then stop
    SinglePair,
    /// Repeated hedged pairs on one account
    Volume,
    /// Opposite single legs on two accounts
    Dual,
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradingMode::SinglePair => "single_pair",
            TradingMode::Volume => "volume",
            TradingMode::Dual => "dual",
        }
    }

    pub fn accounts(&self) -> usize {
        match self {
            TradingMode::Dual => 2,
            _ => 1,
        }
    }
}

impl FromStr for TradingMode {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "single_pair" | "single" => Ok(TradingMode::SinglePair),
            "volume" => Ok(TradingMode::Volume),
            "dual" => Ok(TradingMode::Dual),
            other => Err(BotError::Configuration(format!(
                "invalid mode '{}'. Supported modes: single_pair, volume, dual",
                other
            ))),
        }
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Inclusive range of whole-second durations a random draw is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBounds {
    pub min: Duration,
    pub max: Duration,
}

impl TimeBounds {
    pub fn from_secs(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_secs(min),
            max: Duration::from_secs(max),
        }
    }

    fn validate(&self, name: &str, min_floor: Duration) -> Result<()> {
        if self.min < min_floor {
            return Err(BotError::Configuration(format!(
                "minimum {} must be at least {}s",
                name,
                min_floor.as_secs()
            )));
        }
        if self.max < self.min {
            return Err(BotError::Configuration(format!(
                "maximum {} must not be below the minimum",
                name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TimeBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}s", self.min.as_secs(), self.max.as_secs())
    }
}

/// Limits the cycle engine enforces between cycles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskLimits {
    /// Stop once |cumulative PnL| reaches this many USDT
    pub max_loss_usdt: Decimal,

    /// Random pause between cycles
    pub cycle_delay: TimeBounds,
}

/// Dual-account monitoring limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualLimits {
    /// Close both accounts once either leg loses this share of its margin
    pub max_position_deviation_percent: Decimal,

    /// Random maximum hold time per cycle
    pub hold_time: TimeBounds,
}

/// Configuration for sizing, risk, and mode-specific timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradingConfig {
    pub mode: TradingMode,

    pub symbol: String,

    /// Leverage applied on every account (1 to 100)
    pub leverage: u32,

    /// Share of available balance put at risk per cycle (1 to 100)
    pub balance_percentage: Decimal,

    /// Safety factor applied to the exchange's minimum notional
    pub liquidity_multiplier: Decimal,

    /// Request dual-side position mode during setup
    pub hedge_mode: bool,

    pub risk: RiskLimits,

    /// Random hold time for single-account cycles
    pub close_time: TimeBounds,

    pub dual: DualLimits,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            mode: TradingMode::Volume,
            symbol: "BTCUSDT".to_string(),
            leverage: 20,
            balance_percentage: dec!(50),
            liquidity_multiplier: dec!(1.2),
            hedge_mode: true,
            risk: RiskLimits {
                max_loss_usdt: dec!(100),
                cycle_delay: TimeBounds::from_secs(5, 15),
            },
            close_time: TimeBounds::from_secs(10, 30),
            dual: DualLimits {
                max_position_deviation_percent: dec!(20),
                hold_time: TimeBounds::from_secs(30, 300),
            },
        }
    }
}

impl TradingConfig {
    /// Check ranges and orderings. Mode-specific bounds are only checked for
    /// the mode that uses them.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BotError::Configuration("symbol must not be empty".into()));
        }
        if !(1..=100).contains(&self.leverage) {
            return Err(BotError::Configuration("leverage must be between 1 and 100".into()));
        }
        if self.liquidity_multiplier < Decimal::ONE {
            return Err(BotError::Configuration(
                "liquidity multiplier must be at least 1.0".into(),
            ));
        }
        if self.balance_percentage < Decimal::ONE || self.balance_percentage > dec!(100) {
            return Err(BotError::Configuration(
                "balance percentage must be between 1 and 100".into(),
            ));
        }
        if self.risk.max_loss_usdt <= Decimal::ZERO {
            return Err(BotError::Configuration("max loss must be greater than 0".into()));
        }
        self.risk.cycle_delay.validate("cycle delay", Duration::ZERO)?;

        match self.mode {
            TradingMode::SinglePair | TradingMode::Volume => {
                if !self.hedge_mode {
                    return Err(BotError::Configuration(format!(
                        "{} mode holds LONG and SHORT on one account and needs hedge mode",
                        self.mode
                    )));
                }
                self.close_time.validate("close time", Duration::from_secs(1))?;
            }
            TradingMode::Dual => {
                if self.dual.max_position_deviation_percent <= Decimal::ZERO {
                    return Err(BotError::Configuration(
                        "max position deviation must be greater than 0".into(),
                    ));
                }
                self.dual.hold_time.validate("hold time", Duration::from_secs(1))?;
            }
        }

        Ok(())
    }
}
