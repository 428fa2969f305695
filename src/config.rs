//! Process settings: every value is a CLI flag with an environment fallback,
//! so a `.env` file is enough to configure a run.

use std::time::Duration;

use clap::{ArgAction, Args};
use rust_decimal::Decimal;

use crate::api::{ApiCredentials, ClientSettings, DEFAULT_BASE_URL};
use crate::error::{BotError, Result};
use crate::trading::{DualLimits, RiskLimits, TimeBounds, TradingConfig, TradingMode};

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// API key of the primary account
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API secret of the primary account
    #[arg(long, env = "API_SECRET", hide_env_values = true)]
    pub api_secret: Option<String>,

    /// API key of the second account (dual mode)
    #[arg(long, env = "API_KEY2", hide_env_values = true)]
    pub api_key2: Option<String>,

    /// API secret of the second account (dual mode)
    #[arg(long, env = "API_SECRET2", hide_env_values = true)]
    pub api_secret2: Option<String>,

    /// Futures REST endpoint
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 5)]
    pub request_timeout: u64,

    /// Attempts for idempotent requests
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// Initial retry delay in seconds
    #[arg(long, env = "RETRY_DELAY", default_value_t = 1)]
    pub retry_delay: u64,

    /// Trading mode (single_pair, volume, dual)
    #[arg(long, env = "MODE", default_value = "volume")]
    pub mode: String,

    #[arg(long, env = "SYMBOL", default_value = "BTCUSDT")]
    pub symbol: String,

    #[arg(long, env = "LEVERAGE", default_value_t = 20)]
    pub leverage: u32,

    /// Safety factor over the exchange minimum notional
    #[arg(long, env = "LIQUIDITY_MULTIPLIER", default_value = "1.2")]
    pub liquidity_multiplier: Decimal,

    /// Percent of available balance used per cycle
    #[arg(long, env = "BALANCE_PERCENTAGE", default_value = "50")]
    pub balance_percentage: Decimal,

    /// Enable dual-side position mode during setup
    #[arg(long, env = "HEDGE_MODE", default_value_t = true, action = ArgAction::Set)]
    pub hedge_mode: bool,

    /// Stop once cumulative PnL reaches this many USDT in absolute value
    #[arg(long, env = "MAX_LOSS_USDT", default_value = "100")]
    pub max_loss_usdt: Decimal,

    #[arg(long, env = "MIN_CYCLE_DELAY_SEC", default_value_t = 5)]
    pub min_cycle_delay_sec: u64,

    #[arg(long, env = "MAX_CYCLE_DELAY_SEC", default_value_t = 15)]
    pub max_cycle_delay_sec: u64,

    #[arg(long, env = "MIN_CLOSE_TIME_SEC", default_value_t = 10)]
    pub min_close_time_sec: u64,

    #[arg(long, env = "MAX_CLOSE_TIME_SEC", default_value_t = 30)]
    pub max_close_time_sec: u64,

    #[arg(long, env = "MAX_POSITION_DEVIATION_PERCENT", default_value = "20")]
    pub max_position_deviation_percent: Decimal,

    #[arg(long, env = "DUAL_MIN_HOLD_TIME_SEC", default_value_t = 30)]
    pub dual_min_hold_time_sec: u64,

    #[arg(long, env = "DUAL_MAX_HOLD_TIME_SEC", default_value_t = 300)]
    pub dual_max_hold_time_sec: u64,
}

impl Settings {
    /// Build and validate the trading configuration.
    pub fn trading_config(&self) -> Result<TradingConfig> {
        let config = TradingConfig {
            mode: self.mode.parse()?,
            symbol: self.symbol.trim().to_uppercase(),
            leverage: self.leverage,
            balance_percentage: self.balance_percentage,
            liquidity_multiplier: self.liquidity_multiplier,
            hedge_mode: self.hedge_mode,
            risk: RiskLimits {
                max_loss_usdt: self.max_loss_usdt,
                cycle_delay: TimeBounds::from_secs(self.min_cycle_delay_sec, self.max_cycle_delay_sec),
            },
            close_time: TimeBounds::from_secs(self.min_close_time_sec, self.max_close_time_sec),
            dual: DualLimits {
                max_position_deviation_percent: self.max_position_deviation_percent,
                hold_time: TimeBounds::from_secs(self.dual_min_hold_time_sec, self.dual_max_hold_time_sec),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Credentials for every account `mode` trades on, primary first.
    pub fn credentials(&self, mode: TradingMode) -> Result<Vec<ApiCredentials>> {
        let primary = pair(&self.api_key, &self.api_secret)
            .ok_or_else(|| BotError::Configuration("API_KEY and API_SECRET must be set".into()))?;

        let mut accounts = vec![primary];
        if mode.accounts() > 1 {
            let second = pair(&self.api_key2, &self.api_secret2).ok_or_else(|| {
                BotError::Configuration("API_KEY2 and API_SECRET2 must be set for dual mode".into())
            })?;
            accounts.push(second);
        }
        Ok(accounts)
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.request_timeout),
            retry_attempts: self.retry_attempts,
            retry_delay: Duration::from_secs(self.retry_delay),
        }
    }
}

fn pair(key: &Option<String>, secret: &Option<String>) -> Option<ApiCredentials> {
    match (key.as_deref().map(str::trim), secret.as_deref().map(str::trim)) {
        (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => Some(ApiCredentials {
            api_key: key.to_string(),
            api_secret: secret.to_string(),
        }),
        _ => None,
    }
}

/// Show only the first and last four characters of a secret.
pub fn mask(secret: Option<&str>) -> String {
    let chars: Vec<char> = secret.unwrap_or_default().chars().collect();
    match chars.len() {
        0 => "(not set)".to_string(),
        n if n > 8 => format!(
            "{}...{}",
            chars[..4].iter().collect::<String>(),
            chars[n - 4..].iter().collect::<String>()
        ),
        _ => "****".to_string(),
    }
}
