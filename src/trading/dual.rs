//! Two-account coordinator: one LONG on one account, one SHORT on the other,
//! watched together and closed together.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::{join, try_join};
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{BotError, Result};
use crate::models::{ActivePosition, PositionInfo, PositionSide};

use super::engine::{HedgeCycle, StopReason};
use super::position_sizer::{LegsPerAccount, PositionSizer};
use super::random::RandomSource;
use super::session::AccountSession;
use super::{DualLimits, TradingConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The two legs of one dual-account cycle, in account order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OppositePositions {
    pub a: PositionInfo,
    pub b: PositionInfo,
}

pub struct DualAccountCoordinator {
    a: AccountSession,
    b: AccountSession,
    sizer: PositionSizer,
    symbol: String,
    leverage: u32,
    hedge_mode: bool,
    limits: DualLimits,
    poll_interval: Duration,
    random: Box<dyn RandomSource>,
}

impl DualAccountCoordinator {
    pub fn new(
        a: AccountSession,
        b: AccountSession,
        config: &TradingConfig,
        random: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            a,
            b,
            sizer: PositionSizer::from_config(config),
            symbol: config.symbol.clone(),
            leverage: config.leverage,
            hedge_mode: config.hedge_mode,
            limits: config.dual.clone(),
            poll_interval: POLL_INTERVAL,
            random,
        }
    }

    /// Set up both accounts concurrently; either failure fails the whole.
    pub async fn setup_both(&mut self) -> Result<()> {
        let (symbol, leverage, hedge_mode) = (self.symbol.as_str(), self.leverage, self.hedge_mode);
        try_join(
            self.a.setup(symbol, leverage, hedge_mode),
            self.b.setup(symbol, leverage, hedge_mode),
        )
        .await?;
        Ok(())
    }

    /// Open equal and opposite legs, sized against the smaller balance.
    ///
    /// Account A's order goes first. If either order fails, both accounts are
    /// flattened before the error is returned.
    pub async fn open_opposite(&mut self) -> Result<OppositePositions> {
        let balance_a = self.a.usdt_balance().await?;
        let balance_b = self.b.usdt_balance().await?;

        let (poorer, balance) = if balance_a <= balance_b {
            (&self.a, balance_a)
        } else {
            (&self.b, balance_b)
        };
        if balance <= Decimal::ZERO {
            return Err(BotError::InsufficientBalance {
                account: poorer.label().to_string(),
                balance,
            });
        }
        info!(
            balance_a = %balance_a,
            balance_b = %balance_b,
            sizing_balance = %balance,
            "Sizing against smaller balance"
        );

        let rules = self.a.symbol_rules(&self.symbol).await?;
        let market = self.a.market_snapshot(&self.symbol).await?;
        let quantity = self
            .sizer
            .size(&rules, market.mid_price, balance, self.leverage, LegsPerAccount::One);

        let side_a = if self.random.coin_flip() {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        let side_b = side_a.opposite();

        let opened = match self.a.place_leg(&self.symbol, side_a, quantity, market.mid_price).await {
            Ok(a) => match self.b.place_leg(&self.symbol, side_b, quantity, market.mid_price).await {
                Ok(b) => Ok(OppositePositions { a, b }),
                Err(e) => Err(BotError::position_open(self.b.label(), e)),
            },
            Err(e) => Err(BotError::position_open(self.a.label(), e)),
        };

        match opened {
            Ok(positions) => {
                info!(
                    symbol = %self.symbol,
                    quantity = %quantity,
                    side_a = %side_a,
                    price_a = %positions.a.entry_price,
                    side_b = %side_b,
                    price_b = %positions.b.entry_price,
                    margin = %positions.a.initial_margin(self.leverage).round_dp(2),
                    "Opened opposite positions"
                );
                Ok(positions)
            }
            Err(e) => {
                warn!(error = %e, "Opposite open failed, closing both accounts");
                self.close_all_positions_silent().await;
                Err(e)
            }
        }
    }

    /// Poll both accounts until a stop condition fires. Always ends with a
    /// `StopReason` unless a query fails.
    ///
    /// Initial margin per leg is fixed from the opening fill.
    pub async fn monitor(&mut self, opened: &OppositePositions) -> Result<StopReason> {
        let hold_time = self.random.duration_within(self.limits.hold_time);
        let margin_a = opened.a.initial_margin(self.leverage);
        let margin_b = opened.b.initial_margin(self.leverage);
        let start = Instant::now();

        info!(hold_time_secs = hold_time.as_secs(), "Monitoring positions");

        loop {
            let positions_a = self.a.position_details(&self.symbol).await?;
            let positions_b = self.b.position_details(&self.symbol).await?;

            for (session, positions) in [(&self.a, &positions_a), (&self.b, &positions_b)] {
                if positions.is_empty() {
                    return Ok(StopReason::PositionsClosed {
                        account: session.label().to_string(),
                    });
                }
            }

            let legs = [
                (&self.a, &positions_a, &opened.a, margin_a),
                (&self.b, &positions_b, &opened.b, margin_b),
            ];
            for (session, positions, leg, margin) in legs {
                if let Some(deviation_pct) = self.breach(positions, leg, margin) {
                    warn!(
                        account = %session.label(),
                        deviation_pct = %deviation_pct.round_dp(2),
                        "Deviation limit reached"
                    );
                    return Ok(StopReason::DeviationExceeded {
                        account: session.label().to_string(),
                        deviation_pct,
                    });
                }
            }

            let combined: Decimal = positions_a
                .iter()
                .chain(&positions_b)
                .map(|p| p.unrealized_pnl)
                .sum();
            if combined > Decimal::ZERO {
                info!(pnl = %combined, "Positive combined PnL");
                return Ok(StopReason::ProfitTarget { pnl: combined });
            }

            let held = start.elapsed();
            if held >= hold_time {
                return Ok(StopReason::HoldTimeElapsed { held });
            }

            debug!(pnl = %combined, elapsed_secs = held.as_secs(), "Position check");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Deviation of the position matching `leg`, if it breaches the limit.
    fn breach(&self, positions: &[ActivePosition], leg: &PositionInfo, margin: Decimal) -> Option<Decimal> {
        positions
            .iter()
            .filter(|p| p.side == leg.side)
            .map(|p| p.deviation_pct(margin))
            .find(|d| *d >= self.limits.max_position_deviation_percent)
    }

    /// Close both accounts concurrently; either failure fails the whole.
    pub async fn close_all_positions(&self) -> Result<()> {
        try_join(self.a.close_all(&self.symbol), self.b.close_all(&self.symbol)).await?;
        Ok(())
    }

    /// Close both accounts concurrently, logging failures.
    pub async fn close_all_positions_silent(&self) {
        join(
            self.a.close_all_silent(&self.symbol),
            self.b.close_all_silent(&self.symbol),
        )
        .await;
    }
}

#[async_trait]
impl HedgeCycle for DualAccountCoordinator {
    type Opened = OppositePositions;

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn account_labels(&self) -> Vec<String> {
        vec![self.a.label().to_string(), self.b.label().to_string()]
    }

    async fn prepare(&mut self) -> Result<()> {
        self.setup_both().await
    }

    async fn sample_balances(&self) -> Result<Vec<Decimal>> {
        let (a, b) = try_join(self.a.usdt_balance(), self.b.usdt_balance()).await?;
        Ok(vec![a, b])
    }

    async fn open(&mut self) -> Result<OppositePositions> {
        self.open_opposite().await
    }

    async fn hold(&mut self, opened: &OppositePositions) -> Result<StopReason> {
        self.monitor(opened).await
    }

    async fn close(&self) -> Result<()> {
        self.close_all_positions().await
    }

    async fn close_best_effort(&self) {
        self.close_all_positions_silent().await;
    }
}
