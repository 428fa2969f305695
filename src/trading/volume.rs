//! Single-account volume cycle: one hedged pair per cycle, held until a drawn
//! close time or the first positive PnL reading.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::HedgedPair;

use super::engine::{HedgeCycle, StopReason};
use super::random::RandomSource;
use super::session::AccountSession;
use super::{TimeBounds, TradingConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct VolumeCycle {
    session: AccountSession,
    symbol: String,
    leverage: u32,
    hedge_mode: bool,
    close_time: TimeBounds,
    poll_interval: Duration,
    random: Box<dyn RandomSource>,
}

impl VolumeCycle {
    pub fn new(session: AccountSession, config: &TradingConfig, random: Box<dyn RandomSource>) -> Self {
        Self {
            session,
            symbol: config.symbol.clone(),
            leverage: config.leverage,
            hedge_mode: config.hedge_mode,
            close_time: config.close_time,
            poll_interval: POLL_INTERVAL,
            random,
        }
    }
}

#[async_trait]
impl HedgeCycle for VolumeCycle {
    type Opened = HedgedPair;

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn account_labels(&self) -> Vec<String> {
        vec![self.session.label().to_string()]
    }

    async fn prepare(&mut self) -> Result<()> {
        self.session
            .setup(&self.symbol, self.leverage, self.hedge_mode)
            .await
    }

    async fn sample_balances(&self) -> Result<Vec<Decimal>> {
        Ok(vec![self.session.usdt_balance().await?])
    }

    async fn open(&mut self) -> Result<HedgedPair> {
        self.session.open_hedged_pair(&self.symbol, self.leverage).await
    }

    async fn hold(&mut self, pair: &HedgedPair) -> Result<StopReason> {
        let close_time = self.random.duration_within(self.close_time);
        let start = Instant::now();
        info!(
            quantity = %pair.quantity,
            close_time_secs = close_time.as_secs(),
            "Holding hedged pair"
        );

        loop {
            let positions = self.session.position_details(&self.symbol).await?;
            if positions.is_empty() {
                return Ok(StopReason::PositionsClosed {
                    account: self.session.label().to_string(),
                });
            }

            let pnl: Decimal = positions.iter().map(|p| p.unrealized_pnl).sum();
            debug!(pnl = %pnl, elapsed_secs = start.elapsed().as_secs(), "Position check");
            if pnl > Decimal::ZERO {
                return Ok(StopReason::ProfitTarget { pnl });
            }

            let held = start.elapsed();
            if held >= close_time {
                return Ok(StopReason::HoldTimeElapsed { held });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn close(&self) -> Result<()> {
        self.session.close_all(&self.symbol).await.map(|_| ())
    }

    async fn close_best_effort(&self) {
        self.session.close_all_silent(&self.symbol).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use crate::models::PositionSide;
    use crate::trading::mock::{MockExchange, ScriptedRandom};
    use crate::trading::PositionSizer;

    async fn opened(exchange: &Arc<MockExchange>) -> (VolumeCycle, HedgedPair) {
        let config = TradingConfig {
            leverage: 10,
            close_time: TimeBounds::from_secs(10, 30),
            ..Default::default()
        };
        let session = AccountSession::new(
            "Account 1",
            exchange.clone(),
            PositionSizer::from_config(&config),
            Box::new(ScriptedRandom::new(&[])),
        );
        let mut cycle = VolumeCycle::new(session, &config, Box::new(ScriptedRandom::new(&[])));
        cycle.prepare().await.unwrap();
        let pair = cycle.open().await.unwrap();
        (cycle, pair)
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_until_close_time() {
        let exchange = Arc::new(MockExchange::new());
        let (mut cycle, pair) = opened(&exchange).await;

        let start = Instant::now();
        let reason = cycle.hold(&pair).await.unwrap();

        assert!(matches!(reason, StopReason::HoldTimeElapsed { .. }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_positive_pnl_exits_early() {
        let exchange = Arc::new(MockExchange::new());
        let (mut cycle, pair) = opened(&exchange).await;
        exchange.with_state(|s| {
            s.pnl_by_side.insert(PositionSide::Long, dec!(0.8));
            s.pnl_by_side.insert(PositionSide::Short, dec!(-0.3));
        });

        let reason = cycle.hold(&pair).await.unwrap();
        assert_eq!(reason, StopReason::ProfitTarget { pnl: dec!(0.5) });
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flattens_pair() {
        let exchange = Arc::new(MockExchange::new());
        let (cycle, _) = opened(&exchange).await;

        cycle.close().await.unwrap();

        let state = exchange.state();
        assert!(state.positions.is_empty());
        assert_eq!(state.orders.len(), 4);
    }
}
