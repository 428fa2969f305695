//! Repeat-until-stop cycle driver shared by single- and dual-account modes.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::error::{BotError, Result};
use crate::models::CycleStats;

use super::random::RandomSource;
use super::RiskLimits;

/// Pause between closing and re-reading balances.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Why a hold phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The exchange reports no open position on this account
    PositionsClosed { account: String },

    /// Unrealized loss on one account reached the deviation limit
    DeviationExceeded { account: String, deviation_pct: Decimal },

    /// Combined unrealized PnL turned positive
    ProfitTarget { pnl: Decimal },

    /// Drawn hold time elapsed
    HoldTimeElapsed { held: Duration },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::PositionsClosed { account } => write!(f, "positions closed on {}", account),
            StopReason::DeviationExceeded {
                account,
                deviation_pct,
            } => write!(f, "{} deviation {:.2}%", account, deviation_pct),
            StopReason::ProfitTarget { pnl } => write!(f, "positive PnL {:.4} USDT", pnl),
            StopReason::HoldTimeElapsed { held } => write!(f, "hold time reached ({}s)", held.as_secs()),
        }
    }
}

/// One open/hold/close iteration over one or more accounts.
#[async_trait]
pub trait HedgeCycle: Send {
    /// What `open` hands to `hold`
    type Opened: Send + Sync;

    fn symbol(&self) -> &str;

    /// Labels in the order `sample_balances` reports them.
    fn account_labels(&self) -> Vec<String>;

    /// One-time account setup before the first cycle.
    async fn prepare(&mut self) -> Result<()>;

    /// Available USDT per account.
    async fn sample_balances(&self) -> Result<Vec<Decimal>>;

    async fn open(&mut self) -> Result<Self::Opened>;

    /// Wait until a stop condition fires.
    async fn hold(&mut self, opened: &Self::Opened) -> Result<StopReason>;

    async fn close(&self) -> Result<()>;

    /// Close everything, logging instead of returning failures.
    async fn close_best_effort(&self);
}

/// How a run ended.
#[derive(Debug)]
pub enum Termination {
    LossLimitReached,
    CycleLimitReached,
    Interrupted,
    Aborted(BotError),
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::LossLimitReached => f.write_str("loss limit reached"),
            Termination::CycleLimitReached => f.write_str("cycle limit reached"),
            Termination::Interrupted => f.write_str("interrupted"),
            Termination::Aborted(e) => write!(f, "aborted: {}", e),
        }
    }
}

/// Final statistics and the reason the engine stopped.
#[derive(Debug)]
pub struct RunReport {
    pub stats: CycleStats,
    pub termination: Termination,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stopped: {}", self.termination)?;
        write!(f, "{}", self.stats)
    }
}

/// Drives a `HedgeCycle` until the loss cap, an optional cycle cap, an error,
/// or shutdown.
pub struct CycleEngine<C: HedgeCycle> {
    cycle: C,
    limits: RiskLimits,
    random: Box<dyn RandomSource>,
    stats: CycleStats,
    settle_delay: Duration,
    max_cycles: Option<u32>,
}

impl<C: HedgeCycle> CycleEngine<C> {
    pub fn new(cycle: C, limits: RiskLimits, random: Box<dyn RandomSource>) -> Self {
        let stats = CycleStats::new(cycle.account_labels());
        Self {
            cycle,
            limits,
            random,
            stats,
            settle_delay: SETTLE_DELAY,
            max_cycles: None,
        }
    }

    /// Stop after this many settled cycles.
    pub fn with_max_cycles(mut self, max_cycles: u32) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Run until a terminal state. `shutdown` resolving interrupts the current
    /// cycle at its next suspension point; open positions are then closed on a
    /// best-effort basis, as they are after any error.
    pub async fn run<F>(mut self, shutdown: F) -> RunReport
    where
        F: Future<Output = ()>,
    {
        info!(
            symbol = %self.cycle.symbol(),
            max_loss = %self.limits.max_loss_usdt,
            cycle_delay = %self.limits.cycle_delay,
            "Starting cycle engine"
        );

        let termination = tokio::select! {
            termination = self.drive() => termination,
            _ = shutdown => {
                warn!("Interrupted, closing positions");
                Termination::Interrupted
            }
        };

        if matches!(termination, Termination::Interrupted | Termination::Aborted(_)) {
            self.cycle.close_best_effort().await;
        }

        info!(
            cycles = self.stats.cycles_completed,
            total_pnl = %self.stats.total_pnl,
            reason = %termination,
            "Cycle engine stopped"
        );

        RunReport {
            stats: self.stats,
            termination,
        }
    }

    async fn drive(&mut self) -> Termination {
        if let Err(e) = self.cycle.prepare().await {
            error!(error = %e, "Setup failed");
            return Termination::Aborted(e);
        }

        loop {
            if let Some(termination) = self.limit_reached() {
                return termination;
            }

            if let Err(e) = self.run_cycle().await {
                error!(error = %e, "Error in trading cycle");
                return Termination::Aborted(e);
            }

            if let Some(termination) = self.limit_reached() {
                return termination;
            }

            let delay = self.random.duration_within(self.limits.cycle_delay);
            info!(delay_secs = delay.as_secs(), "Waiting before next cycle");
            tokio::time::sleep(delay).await;
        }
    }

    fn limit_reached(&self) -> Option<Termination> {
        if self.stats.loss_cap_reached(self.limits.max_loss_usdt) {
            return Some(Termination::LossLimitReached);
        }
        match self.max_cycles {
            Some(max) if self.stats.cycles_completed >= max => Some(Termination::CycleLimitReached),
            _ => None,
        }
    }

    /// One full cycle. Stats change only after balances have settled.
    async fn run_cycle(&mut self) -> Result<()> {
        let before = self.cycle.sample_balances().await?;

        let opened = self.cycle.open().await?;
        let reason = self.cycle.hold(&opened).await?;
        info!(reason = %reason, "Closing positions");

        self.cycle.close().await?;
        tokio::time::sleep(self.settle_delay).await;

        let after = self.cycle.sample_balances().await?;
        let deltas: Vec<Decimal> = after.iter().zip(&before).map(|(a, b)| a - b).collect();
        let cycle_pnl = self.stats.record(&deltas);

        info!(
            cycle = self.stats.cycles_completed,
            cycle_pnl = %cycle_pnl.round_dp(4),
            account_pnl = ?deltas,
            total_pnl = %self.stats.total_pnl.round_dp(4),
            "{}",
            if cycle_pnl < Decimal::ZERO { "Cycle loss" } else { "Cycle profit" }
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rust_decimal_macros::dec;

    use crate::trading::mock::{MockExchange, ScriptedRandom};
    use crate::trading::{
        AccountSession, DualAccountCoordinator, PositionSizer, TimeBounds, TradingConfig,
        VolumeCycle,
    };

    fn config(max_loss: Decimal) -> TradingConfig {
        let mut config = TradingConfig::default();
        config.leverage = 10;
        config.risk.max_loss_usdt = max_loss;
        config
    }

    fn volume_engine(exchange: &Arc<MockExchange>, config: &TradingConfig) -> CycleEngine<VolumeCycle> {
        let session = AccountSession::new(
            "Account 1",
            exchange.clone(),
            PositionSizer::from_config(config),
            Box::new(ScriptedRandom::new(&[])),
        );
        let cycle = VolumeCycle::new(session, config, Box::new(ScriptedRandom::new(&[])));
        CycleEngine::new(cycle, config.risk.clone(), Box::new(ScriptedRandom::new(&[])))
    }

    fn dual_engine(
        a: &Arc<MockExchange>,
        b: &Arc<MockExchange>,
        config: &TradingConfig,
    ) -> CycleEngine<DualAccountCoordinator> {
        let mut config = config.clone();
        config.dual.hold_time = TimeBounds::from_secs(30, 60);
        let sizer = PositionSizer::from_config(&config);
        let coordinator = DualAccountCoordinator::new(
            AccountSession::new("Account 1", a.clone(), sizer.clone(), Box::new(ScriptedRandom::new(&[]))),
            AccountSession::new("Account 2", b.clone(), sizer, Box::new(ScriptedRandom::new(&[]))),
            &config,
            Box::new(ScriptedRandom::new(&[])),
        );
        CycleEngine::new(coordinator, config.risk.clone(), Box::new(ScriptedRandom::new(&[])))
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_at_loss_cap() {
        // 4 orders per cycle at 2.5 each: -10 per cycle
        let exchange = Arc::new(MockExchange::new().with(|s| s.fee_per_order = dec!(2.5)));
        let engine = volume_engine(&exchange, &config(dec!(25)));

        let report = engine.run(std::future::pending()).await;

        assert!(matches!(report.termination, Termination::LossLimitReached));
        assert_eq!(report.stats.cycles_completed, 3);
        assert_eq!(report.stats.total_pnl, dec!(-30));
        assert_eq!(exchange.state().orders.len(), 12);
        assert!(exchange.state().positions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loss_cap_reached_exactly_stops() {
        let exchange = Arc::new(MockExchange::new().with(|s| s.fee_per_order = dec!(2.5)));
        let engine = volume_engine(&exchange, &config(dec!(20)));

        let report = engine.run(std::future::pending()).await;

        assert!(matches!(report.termination, Termination::LossLimitReached));
        assert_eq!(report.stats.cycles_completed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_pair_stops_after_one_cycle() {
        let exchange = Arc::new(MockExchange::new().with(|s| s.fee_per_order = dec!(0.1)));
        let engine = volume_engine(&exchange, &config(dec!(100))).with_max_cycles(1);

        let report = engine.run(std::future::pending()).await;

        assert!(matches!(report.termination, Termination::CycleLimitReached));
        assert_eq!(report.stats.cycles_completed, 1);
        assert_eq!(report.stats.total_pnl, dec!(-0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_closes_positions() {
        let exchange = Arc::new(MockExchange::new());
        let engine = volume_engine(&exchange, &config(dec!(100)));

        // Fires during the first 10s hold
        let report = engine.run(tokio::time::sleep(Duration::from_secs(3))).await;

        assert!(matches!(report.termination, Termination::Interrupted));
        assert_eq!(report.stats.cycles_completed, 0);
        let state = exchange.state();
        assert_eq!(state.orders.len(), 4);
        assert!(state.positions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_closes_both_accounts() {
        let a = Arc::new(MockExchange::new());
        let b = Arc::new(MockExchange::new());
        let engine = dual_engine(&a, &b, &config(dec!(100)));

        // Fires during the first 30s hold
        let report = engine.run(tokio::time::sleep(Duration::from_secs(5))).await;

        assert!(matches!(report.termination, Termination::Interrupted));
        assert_eq!(report.stats.cycles_completed, 0);
        for exchange in [&a, &b] {
            let state = exchange.state();
            assert_eq!(state.orders.len(), 2);
            assert!(state.positions.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_error_aborts_after_close() {
        let exchange = Arc::new(MockExchange::new().with(|s| s.fail_order_at = Some(2)));
        let engine = volume_engine(&exchange, &config(dec!(100)));

        let report = engine.run(std::future::pending()).await;

        assert!(matches!(
            report.termination,
            Termination::Aborted(BotError::PositionOpen { .. })
        ));
        assert_eq!(report.stats.cycles_completed, 0);
        assert!(exchange.state().positions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dual_engine_accumulates_per_account() {
        let a = Arc::new(MockExchange::new().with(|s| s.fee_per_order = dec!(1)));
        let b = Arc::new(MockExchange::new().with(|s| s.fee_per_order = dec!(1)));

        let engine = dual_engine(&a, &b, &config(dec!(10)));

        let report = engine.run(std::future::pending()).await;

        assert!(matches!(report.termination, Termination::LossLimitReached));
        assert_eq!(report.stats.cycles_completed, 3);
        assert_eq!(report.stats.per_account_pnl, vec![dec!(-6), dec!(-6)]);
        assert_eq!(report.stats.total_pnl, dec!(-12));
    }

    #[test]
    fn test_report_display() {
        let mut stats = CycleStats::new(vec!["Account 1".into()]);
        stats.record(&[dec!(-1.25)]);
        let report = RunReport {
            stats,
            termination: Termination::LossLimitReached,
        };

        let text = report.to_string();
        assert!(text.contains("Stopped: loss limit reached"));
        assert!(text.contains("-1.2500"));
    }
}
