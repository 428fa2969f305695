//! Cumulative cycle statistics.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

/// Running totals for one engine run. Mutated only when a cycle fully settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    /// Number of fully settled cycles
    pub cycles_completed: u32,

    /// Sum of all cycle PnLs in USDT
    pub total_pnl: Decimal,

    /// Cumulative PnL per account, in account order
    pub per_account_pnl: Vec<Decimal>,

    /// Account labels for display, same order as `per_account_pnl`
    pub account_labels: Vec<String>,
}

impl CycleStats {
    pub fn new(account_labels: Vec<String>) -> Self {
        Self {
            cycles_completed: 0,
            total_pnl: Decimal::ZERO,
            per_account_pnl: vec![Decimal::ZERO; account_labels.len()],
            account_labels,
        }
    }

    /// Fold one settled cycle's per-account balance deltas into the totals and
    /// return the cycle PnL.
    pub fn record(&mut self, deltas: &[Decimal]) -> Decimal {
        let cycle_pnl: Decimal = deltas.iter().copied().sum();

        for (total, delta) in self.per_account_pnl.iter_mut().zip(deltas) {
            *total += *delta;
        }
        self.total_pnl += cycle_pnl;
        self.cycles_completed += 1;

        cycle_pnl
    }

    /// True once the absolute running PnL has reached `max_loss`.
    pub fn loss_cap_reached(&self, max_loss: Decimal) -> bool {
        self.total_pnl.abs() >= max_loss
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Cycle Statistics ===")?;
        writeln!(f, "Cycles:          {}", self.cycles_completed)?;
        if self.per_account_pnl.len() > 1 {
            for (label, pnl) in self.account_labels.iter().zip(&self.per_account_pnl) {
                writeln!(f, "{:<16} {:.4} USDT", format!("{} PnL:", label), pnl)?;
            }
        }
        writeln!(f, "Total PnL:       {:.4} USDT", self.total_pnl)?;
        Ok(())
    }
}
