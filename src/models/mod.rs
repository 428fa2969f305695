//! Data models for symbol rules, market snapshots, positions, and cycle stats.

mod market;
mod position;
mod stats;

pub use market::{MarketSnapshot, SymbolTradingRules};
pub use position::{ActivePosition, HedgedPair, OrderSide, PositionInfo, PositionSide};
pub use stats::CycleStats;
