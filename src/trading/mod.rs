//! Trading logic: sizing, account sessions, dual-account coordination and the
//! cycle engine.

mod config;
mod dual;
mod engine;
mod position_sizer;
mod random;
mod session;
mod volume;

#[cfg(test)]
mod mock;

pub use config::{DualLimits, RiskLimits, TimeBounds, TradingConfig, TradingMode};
pub use dual::DualAccountCoordinator;
pub use engine::{CycleEngine, Termination};
pub use position_sizer::PositionSizer;
pub use random::ThreadRandom;
pub use session::AccountSession;
pub use volume::VolumeCycle;
