pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod indicators;
#[cfg(test)]
mod indicators_tests;

pub use config::StrategyConfig;
pub use engine::StrategyEngine;
pub use error::StrategyError;
pub use generator::{MaCrossoverGenerator, SignalGenerator};
pub use indicators::TrendDirection;
