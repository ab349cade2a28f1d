pub mod manager;
pub mod stats;

pub use manager::{ExecutionManager, ModifyOutcome};
pub use stats::PerformanceStats;

#[cfg(test)]
mod tests;
