use thiserror::Error;
use trading_core::CoreError;

#[derive(Error, Debug)]
pub enum StrategyError {
    /// Indicator resources could not be acquired; the engine stays
    /// uninitialized.
    #[error("Initialization failed: {0}")]
    Init(String),

    #[error("Engine not initialized")]
    NotReady,

    #[error(transparent)]
    Feed(#[from] CoreError),
}
