use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}
