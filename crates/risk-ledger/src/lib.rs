pub mod ledger;
pub mod models;

pub use ledger::RiskLedger;
pub use models::*;
