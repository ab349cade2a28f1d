use async_trait::async_trait;

use crate::{Bar, CoreError, MarketSnapshot, Timeframe};

/// Market data collaborator: historical bars for warm-up and indicator
/// refresh, plus the current snapshot that drives each evaluation cycle.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, CoreError>;

    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, CoreError>;
}
