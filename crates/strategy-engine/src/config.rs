use serde::{Deserialize, Serialize};
use trading_core::{SignalStrength, Timeframe};

/// Immutable per-strategy-instance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Percent of balance risked per trade.
    pub risk_percent: f64,
    /// Stop distance as a multiple of the volatility estimate (ATR).
    pub stop_atr_multiplier: f64,
    /// Target distance as a multiple of the volatility estimate.
    pub target_atr_multiplier: f64,
    /// Minimum confidence (0-100) for a signal to be actionable.
    pub min_confidence: f64,
    pub min_strength: SignalStrength,
    /// Discard entries that disagree with the reference trend.
    pub require_trend_alignment: bool,
    /// Period of the reference moving average used for trend direction.
    pub trend_period: usize,
    pub atr_period: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            timeframe: Timeframe::Minute15,
            risk_percent: 1.0,
            stop_atr_multiplier: 1.5,
            target_atr_multiplier: 3.0,
            min_confidence: 60.0,
            min_strength: SignalStrength::Moderate,
            require_trend_alignment: true,
            trend_period: 50,
            atr_period: 14,
        }
    }
}
