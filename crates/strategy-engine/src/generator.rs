use async_trait::async_trait;
use trading_core::{Bar, Direction, MarketSnapshot, Signal, SignalStrength};

use crate::config::StrategyConfig;
use crate::indicators::{sma, TrendDirection};

/// The pluggable raw-signal capability: anything that can produce a
/// `Signal` from the current snapshot and bar history can drive the
/// engine. Stops and targets are attached by the engine afterwards.
#[async_trait]
pub trait SignalGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Bars of history required before the first evaluation.
    fn warmup_bars(&self) -> usize;

    async fn generate(
        &self,
        snapshot: &MarketSnapshot,
        history: &[Bar],
        config: &StrategyConfig,
    ) -> Signal;

    /// Generators may supply their own trend reading; the engine falls
    /// back to the reference moving average when they don't.
    fn trend_hint(&self, _history: &[Bar]) -> Option<TrendDirection> {
        None
    }
}

/// Default generator: fast/slow SMA crossover. Signals only on the bar
/// where the cross happens; confidence and strength scale with the
/// separation between the averages.
pub struct MaCrossoverGenerator {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl MaCrossoverGenerator {
    pub fn new(fast_period: usize, slow_period: usize) -> Self {
        Self {
            fast_period,
            slow_period,
        }
    }
}

impl Default for MaCrossoverGenerator {
    fn default() -> Self {
        Self::new(9, 21)
    }
}

#[async_trait]
impl SignalGenerator for MaCrossoverGenerator {
    fn name(&self) -> &str {
        "ma-crossover"
    }

    fn warmup_bars(&self) -> usize {
        // One extra bar so a cross between the previous and current bar
        // is observable.
        self.slow_period + 2
    }

    async fn generate(
        &self,
        snapshot: &MarketSnapshot,
        history: &[Bar],
        _config: &StrategyConfig,
    ) -> Signal {
        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let fast = sma(&closes, self.fast_period);
        let slow = sma(&closes, self.slow_period);
        if fast.len() < 2 || slow.len() < 2 {
            return Signal::none(snapshot.time);
        }

        let (fast_prev, fast_now) = (fast[fast.len() - 2], fast[fast.len() - 1]);
        let (slow_prev, slow_now) = (slow[slow.len() - 2], slow[slow.len() - 1]);

        let crossed_up = fast_prev <= slow_prev && fast_now > slow_now;
        let crossed_down = fast_prev >= slow_prev && fast_now < slow_now;
        if !crossed_up && !crossed_down {
            return Signal::none(snapshot.time);
        }

        // Separation in basis points of the slow average
        let separation_bps = ((fast_now - slow_now).abs() / slow_now) * 10_000.0;
        let confidence = (40.0 + separation_bps * 4.0).min(95.0);
        let strength = if separation_bps >= 15.0 {
            SignalStrength::Strong
        } else if separation_bps >= 5.0 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        };

        let direction = if crossed_up {
            Direction::Buy
        } else {
            Direction::Sell
        };

        Signal {
            direction,
            strength,
            confidence,
            stop_loss: None,
            take_profit: None,
            rationale: format!(
                "SMA({}) crossed {} SMA({}) by {:.1} bps",
                self.fast_period,
                if crossed_up { "above" } else { "below" },
                self.slow_period,
                separation_bps
            ),
            generated_at: snapshot.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .map(|&close| Bar {
                timestamp: Utc::now(),
                open: close,
                high: close + 0.01,
                low: close - 0.01,
                close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "EURUSD".to_string(),
            time: Utc::now(),
            bid: 10.0,
            ask: 10.01,
            bar: bars(&[10.0]).remove(0),
        }
    }

    #[tokio::test]
    async fn cross_up_signals_buy() {
        let generator = MaCrossoverGenerator::new(3, 5);
        let history = bars(&[10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 20.0]);
        let signal = generator
            .generate(&snapshot(), &history, &StrategyConfig::default())
            .await;
        assert_eq!(signal.direction, Direction::Buy);
        assert!(signal.confidence > 0.0);
    }

    #[tokio::test]
    async fn cross_down_signals_sell() {
        let generator = MaCrossoverGenerator::new(3, 5);
        let history = bars(&[20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 10.0]);
        let signal = generator
            .generate(&snapshot(), &history, &StrategyConfig::default())
            .await;
        assert_eq!(signal.direction, Direction::Sell);
    }

    #[tokio::test]
    async fn no_cross_is_no_signal() {
        let generator = MaCrossoverGenerator::new(3, 5);
        // Flat market: averages never separate
        let history = bars(&[10.0; 12]);
        let signal = generator
            .generate(&snapshot(), &history, &StrategyConfig::default())
            .await;
        assert_eq!(signal.direction, Direction::None);

        // Fast already above slow and staying there: no new cross
        let history = bars(&[10.0, 10.0, 10.0, 10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0]);
        let signal = generator
            .generate(&snapshot(), &history, &StrategyConfig::default())
            .await;
        assert_eq!(signal.direction, Direction::None);
    }

    #[tokio::test]
    async fn short_history_is_no_signal() {
        let generator = MaCrossoverGenerator::new(3, 5);
        let signal = generator
            .generate(&snapshot(), &bars(&[10.0, 11.0]), &StrategyConfig::default())
            .await;
        assert_eq!(signal.direction, Direction::None);
    }
}
