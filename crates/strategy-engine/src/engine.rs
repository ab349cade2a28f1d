use trading_core::{Bar, Direction, MarketDataFeed, MarketSnapshot, Signal};

use crate::config::StrategyConfig;
use crate::error::StrategyError;
use crate::generator::SignalGenerator;
use crate::indicators::{atr, reference_trend, TrendDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Uninitialized,
    Ready,
}

/// Per-instrument strategy engine. Two states: `new` leaves it
/// uninitialized; `init` acquires warm-up history and makes it ready.
/// There is no path back except explicit `teardown`.
pub struct StrategyEngine {
    config: StrategyConfig,
    generator: Box<dyn SignalGenerator>,
    state: EngineState,
    history: Vec<Bar>,
    /// Latest ATR reading; refreshed on every evaluation.
    volatility: f64,
}

impl StrategyEngine {
    pub fn new(config: StrategyConfig, generator: Box<dyn SignalGenerator>) -> Self {
        Self {
            config,
            generator,
            state: EngineState::Uninitialized,
            history: Vec::new(),
            volatility: 0.0,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Latest volatility estimate (ATR), for sizing stop distances.
    pub fn volatility(&self) -> f64 {
        self.volatility
    }

    fn warmup_bars(&self) -> usize {
        self.config
            .trend_period
            .max(self.config.atr_period + 1)
            .max(self.generator.warmup_bars())
    }

    /// Acquire indicator resources. On failure the engine stays
    /// uninitialized and can be retried.
    pub async fn init(&mut self, feed: &dyn MarketDataFeed) -> Result<(), StrategyError> {
        let need = self.warmup_bars();
        let bars = feed
            .bars(&self.config.symbol, self.config.timeframe, need)
            .await
            .map_err(|e| StrategyError::Init(e.to_string()))?;
        if bars.len() < need {
            return Err(StrategyError::Init(format!(
                "need {} warm-up bars for {}, feed returned {}",
                need,
                self.config.symbol,
                bars.len()
            )));
        }

        self.history = bars;
        self.refresh_volatility();
        self.state = EngineState::Ready;
        tracing::info!(
            symbol = %self.config.symbol,
            generator = self.generator.name(),
            warmup = need,
            atr = self.volatility,
            "Strategy engine ready"
        );
        Ok(())
    }

    /// Explicit teardown back to uninitialized.
    pub fn teardown(&mut self) {
        self.state = EngineState::Uninitialized;
        self.history.clear();
        self.volatility = 0.0;
    }

    /// Evaluate one market update. Filter rejection collapses to the
    /// no-signal value; only resource failures return `Err`.
    pub async fn evaluate(&mut self, snapshot: &MarketSnapshot) -> Result<Signal, StrategyError> {
        if self.state != EngineState::Ready {
            return Err(StrategyError::NotReady);
        }

        self.push_bar(snapshot.bar.clone());
        self.refresh_volatility();

        let raw = self
            .generator
            .generate(snapshot, &self.history, &self.config)
            .await;
        if raw.direction == Direction::None {
            return Ok(Signal::none(snapshot.time));
        }

        // Filter 1: confidence
        if raw.confidence < self.config.min_confidence {
            tracing::debug!(
                symbol = %self.config.symbol,
                confidence = raw.confidence,
                min = self.config.min_confidence,
                "Signal dropped: confidence below minimum"
            );
            return Ok(Signal::none(snapshot.time));
        }

        // Filter 2: strength
        if raw.strength < self.config.min_strength {
            tracing::debug!(
                symbol = %self.config.symbol,
                strength = raw.strength.label(),
                "Signal dropped: strength below minimum"
            );
            return Ok(Signal::none(snapshot.time));
        }

        // Filter 3: trend alignment for entries. A neutral trend fails
        // both directions.
        if self.config.require_trend_alignment && raw.direction.is_entry() {
            let trend = self
                .generator
                .trend_hint(&self.history)
                .unwrap_or_else(|| {
                    reference_trend(&self.history, self.config.trend_period, snapshot.mid())
                });
            let aligned = matches!(
                (raw.direction, trend),
                (Direction::Buy, TrendDirection::Bullish)
                    | (Direction::Sell, TrendDirection::Bearish)
            );
            if !aligned {
                tracing::debug!(
                    symbol = %self.config.symbol,
                    direction = ?raw.direction,
                    trend = ?trend,
                    "Signal dropped: against trend"
                );
                return Ok(Signal::none(snapshot.time));
            }
        }

        Ok(self.attach_levels(raw, snapshot))
    }

    /// Stop/target from the volatility estimate and configured
    /// multipliers, priced at the side's entry quote.
    fn attach_levels(&self, raw: Signal, snapshot: &MarketSnapshot) -> Signal {
        if !raw.direction.is_entry() || self.volatility <= 0.0 {
            return raw;
        }

        let stop_offset = self.volatility * self.config.stop_atr_multiplier;
        let target_offset = self.volatility * self.config.target_atr_multiplier;
        let (stop, target) = match raw.direction {
            Direction::Buy => {
                let price = snapshot.ask;
                (price - stop_offset, price + target_offset)
            }
            Direction::Sell => {
                let price = snapshot.bid;
                (price + stop_offset, price - target_offset)
            }
            _ => unreachable!("entries only"),
        };

        Signal {
            stop_loss: Some(stop),
            take_profit: Some(target),
            ..raw
        }
    }

    fn push_bar(&mut self, bar: Bar) {
        self.history.push(bar);
        let cap = self.warmup_bars().max(256) * 2;
        if self.history.len() > cap {
            let excess = self.history.len() - cap;
            self.history.drain(..excess);
        }
    }

    fn refresh_volatility(&mut self) {
        if let Some(value) = atr(&self.history, self.config.atr_period).last() {
            self.volatility = *value;
        }
    }
}
