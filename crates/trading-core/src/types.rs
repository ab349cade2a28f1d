use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Timeframe an engine evaluates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    Minute1,
    Minute5,
    Minute15,
    Minute30,
    Hour1,
    Hour4,
    Day1,
}

impl Timeframe {
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 1,
            Timeframe::Minute5 => 5,
            Timeframe::Minute15 => 15,
            Timeframe::Minute30 => 30,
            Timeframe::Hour1 => 60,
            Timeframe::Hour4 => 240,
            Timeframe::Day1 => 1440,
        }
    }

    /// Parse from the config strings used in the environment ("15min", "1hour", ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1min" => Some(Timeframe::Minute1),
            "5min" => Some(Timeframe::Minute5),
            "15min" => Some(Timeframe::Minute15),
            "30min" => Some(Timeframe::Minute30),
            "1hour" => Some(Timeframe::Hour1),
            "4hour" => Some(Timeframe::Hour4),
            "daily" => Some(Timeframe::Day1),
            _ => None,
        }
    }
}

/// Current market state handed to the strategy engine on each update:
/// the latest completed bar plus live bid/ask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub bar: Bar,
}

impl MarketSnapshot {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

/// Side of a broker order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for long exposure, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// Directional intent of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    None,
    Buy,
    Sell,
    CloseBuy,
    CloseSell,
}

impl Direction {
    /// True for directions that open new risk
    pub fn is_entry(&self) -> bool {
        matches!(self, Direction::Buy | Direction::Sell)
    }

    /// True for directions that reduce existing risk
    pub fn is_exit(&self) -> bool {
        matches!(self, Direction::CloseBuy | Direction::CloseSell)
    }

    /// The order side an entry maps to, or the side being closed for an exit
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Direction::Buy => Some(OrderSide::Buy),
            Direction::Sell => Some(OrderSide::Sell),
            Direction::CloseBuy => Some(OrderSide::Buy),
            Direction::CloseSell => Some(OrderSide::Sell),
            Direction::None => None,
        }
    }
}

/// Signal strength. Variants are ordered, so comparison is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

impl SignalStrength {
    /// Convert to numeric score (0 to 100)
    pub fn score(&self) -> i32 {
        match self {
            SignalStrength::Weak => 30,
            SignalStrength::Moderate => 60,
            SignalStrength::Strong => 100,
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            SignalStrength::Weak => "Weak",
            SignalStrength::Moderate => "Moderate",
            SignalStrength::Strong => "Strong",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "weak" => Some(SignalStrength::Weak),
            "moderate" => Some(SignalStrength::Moderate),
            "strong" => Some(SignalStrength::Strong),
            _ => None,
        }
    }
}

/// A directional trading signal. Created fresh on every evaluation cycle
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub strength: SignalStrength,
    /// 0.0 to 100.0
    pub confidence: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub rationale: String,
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    /// The "no signal" value a rejected or empty evaluation collapses to.
    pub fn none(at: DateTime<Utc>) -> Self {
        Self {
            direction: Direction::None,
            strength: SignalStrength::Weak,
            confidence: 0.0,
            stop_loss: None,
            take_profit: None,
            rationale: String::new(),
            generated_at: at,
        }
    }

    /// A signal is actionable only if it has a direction and clears both
    /// configured minimums.
    pub fn is_actionable(&self, min_confidence: f64, min_strength: SignalStrength) -> bool {
        self.direction != Direction::None
            && self.confidence >= min_confidence
            && self.strength >= min_strength
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_is_ordinal() {
        assert!(SignalStrength::Strong > SignalStrength::Moderate);
        assert!(SignalStrength::Moderate > SignalStrength::Weak);
    }

    #[test]
    fn signal_below_min_confidence_is_never_actionable() {
        let mut sig = Signal::none(Utc::now());
        sig.direction = Direction::Buy;
        sig.strength = SignalStrength::Strong;
        sig.confidence = 69.0; // min - 1
        assert!(!sig.is_actionable(70.0, SignalStrength::Weak));

        sig.direction = Direction::Sell;
        assert!(!sig.is_actionable(70.0, SignalStrength::Weak));
    }

    #[test]
    fn no_signal_is_never_actionable() {
        let mut sig = Signal::none(Utc::now());
        sig.confidence = 100.0;
        sig.strength = SignalStrength::Strong;
        assert!(!sig.is_actionable(0.0, SignalStrength::Weak));
    }
}
