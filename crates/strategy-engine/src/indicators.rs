use serde::{Deserialize, Serialize};
use trading_core::Bar;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    data.windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential Moving Average, seeded with the SMA of the first period.
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = data[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(data.len() - period + 1);
    let mut prev = seed;
    result.push(seed);
    for value in &data[period..] {
        prev = (value - prev) * multiplier + prev;
        result.push(prev);
    }
    result
}

/// Average True Range (Wilder smoothing). Needs `period + 1` bars for the
/// first value.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return vec![];
    }

    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|pair| {
            let (prev, bar) = (&pair[0], &pair[1]);
            let hl = bar.high - bar.low;
            let hc = (bar.high - prev.close).abs();
            let lc = (bar.low - prev.close).abs();
            hl.max(hc).max(lc)
        })
        .collect();

    let mut current = true_ranges[..period].iter().sum::<f64>() / period as f64;
    let mut result = Vec::with_capacity(true_ranges.len() - period + 1);
    result.push(current);
    for tr in &true_ranges[period..] {
        current = (current * (period - 1) as f64 + tr) / period as f64;
        result.push(current);
    }
    result
}

/// Market trend as seen by the reference moving average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
    /// Price exactly on the average; fails alignment for both directions.
    Neutral,
}

/// Trend from price vs. the SMA of the last `period` closes. Returns
/// `Neutral` when the history is too short to judge.
pub fn reference_trend(bars: &[Bar], period: usize, price: f64) -> TrendDirection {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let averages = sma(&closes, period);
    let Some(average) = averages.last() else {
        return TrendDirection::Neutral;
    };

    if price > *average {
        TrendDirection::Bullish
    } else if price < *average {
        TrendDirection::Bearish
    } else {
        TrendDirection::Neutral
    }
}
