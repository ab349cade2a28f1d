use chrono::Utc;
use trading_core::Bar;

use crate::indicators::*;

fn bar(high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: Utc::now(),
        open: close,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

#[test]
fn sma_basic() {
    let data = [1.0, 2.0, 3.0, 4.0, 5.0];
    let result = sma(&data, 3);
    assert_eq!(result, vec![2.0, 3.0, 4.0]);
}

#[test]
fn sma_short_input_is_empty() {
    assert!(sma(&[1.0, 2.0], 3).is_empty());
    assert!(sma(&[1.0, 2.0, 3.0], 0).is_empty());
}

#[test]
fn ema_seeds_with_sma() {
    let data = [2.0, 4.0, 6.0, 8.0];
    let result = ema(&data, 3);
    // Seed = (2+4+6)/3 = 4; next = (8-4)*0.5 + 4 = 6
    assert_eq!(result[0], 4.0);
    assert_eq!(result[1], 6.0);
}

#[test]
fn atr_flat_market_is_range() {
    // Identical bars: true range = high - low throughout
    let bars: Vec<Bar> = (0..20).map(|_| bar(1.10, 1.00, 1.05)).collect();
    let result = atr(&bars, 14);
    assert!(!result.is_empty());
    for value in result {
        assert!((value - 0.10).abs() < 1e-9);
    }
}

#[test]
fn atr_needs_period_plus_one_bars() {
    let bars: Vec<Bar> = (0..14).map(|_| bar(1.10, 1.00, 1.05)).collect();
    assert!(atr(&bars, 14).is_empty());
}

#[test]
fn trend_follows_price_vs_average() {
    let bars: Vec<Bar> = (0..10).map(|_| bar(1.10, 1.00, 1.05)).collect();
    assert_eq!(reference_trend(&bars, 5, 1.10), TrendDirection::Bullish);
    assert_eq!(reference_trend(&bars, 5, 1.00), TrendDirection::Bearish);
    // Tie is neutral
    assert_eq!(reference_trend(&bars, 5, 1.05), TrendDirection::Neutral);
    // Too little history is neutral
    assert_eq!(reference_trend(&bars[..3], 5, 2.0), TrendDirection::Neutral);
}
