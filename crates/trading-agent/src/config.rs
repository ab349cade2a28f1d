use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

use risk_ledger::{FirmPreset, RiskProfile};
use trading_core::{SignalStrength, Timeframe};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    // Instrument
    pub symbol: String,
    pub timeframe: Timeframe,
    pub lot_step: f64,
    pub min_volume: f64,
    pub max_volume: f64,
    pub value_per_unit: f64,

    // Risk profile
    pub firm_preset: String,               // "ftmo", "fundednext", "the5ers" or "custom"
    pub max_daily_loss_percent: f64,       // custom profile only
    pub max_total_drawdown_percent: f64,   // custom profile only
    pub max_open_positions: usize,         // custom profile only
    pub allow_weekend_holding: bool,       // custom profile only
    pub allow_news_trading: bool,          // custom profile only
    pub risk_percent: f64,                 // % of balance risked per trade
    pub starting_balance: f64,

    // Strategy
    pub min_confidence: f64,               // 0-100
    pub min_strength: SignalStrength,
    pub require_trend_alignment: bool,
    pub trend_period: usize,
    pub atr_period: usize,
    pub stop_atr_multiplier: f64,
    pub target_atr_multiplier: f64,
    pub fast_ma_period: usize,
    pub slow_ma_period: usize,

    // Execution
    pub trading_enabled: bool,             // false: evaluate and manage only, never open
    pub cycle_interval_seconds: u64,
    pub cooldown_seconds: i64,
    pub position_tag: String,
    pub enable_breakeven: bool,
    pub breakeven_trigger: f64,            // profit in price units before stop moves to entry
    pub enable_trailing: bool,
    pub trail_distance: f64,               // trailing stop distance in price units

    // Simulated market
    pub sim_spread: f64,
    pub sim_volatility: f64,
    pub sim_seed: u64,

    // Notifications
    pub webhook_url: String,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let timeframe_raw = env::var("TIMEFRAME").unwrap_or_else(|_| "15min".to_string());
        let strength_raw = env::var("MIN_STRENGTH").unwrap_or_else(|_| "moderate".to_string());

        let config = Self {
            symbol: env::var("SYMBOL").unwrap_or_else(|_| "EURUSD".to_string()),
            timeframe: Timeframe::parse(&timeframe_raw)
                .ok_or_else(|| anyhow!("Unknown TIMEFRAME: {}", timeframe_raw))?,
            lot_step: env::var("LOT_STEP")
                .unwrap_or_else(|_| "0.01".to_string())
                .parse()?,
            min_volume: env::var("MIN_VOLUME")
                .unwrap_or_else(|_| "0.01".to_string())
                .parse()?,
            max_volume: env::var("MAX_VOLUME")
                .unwrap_or_else(|_| "100.0".to_string())
                .parse()?,
            value_per_unit: env::var("VALUE_PER_UNIT")
                .unwrap_or_else(|_| "100000.0".to_string())
                .parse()?,

            firm_preset: env::var("FIRM_PRESET").unwrap_or_else(|_| "ftmo".to_string()),
            max_daily_loss_percent: env::var("MAX_DAILY_LOSS")
                .unwrap_or_else(|_| "5.0".to_string())
                .parse()?,
            max_total_drawdown_percent: env::var("MAX_DRAWDOWN")
                .unwrap_or_else(|_| "10.0".to_string())
                .parse()?,
            max_open_positions: env::var("MAX_OPEN_POSITIONS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
            allow_weekend_holding: env::var("ALLOW_WEEKEND_HOLDING")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            allow_news_trading: env::var("ALLOW_NEWS_TRADING")
                .unwrap_or_else(|_| "false".to_string())
                .parse()?,
            risk_percent: env::var("RISK_PER_TRADE")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()?,
            starting_balance: env::var("STARTING_BALANCE")
                .unwrap_or_else(|_| "100000.0".to_string())
                .parse()?,

            min_confidence: env::var("MIN_CONFIDENCE")
                .unwrap_or_else(|_| "60.0".to_string())
                .parse()?,
            min_strength: SignalStrength::parse(&strength_raw)
                .ok_or_else(|| anyhow!("Unknown MIN_STRENGTH: {}", strength_raw))?,
            require_trend_alignment: env::var("REQUIRE_TREND_ALIGNMENT")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            trend_period: env::var("TREND_PERIOD")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            atr_period: env::var("ATR_PERIOD")
                .unwrap_or_else(|_| "14".to_string())
                .parse()?,
            stop_atr_multiplier: env::var("STOP_ATR_MULT")
                .unwrap_or_else(|_| "1.5".to_string())
                .parse()?,
            target_atr_multiplier: env::var("TARGET_ATR_MULT")
                .unwrap_or_else(|_| "3.0".to_string())
                .parse()?,
            fast_ma_period: env::var("FAST_MA_PERIOD")
                .unwrap_or_else(|_| "9".to_string())
                .parse()?,
            slow_ma_period: env::var("SLOW_MA_PERIOD")
                .unwrap_or_else(|_| "21".to_string())
                .parse()?,

            trading_enabled: env::var("TRADING_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            cycle_interval_seconds: env::var("CYCLE_INTERVAL")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            cooldown_seconds: env::var("TRADE_COOLDOWN")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            position_tag: env::var("POSITION_TAG").unwrap_or_else(|_| "prop-pilot".to_string()),
            enable_breakeven: env::var("ENABLE_BREAKEVEN")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            breakeven_trigger: env::var("BREAKEVEN_TRIGGER")
                .unwrap_or_else(|_| "0.0015".to_string())
                .parse()?,
            enable_trailing: env::var("ENABLE_TRAILING")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            trail_distance: env::var("TRAIL_DISTANCE")
                .unwrap_or_else(|_| "0.0025".to_string())
                .parse()?,

            sim_spread: env::var("SIM_SPREAD")
                .unwrap_or_else(|_| "0.0002".to_string())
                .parse()?,
            sim_volatility: env::var("SIM_VOLATILITY")
                .unwrap_or_else(|_| "0.0008".to_string())
                .parse()?,
            sim_seed: env::var("SIM_SEED")
                .unwrap_or_else(|_| "42".to_string())
                .parse()?,

            webhook_url: env::var("WEBHOOK_URL").unwrap_or_else(|_| String::new()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Resolve the configured firm preset, or build a custom profile from
    /// the individual limit variables when `FIRM_PRESET=custom`.
    pub fn risk_profile(&self) -> Result<RiskProfile> {
        if self.firm_preset.eq_ignore_ascii_case("custom") {
            return Ok(RiskProfile::custom(
                self.max_daily_loss_percent,
                self.max_total_drawdown_percent,
                self.max_open_positions,
                self.allow_weekend_holding,
                self.allow_news_trading,
            ));
        }
        FirmPreset::parse(&self.firm_preset)
            .map(|preset| preset.profile())
            .ok_or_else(|| anyhow!("Unknown FIRM_PRESET: {}", self.firm_preset))
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.risk_percent) || self.risk_percent == 0.0 {
            return Err(anyhow!(
                "RISK_PER_TRADE must be in (0, 100], got {}",
                self.risk_percent
            ));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(anyhow!(
                "MIN_CONFIDENCE must be in [0, 100], got {}",
                self.min_confidence
            ));
        }
        if self.starting_balance <= 0.0 {
            return Err(anyhow!(
                "STARTING_BALANCE must be positive, got {}",
                self.starting_balance
            ));
        }
        if self.cycle_interval_seconds == 0 {
            return Err(anyhow!("CYCLE_INTERVAL must be positive"));
        }
        if self.fast_ma_period >= self.slow_ma_period {
            return Err(anyhow!(
                "FAST_MA_PERIOD ({}) must be shorter than SLOW_MA_PERIOD ({})",
                self.fast_ma_period,
                self.slow_ma_period
            ));
        }
        Ok(())
    }
}
