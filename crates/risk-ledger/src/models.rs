use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Invalid risk profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid starting equity: {0}")]
    InvalidEquity(f64),
}

/// Named limit set for a funded-account program. Loaded once at
/// initialization, read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskProfile {
    pub name: String,
    pub max_daily_loss_percent: f64,
    pub max_total_drawdown_percent: f64,
    pub max_open_positions: usize,
    pub allow_weekend_holding: bool,
    pub allow_news_trading: bool,
}

impl RiskProfile {
    pub fn custom(
        max_daily_loss_percent: f64,
        max_total_drawdown_percent: f64,
        max_open_positions: usize,
        allow_weekend_holding: bool,
        allow_news_trading: bool,
    ) -> Self {
        Self {
            name: "custom".to_string(),
            max_daily_loss_percent,
            max_total_drawdown_percent,
            max_open_positions,
            allow_weekend_holding,
            allow_news_trading,
        }
    }

    /// Zero or negative limits are the only fatal misconfiguration.
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.max_daily_loss_percent <= 0.0 {
            return Err(RiskError::InvalidProfile(format!(
                "max daily loss must be positive, got {}",
                self.max_daily_loss_percent
            )));
        }
        if self.max_total_drawdown_percent <= 0.0 {
            return Err(RiskError::InvalidProfile(format!(
                "max total drawdown must be positive, got {}",
                self.max_total_drawdown_percent
            )));
        }
        if self.max_open_positions == 0 {
            return Err(RiskError::InvalidProfile(
                "max open positions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Built-in limit tables for common proprietary-funding programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirmPreset {
    Ftmo,
    FundedNext,
    The5ers,
}

impl FirmPreset {
    pub fn profile(&self) -> RiskProfile {
        match self {
            FirmPreset::Ftmo => RiskProfile {
                name: "ftmo".to_string(),
                max_daily_loss_percent: 5.0,
                max_total_drawdown_percent: 10.0,
                max_open_positions: 3,
                allow_weekend_holding: false,
                allow_news_trading: false,
            },
            FirmPreset::FundedNext => RiskProfile {
                name: "fundednext".to_string(),
                max_daily_loss_percent: 5.0,
                max_total_drawdown_percent: 10.0,
                max_open_positions: 5,
                allow_weekend_holding: true,
                allow_news_trading: false,
            },
            FirmPreset::The5ers => RiskProfile {
                name: "the5ers".to_string(),
                max_daily_loss_percent: 4.0,
                max_total_drawdown_percent: 6.0,
                max_open_positions: 3,
                allow_weekend_holding: true,
                allow_news_trading: true,
            },
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ftmo" => Some(FirmPreset::Ftmo),
            "fundednext" => Some(FirmPreset::FundedNext),
            "the5ers" => Some(FirmPreset::The5ers),
            _ => None,
        }
    }
}

/// Which limit a rejected check tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreachKind {
    DailyLossApproaching,
    DrawdownApproaching,
    PositionLimit,
    WeekendHolding,
}

/// The offending metric vs. its limit, with a human-readable description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskBreach {
    pub kind: BreachKind,
    pub current: f64,
    pub limit: f64,
    pub description: String,
}

/// Outcome of `can_trade`. An advisory gate, not an error: callers must
/// not proceed on rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskDecision {
    pub approved: bool,
    pub breach: Option<RiskBreach>,
}

impl RiskDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            breach: None,
        }
    }

    pub fn reject(breach: RiskBreach) -> Self {
        Self {
            approved: false,
            breach: Some(breach),
        }
    }

    pub fn reason(&self) -> &str {
        self.breach
            .as_ref()
            .map(|b| b.description.as_str())
            .unwrap_or("approved")
    }
}

/// Mutable account-scoped risk state. Owned exclusively by the ledger
/// behind its lock; snapshots are handed out for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    /// Trading day the day-start figures belong to.
    pub day: Option<NaiveDate>,
    pub day_start_balance: f64,
    pub day_start_equity: f64,
    pub high_water_mark: f64,
    /// Worst drawdown observed since initialization, in percent.
    pub max_drawdown_percent: f64,
    pub trades_opened_today: u32,
    pub trades_closed_today: u32,
    pub realized_pnl_today: f64,
}

impl RiskState {
    pub fn new(starting_equity: f64) -> Self {
        Self {
            day: None,
            day_start_balance: starting_equity,
            day_start_equity: starting_equity,
            high_water_mark: starting_equity,
            max_drawdown_percent: 0.0,
            trades_opened_today: 0,
            trades_closed_today: 0,
            realized_pnl_today: 0.0,
        }
    }
}
