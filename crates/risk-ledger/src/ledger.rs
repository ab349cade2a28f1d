use std::sync::Mutex;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use broker_trait::InstrumentSpec;

use crate::models::*;

/// Fraction of a profile limit at which `can_trade` already rejects.
/// Deliberate early-warning headroom: the account is stopped before the
/// firm's hard limit is touched, not at it.
const LIMIT_HEADROOM: f64 = 0.9;

/// UTC hour on Friday after which new risk counts as weekend exposure.
const WEEKEND_CUTOFF_HOUR: u32 = 20;

/// Account-level risk gate and position sizer. One ledger instance per
/// account; strategy instances sharing the account must share the ledger,
/// which serializes its read-modify-write through an internal lock.
pub struct RiskLedger {
    profile: RiskProfile,
    state: Mutex<RiskState>,
}

impl RiskLedger {
    pub fn new(profile: RiskProfile, starting_equity: f64) -> Result<Self, RiskError> {
        profile.validate()?;
        if starting_equity <= 0.0 {
            return Err(RiskError::InvalidEquity(starting_equity));
        }
        tracing::info!(
            profile = %profile.name,
            daily_loss_limit = profile.max_daily_loss_percent,
            drawdown_limit = profile.max_total_drawdown_percent,
            max_positions = profile.max_open_positions,
            "Risk ledger initialized"
        );
        Ok(Self {
            profile,
            state: Mutex::new(RiskState::new(starting_equity)),
        })
    }

    pub fn profile(&self) -> &RiskProfile {
        &self.profile
    }

    pub fn allows_news_trading(&self) -> bool {
        self.profile.allow_news_trading
    }

    /// Snapshot of the current risk state, for reporting and tests.
    pub fn state(&self) -> RiskState {
        self.state.lock().expect("risk state lock").clone()
    }

    /// Reset day-start figures and the daily trade counters when the
    /// trading day changes. Idempotent within the same day.
    pub fn rollover_if_new_day(&self, today: NaiveDate, balance: f64, equity: f64) {
        let mut state = self.state.lock().expect("risk state lock");
        if state.day == Some(today) {
            return;
        }
        tracing::info!(
            day = %today,
            balance,
            equity,
            "Trading day rollover, resetting day counters"
        );
        state.day = Some(today);
        state.day_start_balance = balance;
        state.day_start_equity = equity;
        state.trades_opened_today = 0;
        state.trades_closed_today = 0;
        state.realized_pnl_today = 0.0;
    }

    /// Gate a prospective trading action against the profile limits.
    ///
    /// Checks run in order and short-circuit on the first failure:
    /// daily loss, drawdown from high-water-mark, concurrent position
    /// count, weekend proximity. Rejection is an expected outcome, never
    /// an error.
    pub fn can_trade(
        &self,
        balance: f64,
        equity: f64,
        open_positions: usize,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let mut state = self.state.lock().expect("risk state lock");

        // (a) Daily loss, measured against the day-start balance.
        if state.day_start_balance > 0.0 {
            let loss_percent =
                (state.day_start_balance - balance) / state.day_start_balance * 100.0;
            let threshold = LIMIT_HEADROOM * self.profile.max_daily_loss_percent;
            if loss_percent >= threshold {
                return RiskDecision::reject(RiskBreach {
                    kind: BreachKind::DailyLossApproaching,
                    current: loss_percent,
                    limit: self.profile.max_daily_loss_percent,
                    description: format!(
                        "daily loss limit approaching: down {:.2}% of {:.2}% allowed",
                        loss_percent, self.profile.max_daily_loss_percent
                    ),
                });
            }
        }

        // (b) Drawdown from the high-water-mark. The mark ratchets up
        // first, and drawdown is always recomputed from live equity
        // rather than accumulated deltas.
        if equity > state.high_water_mark {
            state.high_water_mark = equity;
        }
        if state.high_water_mark > 0.0 {
            let drawdown_percent =
                (state.high_water_mark - equity) / state.high_water_mark * 100.0;
            if drawdown_percent > state.max_drawdown_percent {
                state.max_drawdown_percent = drawdown_percent;
            }
            let threshold = LIMIT_HEADROOM * self.profile.max_total_drawdown_percent;
            if drawdown_percent >= threshold {
                return RiskDecision::reject(RiskBreach {
                    kind: BreachKind::DrawdownApproaching,
                    current: drawdown_percent,
                    limit: self.profile.max_total_drawdown_percent,
                    description: format!(
                        "drawdown limit approaching: {:.2}% of {:.2}% allowed",
                        drawdown_percent, self.profile.max_total_drawdown_percent
                    ),
                });
            }
        }

        // (c) Concurrent position count.
        if open_positions >= self.profile.max_open_positions {
            return RiskDecision::reject(RiskBreach {
                kind: BreachKind::PositionLimit,
                current: open_positions as f64,
                limit: self.profile.max_open_positions as f64,
                description: format!(
                    "max concurrent positions reached: {} of {}",
                    open_positions, self.profile.max_open_positions
                ),
            });
        }

        // (d) No new risk into the weekend when the profile forbids
        // holding over it.
        if !self.profile.allow_weekend_holding && near_weekend_close(now) {
            return RiskDecision::reject(RiskBreach {
                kind: BreachKind::WeekendHolding,
                current: now.hour() as f64,
                limit: WEEKEND_CUTOFF_HOUR as f64,
                description: "weekend holding not permitted: market close approaching"
                    .to_string(),
            });
        }

        RiskDecision::approve()
    }

    /// Volume for a trade risking `risk_percent` of `balance` over
    /// `stop_distance` price units, floored to the instrument's lot step
    /// and clamped to its volume range.
    ///
    /// A non-positive stop distance returns the minimum tradable volume
    /// rather than failing; callers should treat that as a cue to
    /// re-check their stop calculation.
    pub fn size_position(
        &self,
        stop_distance: f64,
        risk_percent: f64,
        balance: f64,
        instrument: &InstrumentSpec,
    ) -> f64 {
        if stop_distance <= 0.0 {
            tracing::warn!(
                symbol = %instrument.symbol,
                stop_distance,
                "Non-positive stop distance, sizing at minimum volume"
            );
            return instrument.min_volume;
        }

        let risk_amount = balance * risk_percent / 100.0;
        let raw = risk_amount / (stop_distance * instrument.value_per_unit);

        let raw = Decimal::from_f64(raw).unwrap_or_default();
        let step = Decimal::from_f64(instrument.lot_step).unwrap_or(Decimal::ONE);
        let min = Decimal::from_f64(instrument.min_volume).unwrap_or_default();
        let max = Decimal::from_f64(instrument.max_volume).unwrap_or_default();

        let floored = if step > Decimal::ZERO {
            (raw / step).floor() * step
        } else {
            raw
        };
        let clamped = floored.clamp(min, max);

        clamped.to_f64().unwrap_or(instrument.min_volume)
    }

    pub fn record_trade_opened(&self) {
        let mut state = self.state.lock().expect("risk state lock");
        state.trades_opened_today += 1;
        tracing::debug!(
            trades_today = state.trades_opened_today,
            "Trade opened recorded"
        );
    }

    /// Closed-trade profit feeds the day tallies here; drawdown is picked
    /// up from live equity on the next `can_trade`, so nothing drifts.
    pub fn record_trade_closed(&self, profit: f64) {
        let mut state = self.state.lock().expect("risk state lock");
        state.trades_closed_today += 1;
        state.realized_pnl_today += profit;
        tracing::debug!(
            profit,
            realized_today = state.realized_pnl_today,
            "Trade close recorded"
        );
    }
}

/// Friday evening past the cutoff, or anywhere inside the weekend.
fn near_weekend_close(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Fri => now.hour() >= WEEKEND_CUTOFF_HOUR,
        Weekday::Sat | Weekday::Sun => true,
        _ => false,
    }
}
