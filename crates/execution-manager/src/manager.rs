use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use broker_trait::{retcode, BrokerClient, BrokerPosition, OrderRequest, OrderResult};
use notification_service::{Alert, AlertType, NotificationService};
use trading_core::OrderSide;

use crate::stats::PerformanceStats;

/// Outcome of a protective-stop adjustment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModifyOutcome {
    /// A new stop level was submitted to the broker.
    Applied { new_stop: f64 },
    /// The adjustment would not improve protection (or the position is
    /// gone), so nothing was sent.
    Unchanged,
}

/// Owns order submission and position maintenance for one strategy
/// instance. Positions it opens carry its tag; maintenance operations only
/// ever touch tagged positions and only ever tighten protection.
pub struct ExecutionManager {
    broker: Arc<dyn BrokerClient>,
    notifications: Arc<NotificationService>,
    tag: String,
    cooldown: Duration,
    last_trade_at: Mutex<Option<DateTime<Utc>>>,
    stats: Mutex<PerformanceStats>,
}

impl ExecutionManager {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        notifications: Arc<NotificationService>,
        tag: impl Into<String>,
        cooldown_secs: i64,
    ) -> Self {
        Self {
            broker,
            notifications,
            tag: tag.into(),
            cooldown: Duration::seconds(cooldown_secs.max(0)),
            last_trade_at: Mutex::new(None),
            stats: Mutex::new(PerformanceStats::default()),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        let last = self.last_trade_at.lock().expect("cooldown lock");
        match *last {
            Some(at) => now - at < self.cooldown,
            None => false,
        }
    }

    /// Submit a market order. Zero/negative volume and cooldown violations
    /// are rejected locally without touching the broker; broker rejections
    /// come back as unsuccessful results, not errors.
    pub async fn execute(&self, mut request: OrderRequest) -> Result<OrderResult> {
        request.tag = self.tag.clone();

        if request.volume <= 0.0 {
            tracing::warn!(symbol = %request.symbol, volume = request.volume, "Order volume not allowed");
            return Ok(OrderResult::rejected(
                retcode::VOLUME_NOT_ALLOWED,
                format!("volume {} not allowed", request.volume),
            ));
        }

        let now = Utc::now();
        if self.in_cooldown(now) {
            tracing::info!(symbol = %request.symbol, "Order suppressed by cooldown");
            return Ok(OrderResult::rejected(
                retcode::COOLDOWN_ACTIVE,
                "cooldown between trades has not elapsed",
            ));
        }

        let result = self.broker.open_order(&request).await?;

        if result.success {
            *self.last_trade_at.lock().expect("cooldown lock") = Some(now);
            tracing::info!(
                symbol = %request.symbol,
                side = ?request.side,
                volume = request.volume,
                ticket = result.ticket,
                fill_price = result.fill_price,
                "Order filled"
            );
            self.notifications.send_alert(Alert::new(
                AlertType::TradeExecuted {
                    symbol: request.symbol.clone(),
                    direction: match request.side {
                        OrderSide::Buy => "buy".to_string(),
                        OrderSide::Sell => "sell".to_string(),
                    },
                    volume: request.volume,
                    price: result.fill_price.unwrap_or(0.0),
                },
                format!("Trade executed: {}", request.symbol),
                result.message.clone(),
            ));
        } else {
            tracing::warn!(
                symbol = %request.symbol,
                retcode = result.retcode,
                message = %result.message,
                "Order rejected by broker"
            );
            self.notifications.send_alert(Alert::new(
                AlertType::TradeRejected {
                    symbol: request.symbol.clone(),
                    reason: result.message.clone(),
                },
                format!("Trade rejected: {}", request.symbol),
                result.message.clone(),
            ));
        }

        Ok(result)
    }

    /// Replace a position's stop/target outright. Unlike the trailing
    /// helpers this does not enforce improvement; it is the strategy's own
    /// levels being (re)applied.
    pub async fn modify_stops(
        &self,
        ticket: u64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<OrderResult> {
        self.broker
            .modify_position(ticket, stop_loss, take_profit)
            .await
    }

    /// Move the stop to the open price once the position has earned at
    /// least `min_profit_points` in its favor. Never loosens an existing
    /// stop.
    pub async fn move_to_breakeven(
        &self,
        ticket: u64,
        min_profit_points: f64,
    ) -> Result<ModifyOutcome> {
        let Some(position) = self.owned_position(ticket).await? else {
            return Ok(ModifyOutcome::Unchanged);
        };

        if position.profit_points() < min_profit_points {
            return Ok(ModifyOutcome::Unchanged);
        }

        self.apply_if_tighter(&position, position.open_price).await
    }

    /// Trail the stop `distance` price units behind the current price.
    /// The stop only ever moves in the protective direction; a candidate
    /// that matches or loosens the current stop is dropped.
    pub async fn trail_stop(&self, ticket: u64, distance: f64) -> Result<ModifyOutcome> {
        if distance <= 0.0 {
            return Ok(ModifyOutcome::Unchanged);
        }
        let Some(position) = self.owned_position(ticket).await? else {
            return Ok(ModifyOutcome::Unchanged);
        };

        let candidate = match position.side {
            OrderSide::Buy => position.current_price - distance,
            OrderSide::Sell => position.current_price + distance,
        };
        self.apply_if_tighter(&position, candidate).await
    }

    /// Close `fraction` of a position, floored to the instrument's lot
    /// step. If the floored volume falls below the instrument minimum the
    /// close is rejected locally and nothing reaches the broker.
    pub async fn partial_close(&self, ticket: u64, fraction: f64) -> Result<OrderResult> {
        if fraction <= 0.0 || fraction > 1.0 {
            return Ok(OrderResult::rejected(
                retcode::VOLUME_NOT_ALLOWED,
                format!("close fraction {} outside (0, 1]", fraction),
            ));
        }
        let Some(position) = self.owned_position(ticket).await? else {
            return Ok(OrderResult::rejected(
                retcode::REJECTED,
                format!("position {} not found", ticket),
            ));
        };

        let spec = self.broker.instrument(&position.symbol).await?;
        let volume = floor_to_step(position.volume * fraction, spec.lot_step);
        if volume < spec.min_volume {
            tracing::info!(
                ticket,
                requested = position.volume * fraction,
                floored = volume,
                min_volume = spec.min_volume,
                "Partial close below instrument minimum, skipped"
            );
            return Ok(OrderResult::rejected(
                retcode::INVALID_VOLUME,
                format!("close volume {} below minimum {}", volume, spec.min_volume),
            ));
        }

        self.broker.close_position(ticket, Some(volume)).await
    }

    /// Close every position this manager owns, optionally narrowed to one
    /// symbol. Failures are logged per position and do not stop the sweep.
    /// Returns the tickets that actually closed, so callers can settle
    /// exactly those trades and no others.
    pub async fn close_all(&self, symbol: Option<&str>) -> Result<Vec<u64>> {
        let positions = self.broker.positions().await?;
        let mut closed = Vec::new();

        for position in positions
            .iter()
            .filter(|p| p.tag == self.tag)
            .filter(|p| symbol.map_or(true, |s| p.symbol == s))
        {
            match self.broker.close_position(position.ticket, None).await {
                Ok(result) if result.success => {
                    closed.push(position.ticket);
                    self.notifications.send_alert(Alert::new(
                        AlertType::PositionClosed {
                            symbol: position.symbol.clone(),
                            volume: position.volume,
                            pnl: position.unrealized_pl,
                        },
                        format!("Position closed: {}", position.symbol),
                        result.message.clone(),
                    ));
                }
                Ok(result) => {
                    tracing::warn!(
                        ticket = position.ticket,
                        retcode = result.retcode,
                        message = %result.message,
                        "Close rejected, continuing sweep"
                    );
                }
                Err(e) => {
                    tracing::error!(ticket = position.ticket, error = %e, "Close failed, continuing sweep");
                }
            }
        }

        Ok(closed)
    }

    /// Record the realized profit of one closed trade. Call exactly once
    /// per close.
    pub fn record_closed_trade(&self, profit: f64) {
        self.stats.lock().expect("stats lock").record(profit);
    }

    pub fn stats(&self) -> PerformanceStats {
        self.stats.lock().expect("stats lock").clone()
    }

    async fn owned_position(&self, ticket: u64) -> Result<Option<BrokerPosition>> {
        Ok(self
            .broker
            .position(ticket)
            .await?
            .filter(|p| p.tag == self.tag))
    }

    async fn apply_if_tighter(
        &self,
        position: &BrokerPosition,
        candidate: f64,
    ) -> Result<ModifyOutcome> {
        let tighter = match (position.side, position.stop_loss) {
            (OrderSide::Buy, Some(stop)) => candidate > stop,
            (OrderSide::Sell, Some(stop)) => candidate < stop,
            (_, None) => true,
        };
        if !tighter {
            return Ok(ModifyOutcome::Unchanged);
        }

        let result = self
            .broker
            .modify_position(position.ticket, Some(candidate), position.take_profit)
            .await?;
        if result.success {
            tracing::info!(
                ticket = position.ticket,
                old_stop = position.stop_loss,
                new_stop = candidate,
                "Stop tightened"
            );
            Ok(ModifyOutcome::Applied { new_stop: candidate })
        } else {
            tracing::warn!(
                ticket = position.ticket,
                retcode = result.retcode,
                message = %result.message,
                "Stop modify rejected"
            );
            Ok(ModifyOutcome::Unchanged)
        }
    }
}

/// Floor a volume to the instrument's lot step through decimal arithmetic
/// so float noise cannot produce an off-step volume.
fn floor_to_step(volume: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return volume;
    }
    let (Some(volume_d), Some(step_d)) = (Decimal::from_f64(volume), Decimal::from_f64(step))
    else {
        return volume;
    };
    let floored = (volume_d / step_d).floor() * step_d;
    floored.to_f64().unwrap_or(volume)
}
