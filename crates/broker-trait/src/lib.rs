use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trading_core::OrderSide;

// ---------------------------------------------------------------------------
// Unified broker types (broker-agnostic)
// ---------------------------------------------------------------------------

/// Account state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub currency: String,
}

/// Contract terms for one tradable instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    /// Smallest volume increment the broker accepts.
    pub lot_step: f64,
    pub min_volume: f64,
    pub max_volume: f64,
    /// Account-currency value of a one-price-unit move, per 1.0 lot.
    pub value_per_unit: f64,
}

/// Live bid/ask for an instrument.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuoteTick {
    pub bid: f64,
    pub ask: f64,
}

impl QuoteTick {
    /// The price a market order of the given side fills at.
    pub fn entry_price(&self, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }

    /// The price a position of the given side closes at.
    pub fn exit_price(&self, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => self.bid,
            OrderSide::Sell => self.ask,
        }
    }
}

/// A market order submission. Fire-once-per-call: build, submit, discard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Identifies the manager that owns the resulting position.
    pub tag: String,
    /// Free-text note carried through to the broker.
    pub comment: String,
}

/// Result codes carried on `OrderResult`. Codes below 1000 are produced
/// client-side before any broker call; the rest follow the MT-style
/// trade-server convention.
pub mod retcode {
    /// Request completed and filled.
    pub const DONE: u32 = 10009;
    /// Request rejected by the trade server.
    pub const REJECTED: u32 = 10006;
    /// Volume outside the instrument's allowed range.
    pub const INVALID_VOLUME: u32 = 10014;
    /// Stop or target level rejected.
    pub const INVALID_STOPS: u32 = 10016;
    /// Market closed for the instrument.
    pub const MARKET_CLOSED: u32 = 10018;
    /// Not enough free margin.
    pub const NO_MONEY: u32 = 10019;

    /// Client-side: requested volume is zero or negative.
    pub const VOLUME_NOT_ALLOWED: u32 = 101;
    /// Client-side: per-instance cooldown has not elapsed.
    pub const COOLDOWN_ACTIVE: u32 = 102;
}

/// Outcome of one order/modify/close request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub success: bool,
    /// Broker-assigned position ticket on success.
    pub ticket: Option<u64>,
    pub fill_price: Option<f64>,
    pub fill_volume: Option<f64>,
    pub retcode: u32,
    pub message: String,
}

impl OrderResult {
    pub fn filled(ticket: u64, price: f64, volume: f64) -> Self {
        Self {
            success: true,
            ticket: Some(ticket),
            fill_price: Some(price),
            fill_volume: Some(volume),
            retcode: retcode::DONE,
            message: "done".to_string(),
        }
    }

    pub fn done(ticket: u64) -> Self {
        Self {
            success: true,
            ticket: Some(ticket),
            fill_price: None,
            fill_volume: None,
            retcode: retcode::DONE,
            message: "done".to_string(),
        }
    }

    pub fn rejected(retcode: u32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            ticket: None,
            fill_price: None,
            fill_volume: None,
            retcode,
            message: message.into(),
        }
    }
}

/// An open position as reported by the broker. The broker owns this; the
/// execution manager only references it and mutates through modify/close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub ticket: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub open_price: f64,
    pub current_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub unrealized_pl: f64,
    pub tag: String,
    pub opened_at: DateTime<Utc>,
}

impl BrokerPosition {
    /// Profit in price units (points), signed in the trader's favor.
    pub fn profit_points(&self) -> f64 {
        (self.current_price - self.open_price) * self.side.sign()
    }
}

// ---------------------------------------------------------------------------
// Broker trait
// ---------------------------------------------------------------------------

/// Broker execution interface. Calls are synchronous request/reply with
/// bounded latency; a transport timeout surfaces as `Err`, a business
/// rejection as an unsuccessful `OrderResult`.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Current balance and equity.
    async fn account(&self) -> Result<AccountSnapshot>;

    /// All open positions.
    async fn positions(&self) -> Result<Vec<BrokerPosition>>;

    /// A specific position by ticket (None if closed or unknown).
    async fn position(&self, ticket: u64) -> Result<Option<BrokerPosition>>;

    /// Contract terms for a symbol.
    async fn instrument(&self, symbol: &str) -> Result<InstrumentSpec>;

    /// Live bid/ask for a symbol.
    async fn quote(&self, symbol: &str) -> Result<QuoteTick>;

    /// Submit a market order at current price.
    async fn open_order(&self, request: &OrderRequest) -> Result<OrderResult>;

    /// Replace a position's stop/target levels.
    async fn modify_position(
        &self,
        ticket: u64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<OrderResult>;

    /// Close a position, fully (None) or partially (Some volume).
    async fn close_position(&self, ticket: u64, volume: Option<f64>) -> Result<OrderResult>;

    /// Whether this is a paper/simulated account.
    fn is_paper(&self) -> bool;

    /// Broker name for logging.
    fn broker_name(&self) -> &str;
}
