use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use broker_trait::{
    retcode, AccountSnapshot, BrokerClient, BrokerPosition, InstrumentSpec, OrderRequest,
    OrderResult, QuoteTick,
};
use trading_core::{Bar, CoreError, MarketDataFeed, MarketSnapshot, OrderSide, Timeframe};

struct SimPosition {
    ticket: u64,
    symbol: String,
    side: OrderSide,
    volume: f64,
    open_price: f64,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    tag: String,
    opened_at: DateTime<Utc>,
}

struct SimState {
    balance: f64,
    next_ticket: u64,
    instruments: HashMap<String, InstrumentSpec>,
    quotes: HashMap<String, QuoteTick>,
    bars: HashMap<String, Vec<Bar>>,
    positions: HashMap<u64, SimPosition>,
    rng: StdRng,
}

/// In-memory paper broker. Fills market orders instantly at the current
/// bid/ask, marks equity to market, and serves its own bar history as a
/// market data feed.
pub struct SimBroker {
    name: String,
    state: Mutex<SimState>,
}

impl SimBroker {
    pub fn new(name: impl Into<String>, starting_balance: f64) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SimState {
                balance: starting_balance,
                next_ticket: 1,
                instruments: HashMap::new(),
                quotes: HashMap::new(),
                bars: HashMap::new(),
                positions: HashMap::new(),
                rng: StdRng::seed_from_u64(42),
            }),
        }
    }

    /// Deterministic randomness for reproducible sessions.
    pub fn with_seed(self, seed: u64) -> Self {
        self.state.lock().expect("sim state lock").rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn add_instrument(&self, spec: InstrumentSpec, bid: f64, ask: f64) {
        let mut state = self.state.lock().expect("sim state lock");
        state.quotes.insert(spec.symbol.clone(), QuoteTick { bid, ask });
        state.bars.insert(spec.symbol.clone(), Vec::new());
        state.instruments.insert(spec.symbol.clone(), spec);
    }

    pub fn set_quote(&self, symbol: &str, bid: f64, ask: f64) {
        let mut state = self.state.lock().expect("sim state lock");
        state.quotes.insert(symbol.to_string(), QuoteTick { bid, ask });
    }

    pub fn push_bar(&self, symbol: &str, bar: Bar) {
        let mut state = self.state.lock().expect("sim state lock");
        state.bars.entry(symbol.to_string()).or_default().push(bar);
    }

    /// Seed `count` random-walk history bars ending at the current quote.
    pub fn seed_history(&self, symbol: &str, count: usize, volatility: f64) {
        let mut state = self.state.lock().expect("sim state lock");
        let Some(quote) = state.quotes.get(symbol).copied() else {
            return;
        };
        let mid = (quote.bid + quote.ask) / 2.0;

        let mut closes = Vec::with_capacity(count);
        let mut price = mid;
        // Walk backwards from the present so history ends at the quote
        for _ in 0..count {
            closes.push(price);
            let step: f64 = state.rng.gen_range(-1.0..1.0) * volatility;
            price -= step;
        }
        closes.reverse();

        let now = Utc::now();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let open = if i == 0 { *close } else { closes[i - 1] };
                Bar {
                    timestamp: now - Duration::minutes((count - i) as i64),
                    open,
                    high: open.max(*close) + volatility * 0.25,
                    low: open.min(*close) - volatility * 0.25,
                    close: *close,
                    volume: 1_000.0,
                }
            })
            .collect();
        state.bars.insert(symbol.to_string(), bars);
    }

    /// Advance the market one step: random-walk the quote and append a
    /// matching bar. Returns the new mid price.
    pub fn step(&self, symbol: &str, volatility: f64) -> Option<f64> {
        let mut state = self.state.lock().expect("sim state lock");
        let quote = state.quotes.get(symbol).copied()?;
        let spread = quote.ask - quote.bid;
        let prev_mid = (quote.bid + quote.ask) / 2.0;

        let step: f64 = state.rng.gen_range(-1.0..1.0) * volatility;
        let mid = prev_mid + step;
        state.quotes.insert(
            symbol.to_string(),
            QuoteTick {
                bid: mid - spread / 2.0,
                ask: mid + spread / 2.0,
            },
        );
        state.bars.entry(symbol.to_string()).or_default().push(Bar {
            timestamp: Utc::now(),
            open: prev_mid,
            high: prev_mid.max(mid) + volatility * 0.25,
            low: prev_mid.min(mid) - volatility * 0.25,
            close: mid,
            volume: 1_000.0,
        });
        Some(mid)
    }
}

fn on_lot_step(volume: f64, step: f64) -> bool {
    if step <= 0.0 {
        return true;
    }
    let steps = volume / step;
    (steps - steps.round()).abs() < 1e-9
}

fn unrealized(position: &SimPosition, quote: QuoteTick, spec: &InstrumentSpec) -> f64 {
    let exit = quote.exit_price(position.side);
    (exit - position.open_price) * position.side.sign() * position.volume * spec.value_per_unit
}

impl SimState {
    fn equity(&self) -> f64 {
        let open_pl: f64 = self
            .positions
            .values()
            .filter_map(|p| {
                let quote = self.quotes.get(&p.symbol)?;
                let spec = self.instruments.get(&p.symbol)?;
                Some(unrealized(p, *quote, spec))
            })
            .sum();
        self.balance + open_pl
    }

    fn broker_position(&self, position: &SimPosition) -> BrokerPosition {
        let quote = self.quotes.get(&position.symbol).copied().unwrap_or(QuoteTick {
            bid: position.open_price,
            ask: position.open_price,
        });
        let pl = self
            .instruments
            .get(&position.symbol)
            .map(|spec| unrealized(position, quote, spec))
            .unwrap_or(0.0);
        BrokerPosition {
            ticket: position.ticket,
            symbol: position.symbol.clone(),
            side: position.side,
            volume: position.volume,
            open_price: position.open_price,
            current_price: quote.exit_price(position.side),
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
            unrealized_pl: pl,
            tag: position.tag.clone(),
            opened_at: position.opened_at,
        }
    }
}

#[async_trait]
impl BrokerClient for SimBroker {
    async fn account(&self) -> Result<AccountSnapshot> {
        let state = self.state.lock().expect("sim state lock");
        Ok(AccountSnapshot {
            balance: state.balance,
            equity: state.equity(),
            currency: "USD".to_string(),
        })
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>> {
        let state = self.state.lock().expect("sim state lock");
        Ok(state
            .positions
            .values()
            .map(|p| state.broker_position(p))
            .collect())
    }

    async fn position(&self, ticket: u64) -> Result<Option<BrokerPosition>> {
        let state = self.state.lock().expect("sim state lock");
        Ok(state
            .positions
            .get(&ticket)
            .map(|p| state.broker_position(p)))
    }

    async fn instrument(&self, symbol: &str) -> Result<InstrumentSpec> {
        let state = self.state.lock().expect("sim state lock");
        state
            .instruments
            .get(symbol)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown instrument: {}", symbol))
    }

    async fn quote(&self, symbol: &str) -> Result<QuoteTick> {
        let state = self.state.lock().expect("sim state lock");
        state
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no quote for: {}", symbol))
    }

    async fn open_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let mut state = self.state.lock().expect("sim state lock");

        let Some(spec) = state.instruments.get(&request.symbol).cloned() else {
            return Ok(OrderResult::rejected(
                retcode::REJECTED,
                format!("unknown symbol {}", request.symbol),
            ));
        };
        let Some(quote) = state.quotes.get(&request.symbol).copied() else {
            return Ok(OrderResult::rejected(
                retcode::MARKET_CLOSED,
                format!("no quote for {}", request.symbol),
            ));
        };

        if request.volume < spec.min_volume
            || request.volume > spec.max_volume
            || !on_lot_step(request.volume, spec.lot_step)
        {
            return Ok(OrderResult::rejected(
                retcode::INVALID_VOLUME,
                format!(
                    "volume {} outside [{}, {}] step {}",
                    request.volume, spec.min_volume, spec.max_volume, spec.lot_step
                ),
            ));
        }

        let fill = quote.entry_price(request.side);
        let stops_valid = match request.side {
            OrderSide::Buy => {
                request.stop_loss.map_or(true, |s| s < fill)
                    && request.take_profit.map_or(true, |t| t > fill)
            }
            OrderSide::Sell => {
                request.stop_loss.map_or(true, |s| s > fill)
                    && request.take_profit.map_or(true, |t| t < fill)
            }
        };
        if !stops_valid {
            return Ok(OrderResult::rejected(
                retcode::INVALID_STOPS,
                format!("stops on wrong side of fill price {}", fill),
            ));
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.positions.insert(
            ticket,
            SimPosition {
                ticket,
                symbol: request.symbol.clone(),
                side: request.side,
                volume: request.volume,
                open_price: fill,
                stop_loss: request.stop_loss,
                take_profit: request.take_profit,
                tag: request.tag.clone(),
                opened_at: Utc::now(),
            },
        );
        tracing::debug!(
            ticket,
            symbol = %request.symbol,
            side = ?request.side,
            volume = request.volume,
            fill,
            "Sim order filled"
        );
        Ok(OrderResult::filled(ticket, fill, request.volume))
    }

    async fn modify_position(
        &self,
        ticket: u64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<OrderResult> {
        let mut state = self.state.lock().expect("sim state lock");
        let Some(position) = state.positions.get_mut(&ticket) else {
            return Ok(OrderResult::rejected(
                retcode::REJECTED,
                format!("position {} not found", ticket),
            ));
        };
        if let Some(stop) = stop_loss {
            position.stop_loss = Some(stop);
        }
        if let Some(target) = take_profit {
            position.take_profit = Some(target);
        }
        Ok(OrderResult::done(ticket))
    }

    async fn close_position(&self, ticket: u64, volume: Option<f64>) -> Result<OrderResult> {
        let mut state = self.state.lock().expect("sim state lock");
        let Some(position) = state.positions.get(&ticket) else {
            return Ok(OrderResult::rejected(
                retcode::REJECTED,
                format!("position {} not found", ticket),
            ));
        };

        let Some(spec) = state.instruments.get(&position.symbol).cloned() else {
            return Ok(OrderResult::rejected(
                retcode::REJECTED,
                format!("no instrument for {}", position.symbol),
            ));
        };
        let quote = match state.quotes.get(&position.symbol).copied() {
            Some(q) => q,
            None => {
                return Ok(OrderResult::rejected(
                    retcode::MARKET_CLOSED,
                    format!("no quote for {}", position.symbol),
                ));
            }
        };

        let close_volume = volume.unwrap_or(position.volume).min(position.volume);
        if close_volume < spec.min_volume || !on_lot_step(close_volume, spec.lot_step) {
            return Ok(OrderResult::rejected(
                retcode::INVALID_VOLUME,
                format!("close volume {} below step/minimum", close_volume),
            ));
        }

        let exit = quote.exit_price(position.side);
        let pnl = (exit - position.open_price)
            * position.side.sign()
            * close_volume
            * spec.value_per_unit;
        state.balance += pnl;

        let remaining = state
            .positions
            .get_mut(&ticket)
            .map(|p| {
                p.volume -= close_volume;
                p.volume
            })
            .unwrap_or(0.0);
        if remaining < spec.min_volume {
            state.positions.remove(&ticket);
        }

        tracing::debug!(ticket, close_volume, exit, pnl, "Sim position closed");
        Ok(OrderResult::filled(ticket, exit, close_volume))
    }

    fn is_paper(&self) -> bool {
        true
    }

    fn broker_name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl MarketDataFeed for SimBroker {
    async fn bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, CoreError> {
        let state = self.state.lock().expect("sim state lock");
        let bars = state
            .bars
            .get(symbol)
            .ok_or_else(|| CoreError::UnknownSymbol(symbol.to_string()))?;
        let start = bars.len().saturating_sub(count);
        Ok(bars[start..].to_vec())
    }

    async fn snapshot(&self, symbol: &str) -> Result<MarketSnapshot, CoreError> {
        let state = self.state.lock().expect("sim state lock");
        let quote = state
            .quotes
            .get(symbol)
            .ok_or_else(|| CoreError::UnknownSymbol(symbol.to_string()))?;
        let bar = state
            .bars
            .get(symbol)
            .and_then(|b| b.last())
            .ok_or_else(|| CoreError::InsufficientData(format!("no bars for {}", symbol)))?;
        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            time: Utc::now(),
            bid: quote.bid,
            ask: quote.ask,
            bar: bar.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eurusd() -> InstrumentSpec {
        InstrumentSpec {
            symbol: "EURUSD".to_string(),
            lot_step: 0.01,
            min_volume: 0.01,
            max_volume: 10.0,
            value_per_unit: 10.0,
        }
    }

    fn broker() -> SimBroker {
        let broker = SimBroker::new("sim", 10_000.0);
        broker.add_instrument(eurusd(), 1.0999, 1.1001);
        broker
    }

    fn buy_request(volume: f64) -> OrderRequest {
        OrderRequest {
            symbol: "EURUSD".to_string(),
            side: OrderSide::Buy,
            volume,
            stop_loss: None,
            take_profit: None,
            tag: "test".to_string(),
            comment: String::new(),
        }
    }

    #[tokio::test]
    async fn fills_buy_at_ask_and_marks_to_market() {
        let broker = broker();
        let result = broker.open_order(&buy_request(1.0)).await.unwrap();
        assert!(result.success);
        assert_eq!(result.fill_price, Some(1.1001));

        // Price rises 10 points: pnl = 0.0010 * 1 lot * 10/unit... price
        // units here are whole, so use the exit price delta directly.
        broker.set_quote("EURUSD", 1.1099, 1.1101);
        let positions = broker.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        let expected = (1.1099 - 1.1001) * 1.0 * 10.0;
        assert!((positions[0].unrealized_pl - expected).abs() < 1e-9);

        let account = broker.account().await.unwrap();
        assert!((account.equity - (10_000.0 + expected)).abs() < 1e-9);
        assert_eq!(account.balance, 10_000.0);
    }

    #[tokio::test]
    async fn rejects_bad_volume_with_code() {
        let broker = broker();
        let result = broker.open_order(&buy_request(0.005)).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.retcode, retcode::INVALID_VOLUME);

        let result = broker.open_order(&buy_request(0.015)).await.unwrap();
        assert!(!result.success, "off-step volume must reject");
    }

    #[tokio::test]
    async fn close_realizes_pnl_into_balance() {
        let broker = broker();
        let open = broker.open_order(&buy_request(0.5)).await.unwrap();
        let ticket = open.ticket.unwrap();

        broker.set_quote("EURUSD", 1.1201, 1.1203);
        let result = broker.close_position(ticket, None).await.unwrap();
        assert!(result.success);

        let pnl = (1.1201 - 1.1001) * 0.5 * 10.0;
        let account = broker.account().await.unwrap();
        assert!((account.balance - (10_000.0 + pnl)).abs() < 1e-9);
        assert!(broker.position(ticket).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_close_leaves_remainder() {
        let broker = broker();
        let ticket = broker
            .open_order(&buy_request(1.0))
            .await
            .unwrap()
            .ticket
            .unwrap();

        let result = broker.close_position(ticket, Some(0.4)).await.unwrap();
        assert!(result.success);
        let remaining = broker.position(ticket).await.unwrap().unwrap();
        assert!((remaining.volume - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn seeded_history_feeds_bars_and_snapshot() {
        let broker = broker();
        broker.seed_history("EURUSD", 60, 0.0005);
        let bars = broker.bars("EURUSD", Timeframe::Minute15, 50).await.unwrap();
        assert_eq!(bars.len(), 50);
        for bar in &bars {
            assert!(bar.low <= bar.close && bar.close <= bar.high);
        }
        let snap = broker.snapshot("EURUSD").await.unwrap();
        assert_eq!(snap.symbol, "EURUSD");
        assert!(snap.ask > snap.bid);
    }
}
