use std::sync::Arc;

use async_trait::async_trait;
use broker_trait::{
    retcode, AccountSnapshot, BrokerClient, BrokerPosition, InstrumentSpec, OrderRequest,
    OrderResult, QuoteTick,
};
use notification_service::NotificationService;
use sim_broker::SimBroker;
use trading_core::OrderSide;

use crate::{ExecutionManager, ModifyOutcome};

fn instrument(symbol: &str) -> InstrumentSpec {
    InstrumentSpec {
        symbol: symbol.to_string(),
        lot_step: 0.01,
        min_volume: 0.01,
        max_volume: 10.0,
        value_per_unit: 10.0,
    }
}

fn setup(cooldown_secs: i64) -> (Arc<SimBroker>, ExecutionManager) {
    let broker = Arc::new(SimBroker::new("sim", 10_000.0));
    broker.add_instrument(instrument("EURUSD"), 1.0999, 1.1001);

    let manager = ExecutionManager::new(
        broker.clone(),
        Arc::new(NotificationService::new(None, 8)),
        "strat-1",
        cooldown_secs,
    );
    (broker, manager)
}

fn buy(symbol: &str, volume: f64) -> OrderRequest {
    OrderRequest {
        symbol: symbol.to_string(),
        side: OrderSide::Buy,
        volume,
        stop_loss: None,
        take_profit: None,
        tag: String::new(),
        comment: String::new(),
    }
}

#[tokio::test]
async fn nonpositive_volume_never_reaches_broker() {
    let (broker, manager) = setup(0);

    let result = manager.execute(buy("EURUSD", 0.0)).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.retcode, retcode::VOLUME_NOT_ALLOWED);

    let result = manager.execute(buy("EURUSD", -0.5)).await.unwrap();
    assert_eq!(result.retcode, retcode::VOLUME_NOT_ALLOWED);

    assert!(broker.positions().await.unwrap().is_empty());
}

#[tokio::test]
async fn cooldown_blocks_back_to_back_orders() {
    let (_broker, manager) = setup(60);

    let first = manager.execute(buy("EURUSD", 0.1)).await.unwrap();
    assert!(first.success);

    let second = manager.execute(buy("EURUSD", 0.1)).await.unwrap();
    assert!(!second.success);
    assert_eq!(second.retcode, retcode::COOLDOWN_ACTIVE);
}

#[tokio::test]
async fn zero_cooldown_allows_consecutive_orders() {
    let (_broker, manager) = setup(0);

    assert!(manager.execute(buy("EURUSD", 0.1)).await.unwrap().success);
    assert!(manager.execute(buy("EURUSD", 0.1)).await.unwrap().success);
}

#[tokio::test]
async fn rejected_order_does_not_start_cooldown() {
    let (_broker, manager) = setup(60);

    // Below instrument minimum: broker rejects, cooldown must not arm
    let rejected = manager.execute(buy("EURUSD", 0.005)).await.unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.retcode, retcode::INVALID_VOLUME);

    let filled = manager.execute(buy("EURUSD", 0.1)).await.unwrap();
    assert!(filled.success);
}

#[tokio::test]
async fn trail_stop_only_tightens() {
    let (broker, manager) = setup(0);
    let ticket = manager
        .execute(buy("EURUSD", 1.0))
        .await
        .unwrap()
        .ticket
        .unwrap();

    // Price moves up: trail places a stop below the new bid
    broker.set_quote("EURUSD", 1.1101, 1.1103);
    let outcome = manager.trail_stop(ticket, 0.0050).await.unwrap();
    let ModifyOutcome::Applied { new_stop } = outcome else {
        panic!("expected trail to apply, got {:?}", outcome);
    };
    assert!((new_stop - 1.1051).abs() < 1e-9);

    // Price retreats: the looser candidate must be dropped
    broker.set_quote("EURUSD", 1.1051, 1.1053);
    let outcome = manager.trail_stop(ticket, 0.0050).await.unwrap();
    assert_eq!(outcome, ModifyOutcome::Unchanged);

    let position = broker.position(ticket).await.unwrap().unwrap();
    assert!((position.stop_loss.unwrap() - new_stop).abs() < 1e-12);
}

#[tokio::test]
async fn trail_stop_ignores_unknown_ticket_and_bad_distance() {
    let (_broker, manager) = setup(0);
    assert_eq!(
        manager.trail_stop(9999, 0.0050).await.unwrap(),
        ModifyOutcome::Unchanged
    );

    let ticket = manager
        .execute(buy("EURUSD", 0.1))
        .await
        .unwrap()
        .ticket
        .unwrap();
    assert_eq!(
        manager.trail_stop(ticket, 0.0).await.unwrap(),
        ModifyOutcome::Unchanged
    );
}

#[tokio::test]
async fn breakeven_waits_for_profit_then_locks_open_price() {
    let (broker, manager) = setup(0);
    // Fills at the ask, 1.1001
    let ticket = manager
        .execute(buy("EURUSD", 1.0))
        .await
        .unwrap()
        .ticket
        .unwrap();

    // 9 points of profit, threshold is 20: no move
    broker.set_quote("EURUSD", 1.1010, 1.1012);
    let outcome = manager.move_to_breakeven(ticket, 0.0020).await.unwrap();
    assert_eq!(outcome, ModifyOutcome::Unchanged);

    // 30 points: stop goes to the open price
    broker.set_quote("EURUSD", 1.1031, 1.1033);
    let outcome = manager.move_to_breakeven(ticket, 0.0020).await.unwrap();
    assert_eq!(outcome, ModifyOutcome::Applied { new_stop: 1.1001 });

    // Repeat call is a no-op: equal stop is not tighter
    let outcome = manager.move_to_breakeven(ticket, 0.0020).await.unwrap();
    assert_eq!(outcome, ModifyOutcome::Unchanged);
}

#[tokio::test]
async fn partial_close_floors_to_lot_step() {
    let (broker, manager) = setup(0);
    let ticket = manager
        .execute(buy("EURUSD", 1.0))
        .await
        .unwrap()
        .ticket
        .unwrap();

    let result = manager.partial_close(ticket, 1.0 / 3.0).await.unwrap();
    assert!(result.success);
    assert_eq!(result.fill_volume, Some(0.33));

    let remaining = broker.position(ticket).await.unwrap().unwrap();
    assert!((remaining.volume - 0.67).abs() < 1e-9);
}

#[tokio::test]
async fn partial_close_rejects_out_of_range_fractions() {
    let (broker, manager) = setup(0);
    let ticket = manager
        .execute(buy("EURUSD", 1.0))
        .await
        .unwrap()
        .ticket
        .unwrap();

    for fraction in [0.0, -0.5, 1.5] {
        let result = manager.partial_close(ticket, fraction).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.retcode, retcode::VOLUME_NOT_ALLOWED);
    }

    // No close ever reached the broker
    let position = broker.position(ticket).await.unwrap().unwrap();
    assert_eq!(position.volume, 1.0);
}

#[tokio::test]
async fn partial_close_below_minimum_is_rejected_locally() {
    let (broker, manager) = setup(0);
    let ticket = manager
        .execute(buy("EURUSD", 0.01))
        .await
        .unwrap()
        .ticket
        .unwrap();

    let result = manager.partial_close(ticket, 0.5).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.retcode, retcode::INVALID_VOLUME);

    // The position was never touched
    let position = broker.position(ticket).await.unwrap().unwrap();
    assert_eq!(position.volume, 0.01);
}

#[tokio::test]
async fn close_all_is_scoped_to_tag_and_symbol() {
    let (broker, manager) = setup(0);
    broker.add_instrument(instrument("GBPUSD"), 1.2699, 1.2701);

    manager.execute(buy("EURUSD", 0.1)).await.unwrap();
    manager.execute(buy("EURUSD", 0.2)).await.unwrap();
    manager.execute(buy("GBPUSD", 0.1)).await.unwrap();

    // A position owned by someone else must survive every sweep
    let mut foreign = buy("EURUSD", 0.1);
    foreign.tag = "other-strat".to_string();
    broker.open_order(&foreign).await.unwrap();

    let closed = manager.close_all(Some("EURUSD")).await.unwrap();
    assert_eq!(closed.len(), 2);

    let closed = manager.close_all(None).await.unwrap();
    assert_eq!(closed.len(), 1);

    let leftovers = broker.positions().await.unwrap();
    assert_eq!(leftovers.len(), 1);
    assert_eq!(leftovers[0].tag, "other-strat");
}

/// Broker wrapper that refuses to close one ticket; everything else is
/// passed through to the sim.
struct StickyTicketBroker {
    inner: Arc<SimBroker>,
    stuck_ticket: u64,
}

#[async_trait]
impl BrokerClient for StickyTicketBroker {
    async fn account(&self) -> anyhow::Result<AccountSnapshot> {
        self.inner.account().await
    }

    async fn positions(&self) -> anyhow::Result<Vec<BrokerPosition>> {
        self.inner.positions().await
    }

    async fn position(&self, ticket: u64) -> anyhow::Result<Option<BrokerPosition>> {
        self.inner.position(ticket).await
    }

    async fn instrument(&self, symbol: &str) -> anyhow::Result<InstrumentSpec> {
        self.inner.instrument(symbol).await
    }

    async fn quote(&self, symbol: &str) -> anyhow::Result<QuoteTick> {
        self.inner.quote(symbol).await
    }

    async fn open_order(&self, request: &OrderRequest) -> anyhow::Result<OrderResult> {
        self.inner.open_order(request).await
    }

    async fn modify_position(
        &self,
        ticket: u64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> anyhow::Result<OrderResult> {
        self.inner.modify_position(ticket, stop_loss, take_profit).await
    }

    async fn close_position(&self, ticket: u64, volume: Option<f64>) -> anyhow::Result<OrderResult> {
        if ticket == self.stuck_ticket {
            return Ok(OrderResult::rejected(
                retcode::MARKET_CLOSED,
                "no liquidity for this ticket",
            ));
        }
        self.inner.close_position(ticket, volume).await
    }

    fn is_paper(&self) -> bool {
        self.inner.is_paper()
    }

    fn broker_name(&self) -> &str {
        "sticky-sim"
    }
}

#[tokio::test]
async fn close_all_reports_only_the_tickets_that_closed() {
    let sim = Arc::new(SimBroker::new("sim", 10_000.0));
    sim.add_instrument(instrument("EURUSD"), 1.0999, 1.1001);

    let first = sim.open_order(&{
        let mut r = buy("EURUSD", 0.1);
        r.tag = "strat-1".to_string();
        r
    })
    .await
    .unwrap()
    .ticket
    .unwrap();
    let second = sim
        .open_order(&{
            let mut r = buy("EURUSD", 0.2);
            r.tag = "strat-1".to_string();
            r
        })
        .await
        .unwrap()
        .ticket
        .unwrap();
    let third = sim
        .open_order(&{
            let mut r = buy("EURUSD", 0.3);
            r.tag = "strat-1".to_string();
            r
        })
        .await
        .unwrap()
        .ticket
        .unwrap();

    let manager = ExecutionManager::new(
        Arc::new(StickyTicketBroker {
            inner: sim.clone(),
            stuck_ticket: second,
        }),
        Arc::new(NotificationService::new(None, 8)),
        "strat-1",
        0,
    );

    let mut closed = manager.close_all(Some("EURUSD")).await.unwrap();
    closed.sort_unstable();
    assert_eq!(closed, vec![first, third]);

    // The stuck position is still open, the other two are gone
    let leftovers = sim.positions().await.unwrap();
    assert_eq!(leftovers.len(), 1);
    assert_eq!(leftovers[0].ticket, second);
}

#[tokio::test]
async fn maintenance_skips_positions_it_does_not_own() {
    let (broker, manager) = setup(0);
    let mut foreign = buy("EURUSD", 0.1);
    foreign.tag = "other-strat".to_string();
    let ticket = broker.open_order(&foreign).await.unwrap().ticket.unwrap();

    broker.set_quote("EURUSD", 1.1101, 1.1103);
    let outcome = manager.trail_stop(ticket, 0.0050).await.unwrap();
    assert_eq!(outcome, ModifyOutcome::Unchanged);
    assert!(broker
        .position(ticket)
        .await
        .unwrap()
        .unwrap()
        .stop_loss
        .is_none());
}

#[tokio::test]
async fn closed_trades_feed_stats_once_each() {
    let (_broker, manager) = setup(0);
    manager.record_closed_trade(150.0);
    manager.record_closed_trade(-40.0);

    let stats = manager.stats();
    assert_eq!(stats.trades_total, 2);
    assert_eq!(stats.wins, 1);
    assert_eq!(stats.losses, 1);
    assert!((stats.net_profit() - 110.0).abs() < 1e-9);
}
