use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::signal::unix::SignalKind;
use tokio::time;

use broker_trait::{BrokerClient, BrokerPosition, InstrumentSpec, OrderRequest};
use execution_manager::ExecutionManager;
use notification_service::{Alert, AlertType, NotificationService};
use risk_ledger::RiskLedger;
use sim_broker::SimBroker;
use strategy_engine::{MaCrossoverGenerator, StrategyConfig, StrategyEngine};
use trading_core::{MarketDataFeed, OrderSide};

mod config;

use config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting PropPilot Trading Agent");

    // 2. Load and validate configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Symbol: {} @ {:?}", config.symbol, config.timeframe);
    tracing::info!("  Firm preset: {}", config.firm_preset);
    tracing::info!("  Risk per trade: {}%", config.risk_percent);
    tracing::info!("  Min confidence: {:.0}%", config.min_confidence);
    tracing::info!("  Min strength: {}", config.min_strength.label());
    tracing::info!("  Cycle interval: {}s", config.cycle_interval_seconds);
    tracing::info!("  Trade cooldown: {}s", config.cooldown_seconds);

    // 3. Notification channels
    let notifications = Arc::new(NotificationService::new(
        Some(config.webhook_url.clone()),
        64,
    ));

    // 4. Simulated broker: instrument, quotes and warm-up history
    let broker = Arc::new(
        SimBroker::new("paper-sim", config.starting_balance).with_seed(config.sim_seed),
    );
    let mid = 1.1000;
    broker.add_instrument(
        InstrumentSpec {
            symbol: config.symbol.clone(),
            lot_step: config.lot_step,
            min_volume: config.min_volume,
            max_volume: config.max_volume,
            value_per_unit: config.value_per_unit,
        },
        mid - config.sim_spread / 2.0,
        mid + config.sim_spread / 2.0,
    );
    let warmup = config
        .trend_period
        .max(config.atr_period + 1)
        .max(config.slow_ma_period + 2)
        .max(64);
    broker.seed_history(&config.symbol, warmup, config.sim_volatility);
    if broker.is_paper() {
        tracing::info!("Paper trading mode ({})", broker.broker_name());
    }

    // 5. Risk ledger from the firm preset (or a custom profile)
    let ledger = RiskLedger::new(config.risk_profile()?, config.starting_balance)?;

    // 6. Strategy engine with MA crossover generator
    let strategy_config = StrategyConfig {
        symbol: config.symbol.clone(),
        timeframe: config.timeframe,
        risk_percent: config.risk_percent,
        stop_atr_multiplier: config.stop_atr_multiplier,
        target_atr_multiplier: config.target_atr_multiplier,
        min_confidence: config.min_confidence,
        min_strength: config.min_strength,
        require_trend_alignment: config.require_trend_alignment,
        trend_period: config.trend_period,
        atr_period: config.atr_period,
    };
    let mut engine = StrategyEngine::new(
        strategy_config,
        Box::new(MaCrossoverGenerator::new(
            config.fast_ma_period,
            config.slow_ma_period,
        )),
    );
    engine.init(&*broker).await?;
    tracing::info!("Strategy engine initialized and warmed up");

    // 7. Execution manager
    let executor = ExecutionManager::new(
        broker.clone() as Arc<dyn BrokerClient>,
        Arc::clone(&notifications),
        config.position_tag.clone(),
        config.cooldown_seconds,
    );
    tracing::info!("Execution manager initialized (tag: {})", config.position_tag);

    let account = broker.account().await?;
    tracing::info!(
        "Account ready: {} {:.2} balance, {:.2} equity",
        account.currency,
        account.balance,
        account.equity
    );

    tracing::info!(
        "Agent is now running. Evaluating every {}s. Press Ctrl+C to stop.",
        config.cycle_interval_seconds
    );

    // Main loop with graceful shutdown (SIGINT + SIGTERM). Signals are
    // honored between cycles, never mid-cycle.
    let mut interval = time::interval(Duration::from_secs(config.cycle_interval_seconds));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_trading_cycle(
                    &broker,
                    &ledger,
                    &mut engine,
                    &executor,
                    &notifications,
                    &config,
                )
                .await
                {
                    tracing::error!("Error in trading cycle: {}", e);
                    notifications.send_alert(Alert::new(
                        AlertType::Error {
                            context: "trading cycle".to_string(),
                            detail: e.to_string(),
                        },
                        "Cycle error",
                        "Agent is still running.",
                    ));
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    engine.teardown();

    let stats = executor.stats();
    let state = ledger.state();
    tracing::info!(
        "Session summary: {} trades ({} wins / {} losses), net {:.2}, win rate {:.1}%",
        stats.trades_total,
        stats.wins,
        stats.losses,
        stats.net_profit(),
        stats.win_rate()
    );
    notifications.send_alert(Alert::new(
        AlertType::DailyReport {
            date: state
                .day
                .map(|d| d.to_string())
                .unwrap_or_else(|| Utc::now().date_naive().to_string()),
            pnl: state.realized_pnl_today,
            trades_count: state.trades_closed_today,
            positions_count: 0,
        },
        "Trading agent stopped",
        format!(
            "{} trades today, realized {:.2}",
            state.trades_closed_today, state.realized_pnl_today
        ),
    ));

    tracing::info!("Trading agent shut down.");
    Ok(())
}

async fn run_trading_cycle(
    broker: &Arc<SimBroker>,
    ledger: &RiskLedger,
    engine: &mut StrategyEngine,
    executor: &ExecutionManager,
    notifications: &Arc<NotificationService>,
    config: &AgentConfig,
) -> Result<()> {
    // 1. Advance the simulated market one tick
    if let Some(mid) = broker.step(&config.symbol, config.sim_volatility) {
        tracing::debug!(symbol = %config.symbol, mid, "Market tick");
    }
    let account = broker.account().await?;

    // 2. Day rollover: report the finished day, then reset day counters
    let today = Utc::now().date_naive();
    let prior = ledger.state();
    if let Some(day) = prior.day {
        if day != today {
            notifications.send_alert(Alert::new(
                AlertType::DailyReport {
                    date: day.to_string(),
                    pnl: prior.realized_pnl_today,
                    trades_count: prior.trades_closed_today,
                    positions_count: broker.positions().await?.len(),
                },
                format!("Daily report {}", day),
                format!(
                    "{} trades, realized {:.2}",
                    prior.trades_closed_today, prior.realized_pnl_today
                ),
            ));
        }
    }
    ledger.rollover_if_new_day(today, account.balance, account.equity);

    // 3. Maintain open positions: protective exits first, then stop care
    let owned: Vec<BrokerPosition> = broker
        .positions()
        .await?
        .into_iter()
        .filter(|p| p.tag == config.position_tag)
        .collect();

    for position in &owned {
        if protective_level_hit(position) {
            let pnl = position.unrealized_pl;
            let result = broker.close_position(position.ticket, None).await?;
            if result.success {
                tracing::info!(
                    ticket = position.ticket,
                    symbol = %position.symbol,
                    pnl,
                    "Position closed at protective level"
                );
                ledger.record_trade_closed(pnl);
                executor.record_closed_trade(pnl);
                notifications.send_alert(Alert::new(
                    AlertType::PositionClosed {
                        symbol: position.symbol.clone(),
                        volume: position.volume,
                        pnl,
                    },
                    format!("Position closed: {}", position.symbol),
                    "stop or target reached",
                ));
            }
            continue;
        }

        if config.enable_breakeven {
            executor
                .move_to_breakeven(position.ticket, config.breakeven_trigger)
                .await?;
        }
        if config.enable_trailing {
            executor
                .trail_stop(position.ticket, config.trail_distance)
                .await?;
        }
    }

    // 4. Evaluate the strategy on the fresh snapshot
    let snapshot = broker.snapshot(&config.symbol).await?;
    let signal = engine.evaluate(&snapshot).await?;

    // 5. Exit signals flatten the symbol
    if signal.direction.is_exit() {
        let closing: Vec<BrokerPosition> = broker
            .positions()
            .await?
            .into_iter()
            .filter(|p| p.tag == config.position_tag && p.symbol == config.symbol)
            .collect();
        let closed = executor.close_all(Some(&config.symbol)).await?;
        if closed.len() != closing.len() {
            tracing::warn!(
                expected = closing.len(),
                closed = closed.len(),
                "Not every position closed on exit signal"
            );
        }
        // Settle only the tickets the sweep actually closed
        for position in closing.iter().filter(|p| closed.contains(&p.ticket)) {
            ledger.record_trade_closed(position.unrealized_pl);
            executor.record_closed_trade(position.unrealized_pl);
        }
        return Ok(());
    }

    // 6. Entry signals pass the risk gate, get sized, then execute
    if !signal.is_actionable(config.min_confidence, config.min_strength) {
        tracing::debug!(symbol = %config.symbol, "No actionable signal this cycle");
        return Ok(());
    }
    if !config.trading_enabled {
        tracing::info!(
            direction = ?signal.direction,
            confidence = signal.confidence,
            "Trading disabled, signal not executed"
        );
        return Ok(());
    }
    let Some(side) = signal.direction.side() else {
        return Ok(());
    };

    let open_count = broker
        .positions()
        .await?
        .iter()
        .filter(|p| p.tag == config.position_tag)
        .count();
    let decision = ledger.can_trade(account.balance, account.equity, open_count, Utc::now());
    if !decision.approved {
        tracing::info!(reason = decision.reason(), "Trade blocked by risk gate");
        if let Some(breach) = &decision.breach {
            notifications.send_alert(Alert::new(
                AlertType::RiskLimitApproaching {
                    limit_name: format!("{:?}", breach.kind),
                    current: breach.current,
                    limit: breach.limit,
                },
                "Risk limit approaching",
                breach.description.clone(),
            ));
        }
        return Ok(());
    }

    let spec = broker.instrument(&config.symbol).await?;
    let entry = match side {
        OrderSide::Buy => snapshot.ask,
        OrderSide::Sell => snapshot.bid,
    };
    let stop_distance = signal
        .stop_loss
        .map(|stop| (entry - stop).abs())
        .unwrap_or_else(|| engine.volatility() * config.stop_atr_multiplier);
    let volume = ledger.size_position(
        stop_distance,
        config.risk_percent,
        account.balance,
        &spec,
    );

    tracing::info!(
        symbol = %config.symbol,
        direction = ?signal.direction,
        strength = signal.strength.label(),
        confidence = signal.confidence,
        volume,
        stop_distance,
        rationale = %signal.rationale,
        "Actionable signal, submitting order"
    );

    let result = executor
        .execute(OrderRequest {
            symbol: config.symbol.clone(),
            side,
            volume,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            tag: String::new(),
            comment: signal.rationale.clone(),
        })
        .await?;

    if result.success {
        ledger.record_trade_opened();
    }

    Ok(())
}

/// Whether the market has crossed the position's stop or target. The
/// simulated broker does not trigger server-side stops, so the agent
/// enforces them between cycles.
fn protective_level_hit(position: &BrokerPosition) -> bool {
    let stop_hit = position.stop_loss.map_or(false, |stop| match position.side {
        OrderSide::Buy => position.current_price <= stop,
        OrderSide::Sell => position.current_price >= stop,
    });
    let target_hit = position
        .take_profit
        .map_or(false, |target| match position.side {
            OrderSide::Buy => position.current_price >= target,
            OrderSide::Sell => position.current_price <= target,
        });
    stop_hit || target_hit
}
