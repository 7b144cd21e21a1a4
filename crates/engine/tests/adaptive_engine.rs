//! Adaptive Engine Integration Test
//!
//! Runs the full engine with:
//! - Synthetic and channel-backed market/fill feeds
//! - Background detection, monitoring and adaptation loops
//! - In-memory persistence
//! - Gate validation under emergency stop

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proteus_clock::SystemClock;
use proteus_core::{Fill, MarketEvent, MarketSample, OrderProposal, Side, Timeframe, Timestamp};
use proteus_engine::{
    ChannelFillFeed, ChannelMarketFeed, Engine, EngineConfig, InMemoryStore, SyntheticFeed,
    SyntheticFeedConfig,
};
use proteus_gate::RejectReason;
use proteus_risk_monitor::{AlertKind, RiskLimitConfig, RiskMonitorConfig};
use proteus_strategy::{
    PerformanceTargets, RiskLimits, StrategyConfig, StrategyKind, params,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// Engine config with tick intervals short enough for timing-based tests
fn short_config(risk: RiskMonitorConfig) -> EngineConfig {
    EngineConfig {
        risk,
        detection_interval: Duration::from_millis(25),
        monitoring_interval: Duration::from_millis(25),
        adaptation_interval: Duration::from_millis(25),
        ..EngineConfig::default()
    }
}

fn build(risk: RiskMonitorConfig) -> (Engine, Arc<InMemoryStore>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Arc::new(InMemoryStore::new());
    let engine = Engine::new(
        short_config(risk),
        Arc::new(SystemClock::new()),
        store.clone(),
    );
    (engine, store)
}

fn strategy_config(strategy_id: &str) -> StrategyConfig {
    StrategyConfig {
        strategy_id: strategy_id.to_string(),
        kind: StrategyKind::TrendFollowing,
        asset: "BTC/USD".to_string(),
        timeframe: Timeframe::M1,
        parameters: BTreeMap::from([
            ("entry_threshold".to_string(), 1.0),
            (params::MAX_POSITION_SIZE.to_string(), 2.0),
        ]),
        performance_targets: PerformanceTargets::default(),
        risk_limits: RiskLimits {
            max_position_size: dec!(2),
            ..RiskLimits::default()
        },
        rules: Vec::new(),
    }
}

fn proposal(strategy_id: &str) -> OrderProposal {
    OrderProposal::new(
        strategy_id,
        "BTC/USD",
        Side::Buy,
        dec!(1),
        dec!(50000),
        Utc::now(),
    )
}

fn fill(strategy_id: &str, side: Side, price: Decimal, at: Timestamp) -> Fill {
    Fill {
        proposal_id: Uuid::new_v4(),
        strategy_id: strategy_id.to_string(),
        asset: "BTC/USD".to_string(),
        side,
        quantity: dec!(1),
        price,
        timestamp: at,
    }
}

/// Full loop: synthetic market data accumulates per-series windows and
/// shutdown closes the gate before the loops drain.
#[tokio::test]
async fn test_engine_runs_with_synthetic_feed() {
    let (engine, _store) = build(RiskMonitorConfig::default());

    let feed_config = SyntheticFeedConfig {
        start: t0(),
        max_events: Some(120),
        tick_interval_ms: 1,
        ..Default::default()
    };
    let feed = SyntheticFeed::with_seed(feed_config, 42);
    let (_fill_tx, fills) = ChannelFillFeed::new(16);

    engine.start(feed, fills);
    assert!(engine.status().running);

    tokio::time::sleep(Duration::from_millis(300)).await;

    // 120 events round-robined over the two default assets
    let status = engine.status();
    assert_eq!(status.tracked_series, 2, "both default assets tracked");
    let window = engine.window("BTC/USD", Timeframe::M1).unwrap();
    assert_eq!(window.len(), 60);
    let window = engine.window("ETH/USD", Timeframe::M1).unwrap();
    assert_eq!(window.len(), 60);

    engine.shutdown().await;
    let status = engine.status();
    assert!(!status.running);
    assert!(!status.accepting_orders, "shutdown closes the gate");

    let decision = engine.validate_order(&proposal("alpha"));
    assert_eq!(decision.rejection(), Some(&RejectReason::NotAccepting));
}

/// At-least-once market delivery: a redelivered sample is dropped by
/// timestamp, not double-counted.
#[tokio::test]
async fn test_market_ingest_deduplicates_redelivered_samples() {
    let (engine, _store) = build(RiskMonitorConfig::default());

    let (market_tx, market) = ChannelMarketFeed::new(16);
    let (_fill_tx, fills) = ChannelFillFeed::new(16);
    engine.start(market, fills);

    let sample = MarketSample::new(dec!(50000), dec!(2), t0());
    let event = MarketEvent {
        asset: "BTC/USD".to_string(),
        timeframe: Timeframe::M1,
        sample,
    };
    market_tx.send(event.clone()).await.unwrap();
    market_tx.send(event).await.unwrap(); // redelivery
    let later = MarketEvent {
        asset: "BTC/USD".to_string(),
        timeframe: Timeframe::M1,
        sample: MarketSample::new(dec!(50100), dec!(1), t0() + chrono::Duration::minutes(1)),
    };
    market_tx.send(later).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(engine.status().tracked_series, 1);
    let window = engine.window("BTC/USD", Timeframe::M1).unwrap();
    assert_eq!(window.len(), 2, "duplicate timestamp dropped");

    engine.shutdown().await;
}

/// Fill flow: reservations settle, the analyzer books round trips, the
/// risk monitor carries the daily PnL and the monitoring tick persists
/// performance snapshots.
#[tokio::test]
async fn test_fill_flow_reaches_analyzer_risk_and_store() {
    let (engine, store) = build(RiskMonitorConfig::default());
    engine
        .register_strategy(strategy_config("alpha"))
        .await
        .unwrap();

    let (_market_tx, market) = ChannelMarketFeed::new(16);
    let (fill_tx, fills) = ChannelFillFeed::new(16);
    engine.start(market, fills);

    // Approved proposal backs the first fill; its reservation must settle
    let decision = engine.validate_order(&proposal("alpha"));
    let approved = decision.approved().expect("within limits").clone();
    assert_eq!(engine.status().open_reservations, 1);

    let mut entry = fill("alpha", Side::Buy, dec!(50000), t0());
    entry.proposal_id = approved.proposal.id;
    fill_tx.send(entry).await.unwrap();
    fill_tx
        .send(fill(
            "alpha",
            Side::Sell,
            dec!(51000),
            t0() + chrono::Duration::minutes(1),
        ))
        .await
        .unwrap();
    fill_tx
        .send(fill(
            "alpha",
            Side::Buy,
            dec!(50000),
            t0() + chrono::Duration::minutes(2),
        ))
        .await
        .unwrap();
    fill_tx
        .send(fill(
            "alpha",
            Side::Sell,
            dec!(49500),
            t0() + chrono::Duration::minutes(3),
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(engine.status().open_reservations, 0, "fill settles reservation");

    let metrics = engine.performance_metrics("alpha").unwrap();
    assert_eq!(metrics.trade_count, 2);
    assert!((metrics.win_rate - 0.5).abs() < 1e-12);
    assert!(metrics.total_return > 0.0);

    // +1000 then -500 on the day
    assert_eq!(engine.risk().daily_pnl(), dec!(500));

    engine.shutdown().await;

    let snapshots = store.snapshots();
    assert!(!snapshots.is_empty(), "monitoring tick persisted snapshots");
    let last = snapshots.last().unwrap();
    assert_eq!(last.strategy_id, "alpha");
    assert_eq!(last.trade_count, 2);
}

/// Daily loss breach raises an alert on the monitoring tick and the sink
/// persists it as a violation row.
#[tokio::test]
async fn test_daily_loss_alert_is_persisted() {
    let risk = RiskMonitorConfig {
        limits: RiskLimitConfig {
            max_daily_loss: dec!(100),
            ..RiskLimitConfig::default()
        },
        ..RiskMonitorConfig::default()
    };
    let (engine, store) = build(risk);
    engine
        .register_strategy(strategy_config("alpha"))
        .await
        .unwrap();

    let mut alerts = engine.subscribe_alerts();

    let (_market_tx, market) = ChannelMarketFeed::new(16);
    let (fill_tx, fills) = ChannelFillFeed::new(16);
    engine.start(market, fills);

    // one round trip losing 200 against a 100 daily-loss limit
    fill_tx
        .send(fill("alpha", Side::Buy, dec!(50000), t0()))
        .await
        .unwrap();
    fill_tx
        .send(fill(
            "alpha",
            Side::Sell,
            dec!(49800),
            t0() + chrono::Duration::minutes(1),
        ))
        .await
        .unwrap();

    let alert = tokio::time::timeout(Duration::from_secs(2), alerts.recv())
        .await
        .expect("alert within timeout")
        .expect("alert channel open");
    assert_eq!(alert.kind, AlertKind::DailyLoss);
    assert_eq!(alert.limit_value, 100.0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.shutdown().await;

    assert!(
        store
            .violations()
            .iter()
            .any(|violation| violation.kind == "daily_loss"),
        "violation row persisted"
    );
}

/// Emergency stop with in-flight proposals: concurrent validations either
/// complete before the signal or observe it; nothing issued after the stop
/// is approved.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_emergency_stop_with_inflight_proposals() {
    let risk = RiskMonitorConfig {
        limits: RiskLimitConfig {
            max_concentration: 1.0,
            ..RiskLimitConfig::default()
        },
        ..RiskMonitorConfig::default()
    };
    let (engine, _store) = build(risk);
    let engine = Arc::new(engine);
    engine
        .register_strategy(strategy_config("alpha"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..3 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.validate_order(&proposal("alpha"))
        }));
    }

    engine.emergency_stop("limit breach under review");

    let mut approved = 0;
    for handle in handles {
        let decision = handle.await.unwrap();
        match decision.rejection() {
            None => approved += 1,
            Some(RejectReason::EmergencyStopped { .. }) => {}
            Some(other) => panic!("unexpected rejection: {other}"),
        }
    }
    assert_eq!(engine.status().open_reservations, approved);

    // everything after the stop rejects
    for _ in 0..3 {
        let decision = engine.validate_order(&proposal("alpha"));
        assert_eq!(
            decision.rejection(),
            Some(&RejectReason::EmergencyStopped {
                reason: "limit breach under review".to_string()
            })
        );
    }

    engine.resume_all();
    assert!(engine.validate_order(&proposal("alpha")).is_approved());
}

/// Defaults construct a working engine without collaborators
#[tokio::test]
async fn test_engine_with_defaults() {
    let engine = Engine::with_defaults();
    let status = engine.status();
    assert!(!status.running);
    assert!(status.accepting_orders);
    assert_eq!(status.strategies, 0);
    assert_eq!(status.tracked_series, 0);
}
