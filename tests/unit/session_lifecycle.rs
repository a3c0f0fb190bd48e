//! Full-exchange lifecycle tests: connect phase, session events, drain and
//! finalization, driven through spawned threads with short windows.

use crate::{drain, reports};
use exchange_rs::tape::TapeBuffers;
use exchange_rs::{
    ExchangeConfig, InboundMessage, LimitOrderRequest, LocalTransport, OutboundMessage,
    SessionEvent, SessionState, Side, StockExchange, SubscribeRequest, TapeStore, TimeInForce,
    Transport,
};
use std::sync::Arc;
use std::time::Duration;

fn lifecycle_config(trading_time_ms: u64, technical_ready_delay_ms: u64) -> ExchangeConfig {
    ExchangeConfig {
        name: "LIFEX".to_string(),
        tickers: vec!["X".to_string()],
        connect_time_ms: 20,
        trading_time_ms,
        technical_ready_delay_ms,
        idle_grace_ms: 60,
        queue_capacity: 256,
        rolling_window: 20,
        legacy_agent_prefixes: vec!["zic".to_string()],
        output_dir: ".".into(),
    }
}

fn build(
    config: ExchangeConfig,
) -> (StockExchange, Arc<LocalTransport>, TapeBuffers) {
    let transport = Arc::new(LocalTransport::new());
    let (tapes, buffers) = TapeStore::in_memory(&config.tickers);
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let exchange = StockExchange::with_tapes(config, dyn_transport, tapes);
    (exchange, transport, buffers)
}

fn subscribe_msg(agent: u32, name: &str) -> InboundMessage {
    InboundMessage::Subscribe(SubscribeRequest {
        sender_id: agent,
        ticker: "X".to_string(),
        endpoint: format!("agent://{agent}"),
        agent_name: name.to_string(),
    })
}

fn limit_msg(agent: u32, side: Side, quantity: u64, price: u64, priv_value: f64) -> InboundMessage {
    InboundMessage::LimitOrder(LimitOrderRequest {
        sender_id: agent,
        client_order_id: agent as u64,
        ticker: "X".to_string(),
        side,
        quantity,
        price,
        priv_value,
        time_in_force: TimeInForce::Gtc,
        agent_name: format!("agent_{agent}"),
    })
}

#[test]
fn test_connect_phase_reaches_subscribers_then_trades_flow() {
    let (mut exchange, transport, buffers) = build(lifecycle_config(600, 100));
    let rx_a = transport.register("agent://1");
    let rx_b = transport.register("agent://2");

    let session = exchange.session();
    let handle = exchange.handle();
    exchange.start();

    // Subscribe during the connect window.
    handle.submit(subscribe_msg(1, "zic_1")).unwrap();
    handle.submit(subscribe_msg(2, "zic_2")).unwrap();

    assert!(
        session.wait_for(|s| s >= SessionState::TradingOpen, Duration::from_secs(10)),
        "session never opened"
    );

    // Both connect-phase subscribers observe the session start.
    let deadline_drain = |rx: &crossbeam::channel::Receiver<OutboundMessage>| {
        rx.recv_timeout(Duration::from_secs(5)).expect("event expected")
    };
    assert!(matches!(
        deadline_drain(&rx_a),
        OutboundMessage::Event(SessionEvent::TradingSessionStart)
    ));
    assert!(matches!(
        deadline_drain(&rx_b),
        OutboundMessage::Event(SessionEvent::TradingSessionStart)
    ));

    // A trade round-trips through the spawned engine.
    handle.submit(limit_msg(1, Side::Bid, 10, 100, 104.0)).unwrap();
    handle.submit(limit_msg(2, Side::Ask, 10, 100, 96.0)).unwrap();

    exchange.terminate();

    let a_messages = drain(&rx_a);
    let a_reports = reports(&a_messages);
    assert_eq!(a_reports.len(), 2, "ack plus fill expected: {a_reports:?}");
    assert!(a_reports[1].trade.is_some());

    // Session end is broadcast after the engine drained.
    assert!(a_messages
        .iter()
        .any(|m| matches!(m, OutboundMessage::Event(SessionEvent::TradingSessionEnd))));

    // Profits were finalized sorted by profit descending.
    let profits_csv = buffers.tickers["X"][3].contents();
    let lines: Vec<&str> = profits_csv.lines().collect();
    assert_eq!(lines[0], "agent_name,profit");
    assert_eq!(lines.len(), 3);
    let first: f64 = lines[1].rsplit(',').next().unwrap().parse().unwrap();
    let second: f64 = lines[2].rsplit(',').next().unwrap().parse().unwrap();
    assert!(first >= second);
}

#[test]
fn test_technical_ready_fires_during_window() {
    let (mut exchange, transport, _buffers) = build(lifecycle_config(700, 80));
    let rx = transport.register("agent://1");

    let session = exchange.session();
    let handle = exchange.handle();
    exchange.start();
    handle.submit(subscribe_msg(1, "zic_1")).unwrap();

    assert!(session.wait_for(|s| s >= SessionState::TradingOpen, Duration::from_secs(10)));
    exchange.terminate();

    assert!(session.technical_ready());
    let events: Vec<OutboundMessage> = drain(&rx);
    let technical_pos = events
        .iter()
        .position(|m| matches!(m, OutboundMessage::Event(SessionEvent::TechnicalAgentsStarted)))
        .expect("technical-ready event expected");
    let end_pos = events
        .iter()
        .position(|m| matches!(m, OutboundMessage::Event(SessionEvent::TradingSessionEnd)))
        .unwrap();
    assert!(technical_pos < end_pos);
}

#[test]
fn test_late_subscriber_receives_targeted_session_start() {
    let (mut exchange, transport, _buffers) = build(lifecycle_config(800, 5_000));
    let _rx_early = transport.register("agent://1");

    let session = exchange.session();
    let handle = exchange.handle();
    exchange.start();
    handle.submit(subscribe_msg(1, "zic_1")).unwrap();

    assert!(session.wait_for(|s| s >= SessionState::TradingOpen, Duration::from_secs(10)));

    // Joins after the window opened: must still learn the session state.
    let rx_late = transport.register("agent://9");
    handle.submit(subscribe_msg(9, "late_9")).unwrap();

    let first = rx_late
        .recv_timeout(Duration::from_secs(5))
        .expect("targeted session start expected");
    assert!(matches!(
        first,
        OutboundMessage::Event(SessionEvent::TradingSessionStart)
    ));

    exchange.terminate();
}

#[test]
fn test_submit_after_terminate_fails_with_closed_queue() {
    let (mut exchange, transport, _buffers) = build(lifecycle_config(100, 5_000));
    let _rx = transport.register("agent://1");

    let handle = exchange.handle();
    exchange.start();
    exchange.terminate();

    let result = handle.submit(subscribe_msg(1, "zic_1"));
    assert!(result.is_err());
}

#[test]
fn test_technical_delay_longer_than_window_is_skipped() {
    let (mut exchange, transport, _buffers) = build(lifecycle_config(150, 60_000));
    let rx = transport.register("agent://1");

    let session = exchange.session();
    let handle = exchange.handle();
    exchange.start();
    handle.submit(subscribe_msg(1, "zic_1")).unwrap();

    assert!(session.wait_for(|s| s == SessionState::TradingClosed, Duration::from_secs(10)));
    exchange.terminate();

    assert!(!session.technical_ready());
    let events = drain(&rx);
    assert!(!events
        .iter()
        .any(|m| matches!(m, OutboundMessage::Event(SessionEvent::TechnicalAgentsStarted))));
}
