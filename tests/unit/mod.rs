//! Aggregated integration test suite.

mod engine_scenarios;
mod session_lifecycle;
mod tape_files;

use crossbeam::channel::Receiver;
use exchange_rs::tape::TapeBuffers;
use exchange_rs::{
    CancelRequest, EngineMsg, ExchangeConfig, ExecutionReport, InboundMessage, LimitOrderRequest,
    LocalTransport, MarketData, MarketOrderRequest, MatchingEngine, OutboundMessage, SessionClock,
    SessionState, SimClock, Side, SubscribeRequest, SubscriptionFabric, TapeStore, TimeInForce,
    Transport,
};
use std::sync::Arc;

/// Exchange configuration with instant windows, suitable for direct-drive
/// engine tests.
pub fn test_config(tickers: &[&str]) -> ExchangeConfig {
    ExchangeConfig {
        name: "TESTX".to_string(),
        tickers: tickers.iter().map(|t| t.to_string()).collect(),
        connect_time_ms: 0,
        trading_time_ms: 60_000,
        technical_ready_delay_ms: 4_000,
        idle_grace_ms: 50,
        queue_capacity: 1_024,
        rolling_window: 20,
        legacy_agent_prefixes: vec!["zic".to_string(), "zip".to_string()],
        output_dir: ".".into(),
    }
}

/// Directly drives a matching engine on the test thread: no spawned tasks,
/// in-memory tapes, deterministic broadcast shuffle.
pub struct Harness {
    pub engine: MatchingEngine,
    pub transport: Arc<LocalTransport>,
    pub session: Arc<SessionClock>,
    pub clock: Arc<SimClock>,
    pub buffers: TapeBuffers,
}

impl Harness {
    pub fn new(tickers: &[&str]) -> Self {
        let config = test_config(tickers);
        let transport = Arc::new(LocalTransport::new());
        let dyn_transport: Arc<dyn Transport> = transport.clone();
        let fabric = Arc::new(SubscriptionFabric::with_rng_seed(
            &config.tickers,
            dyn_transport,
            7,
        ));
        let session = Arc::new(SessionClock::new());
        let clock = Arc::new(SimClock::new());
        let (tapes, buffers) = TapeStore::in_memory(&config.tickers);

        let engine = MatchingEngine::new(
            &config,
            tapes,
            fabric,
            Arc::clone(&session),
            Arc::clone(&clock),
        );

        Self {
            engine,
            transport,
            session,
            clock,
            buffers,
        }
    }

    /// Move the session straight into the open trading window.
    pub fn open_session(&self) {
        self.session.advance(SessionState::ConnectWindow);
        self.clock.mark_session_open();
        self.session.advance(SessionState::TradingOpen);
    }

    /// Register an endpoint for `agent` and subscribe it to `ticker`.
    pub fn subscribe(&mut self, agent: u32, ticker: &str) -> Receiver<OutboundMessage> {
        let endpoint = format!("agent://{agent}");
        let rx = self.transport.register(&endpoint);
        self.engine
            .process(EngineMsg::Inbound(InboundMessage::Subscribe(SubscribeRequest {
                sender_id: agent,
                ticker: ticker.to_string(),
                endpoint,
                agent_name: format!("zic_{agent}"),
            })));
        rx
    }

    pub fn limit(
        &mut self,
        agent: u32,
        ticker: &str,
        side: Side,
        quantity: u64,
        price: u64,
        tif: TimeInForce,
    ) {
        self.engine
            .process(EngineMsg::Inbound(InboundMessage::LimitOrder(LimitOrderRequest {
                sender_id: agent,
                client_order_id: agent as u64 * 1_000,
                ticker: ticker.to_string(),
                side,
                quantity,
                price,
                priv_value: price as f64,
                time_in_force: tif,
                agent_name: format!("zic_{agent}"),
            })));
    }

    pub fn market(&mut self, agent: u32, ticker: &str, side: Side, quantity: u64) {
        self.engine
            .process(EngineMsg::Inbound(InboundMessage::MarketOrder(MarketOrderRequest {
                sender_id: agent,
                ticker: ticker.to_string(),
                side,
                quantity,
                priv_value: 100.0,
                agent_name: format!("zic_{agent}"),
            })));
    }

    pub fn cancel(&mut self, agent: u32, ticker: &str, order_id: u64, side: Side) {
        self.engine
            .process(EngineMsg::Inbound(InboundMessage::CancelOrder(CancelRequest {
                sender_id: agent,
                order_id,
                ticker: ticker.to_string(),
                side,
            })));
    }
}

/// Drain everything queued on a receiver.
pub fn drain(rx: &Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

/// Only the execution reports out of a drained message list.
pub fn reports(messages: &[OutboundMessage]) -> Vec<ExecutionReport> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            OutboundMessage::ExecutionReport(report) => Some(report.clone()),
            _ => None,
        })
        .collect()
}

/// Only the market-data snapshots out of a drained message list.
pub fn market_data(messages: &[OutboundMessage]) -> Vec<MarketData> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            OutboundMessage::MarketData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}
