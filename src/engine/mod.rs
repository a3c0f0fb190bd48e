//! The matching engine: single consumer of the inbound message queue and
//! sole owner of all book, tape, name and profit state.
//!
//! Every observable event for a ticker — accept, cancel, trade, snapshot —
//! is produced by this one task, so the sequence of events per ticker is a
//! total order. Other tasks communicate with the engine exclusively by
//! enqueueing [`EngineMsg`] values.

mod matching;

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::fabric::SubscriptionFabric;
use crate::messages::{
    CancelRequest, ControlMessage, EngineMsg, ExecutionReport, InboundMessage, LimitOrderRequest,
    MarketOrderRequest, OutboundMessage, SessionEvent, SubscribeRequest,
};
use crate::order::{AgentId, Order, OrderId, OrderStatus, Side};
use crate::orderbook::{MarketData, OrderBook};
use crate::session::{SessionClock, SessionState};
use crate::tape::{MessageRecord, ProfitSnapshot, TapeStore};
use crate::trade::{TradeId, TradeTape};
use crate::utils::SimClock;
use crossbeam::channel::Receiver;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Single-consumer matching engine for one exchange.
pub struct MatchingEngine {
    exchange_name: String,
    books: HashMap<String, OrderBook>,
    windows: HashMap<String, TradeTape>,
    tapes: TapeStore,
    /// Display names recorded from subscribe messages, used for per-fill
    /// attribution. Populated exclusively by this task.
    names: HashMap<AgentId, String>,
    /// Realized profit per display name. Only fills move it.
    profits: HashMap<String, f64>,
    last_trade_ns: HashMap<String, u64>,
    fabric: Arc<SubscriptionFabric>,
    session: Arc<SessionClock>,
    clock: Arc<SimClock>,
    legacy_prefixes: Vec<String>,
    next_order_id: OrderId,
    next_trade_id: TradeId,
}

impl MatchingEngine {
    /// Build an engine with one empty book per configured ticker.
    pub fn new(
        config: &ExchangeConfig,
        tapes: TapeStore,
        fabric: Arc<SubscriptionFabric>,
        session: Arc<SessionClock>,
        clock: Arc<SimClock>,
    ) -> Self {
        let books = config
            .tickers
            .iter()
            .map(|ticker| (ticker.clone(), OrderBook::new(ticker, config.rolling_window)))
            .collect();
        let windows = config
            .tickers
            .iter()
            .map(|ticker| (ticker.clone(), TradeTape::new()))
            .collect();

        Self {
            exchange_name: config.name.clone(),
            books,
            windows,
            tapes,
            names: HashMap::new(),
            profits: HashMap::new(),
            last_trade_ns: HashMap::new(),
            fabric,
            session,
            clock,
            legacy_prefixes: config.legacy_agent_prefixes.clone(),
            next_order_id: 1,
            next_trade_id: 1,
        }
    }

    /// Drain the queue until the session controller's drain sentinel
    /// arrives, then refuse whatever is still queued and stop.
    pub fn run(&mut self, rx: &Receiver<EngineMsg>) {
        info!("{}: matching engine started", self.exchange_name);
        while let Ok(msg) = rx.recv() {
            if matches!(msg, EngineMsg::Control(ControlMessage::Drain)) {
                self.drain(rx);
                break;
            }
            self.process(msg);
        }
        info!("{}: matching engine stopped", self.exchange_name);
    }

    /// Apply exactly one message. All gating on the session state happens
    /// here: orders before the window opens are ignored, orders after it
    /// closes are refused with a reject report.
    pub fn process(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::Inbound(inbound) => {
                if let Some(record) = MessageRecord::from_inbound(&inbound, self.clock.now_ns()) {
                    self.tapes.messages_mut().append(&record);
                }
                match inbound {
                    InboundMessage::Subscribe(req) => self.on_subscribe(req),
                    InboundMessage::LimitOrder(req) => match self.session.state() {
                        SessionState::TradingOpen => self.on_limit_order(req),
                        SessionState::TradingClosed => self.refuse_limit_order(req),
                        _ => debug!("limit order from {} before session open ignored", req.sender_id),
                    },
                    InboundMessage::MarketOrder(req) => match self.session.state() {
                        SessionState::TradingOpen => self.on_market_order(req),
                        SessionState::TradingClosed => self.refuse_market_order(req),
                        _ => debug!("market order from {} before session open ignored", req.sender_id),
                    },
                    InboundMessage::CancelOrder(req) => match self.session.state() {
                        SessionState::TradingOpen => self.on_cancel_order(req),
                        SessionState::TradingClosed => self.reject_cancel(&req),
                        _ => debug!("cancel from {} before session open ignored", req.sender_id),
                    },
                }
            }
            EngineMsg::Control(ControlMessage::TechnicalReady) => self.on_technical_ready(),
            EngineMsg::Control(ControlMessage::Drain) => {
                // Reached only when process() is driven directly; run()
                // intercepts the sentinel before dispatch.
                debug!("drain sentinel outside run loop ignored");
            }
        }

        #[cfg(debug_assertions)]
        self.assert_invariants();
    }

    /// Refuse everything still queued after session close, then return.
    fn drain(&mut self, rx: &Receiver<EngineMsg>) {
        debug!("draining inbound queue: {}", ExchangeError::SessionClosed);
        while let Ok(msg) = rx.try_recv() {
            if let EngineMsg::Inbound(inbound) = msg {
                if let Some(record) = MessageRecord::from_inbound(&inbound, self.clock.now_ns()) {
                    self.tapes.messages_mut().append(&record);
                }
                match inbound {
                    InboundMessage::Subscribe(req) => {
                        warn!("subscribe from {} after session end ignored", req.sender_id);
                    }
                    InboundMessage::LimitOrder(req) => self.refuse_limit_order(req),
                    InboundMessage::MarketOrder(req) => self.refuse_market_order(req),
                    InboundMessage::CancelOrder(req) => self.reject_cancel(&req),
                }
            }
        }
    }

    /// Register a subscriber. A late joiner during the open window receives
    /// a targeted session-start so it learns the session state.
    fn on_subscribe(&mut self, req: SubscribeRequest) {
        match self.fabric.subscribe(&req.ticker, req.sender_id, &req.endpoint) {
            Ok(_) => {
                self.names.insert(req.sender_id, req.agent_name.clone());
                if self.session.is_open() {
                    self.fabric.send_to_endpoint(
                        &req.endpoint,
                        &OutboundMessage::Event(SessionEvent::TradingSessionStart),
                    );
                }
            }
            Err(e) => warn!("subscribe refused: {e}"),
        }
    }

    fn on_limit_order(&mut self, req: LimitOrderRequest) {
        if let Err(e) = self.validate(&req.ticker, req.quantity, req.sender_id) {
            warn!("limit order refused: {e}");
            self.refuse_limit_order(req);
            return;
        }

        let order = Order::new_limit(
            self.allocate_order_id(),
            req.client_order_id,
            req.sender_id,
            req.agent_name,
            req.ticker,
            req.side,
            req.quantity,
            req.price,
            req.priv_value,
            req.time_in_force,
            self.clock.now_ns(),
        );
        self.match_limit_order(order);
    }

    fn on_market_order(&mut self, req: MarketOrderRequest) {
        if let Err(e) = self.validate(&req.ticker, req.quantity, req.sender_id) {
            warn!("market order refused: {e}");
            self.refuse_market_order(req);
            return;
        }

        let order = Order::new_market(
            self.allocate_order_id(),
            req.sender_id,
            req.agent_name,
            req.ticker,
            req.side,
            req.quantity,
            req.priv_value,
            self.clock.now_ns(),
        );
        // Market orders sweep the opposite side greedily and cancel any
        // residual; that is exactly the IOC matching path.
        self.match_order(order);
    }

    fn on_cancel_order(&mut self, req: CancelRequest) {
        let Some(book) = self.books.get_mut(&req.ticker) else {
            warn!("cancel for unknown ticker {}", req.ticker);
            self.reject_cancel(&req);
            return;
        };

        match book.remove(req.order_id, req.side) {
            Some(mut order) => {
                order.set_status(OrderStatus::Cancelled);
                self.fabric.unicast(
                    order.sender_id,
                    &OutboundMessage::ExecutionReport(ExecutionReport::of_order(order)),
                );
                // Removing a resting order can move the top of book.
                self.publish_market_data(&req.ticker, req.side);
            }
            None => {
                let miss = ExchangeError::CancelMiss {
                    order_id: req.order_id,
                    ticker: req.ticker.clone(),
                };
                debug!("{miss}");
                self.reject_cancel(&req);
            }
        }
    }

    /// Technical-ready: reset legacy agents' profits and broadcast the
    /// start signal to every ticker's subscribers.
    fn on_technical_ready(&mut self) {
        let mut reset = 0usize;
        for (name, profit) in self.profits.iter_mut() {
            if self.legacy_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str())) {
                *profit = 0.0;
                reset += 1;
            }
        }
        info!("technical agents started; reset {reset} legacy profit entries");
        self.fabric
            .broadcast_all(&OutboundMessage::Event(SessionEvent::TechnicalAgentsStarted));
    }

    /// Write the session-end artifacts: per-agent profits sorted by profit
    /// descending into every ticker's profit tape, then flush everything.
    pub fn finalize(&mut self) {
        let mut sorted: Vec<ProfitSnapshot> = self
            .profits
            .iter()
            .map(|(agent_name, profit)| ProfitSnapshot {
                agent_name: agent_name.clone(),
                profit: *profit,
            })
            .collect();
        sorted.sort_by(|a, b| b.profit.total_cmp(&a.profit));

        for snapshot in &sorted {
            info!("{}: profit {}", snapshot.agent_name, snapshot.profit);
        }

        for ticker in self.fabric.tickers() {
            if let Some(tapes) = self.tapes.ticker_tapes_mut(&ticker) {
                for snapshot in &sorted {
                    tapes.profits.append(snapshot);
                }
            }
        }
        self.tapes.flush_all();
    }

    // --- helpers ---

    fn allocate_order_id(&mut self) -> OrderId {
        let id = self.next_order_id;
        self.next_order_id += 1;
        id
    }

    fn validate(&self, ticker: &str, quantity: u64, sender_id: AgentId) -> Result<(), ExchangeError> {
        if !self.books.contains_key(ticker) {
            return Err(ExchangeError::UnknownTicker(ticker.to_string()));
        }
        if quantity == 0 {
            return Err(ExchangeError::MalformedOrder {
                sender_id,
                reason: "quantity must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Display name for attribution: the subscribe-registered name wins,
    /// falling back to the name carried on the order itself.
    fn resolve_name(&self, sender_id: AgentId, fallback: &str) -> String {
        self.names
            .get(&sender_id)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    /// Refused orders never receive an id; they are reported back with
    /// id 0 and `Rejected` status.
    fn refuse_limit_order(&mut self, req: LimitOrderRequest) {
        let mut order = Order::new_limit(
            0,
            req.client_order_id,
            req.sender_id,
            req.agent_name,
            req.ticker,
            req.side,
            req.quantity,
            req.price,
            req.priv_value,
            req.time_in_force,
            self.clock.now_ns(),
        );
        order.set_status(OrderStatus::Rejected);
        self.fabric.unicast(
            req.sender_id,
            &OutboundMessage::ExecutionReport(ExecutionReport::of_order(order)),
        );
    }

    fn refuse_market_order(&mut self, req: MarketOrderRequest) {
        let mut order = Order::new_market(
            0,
            req.sender_id,
            req.agent_name,
            req.ticker,
            req.side,
            req.quantity,
            req.priv_value,
            self.clock.now_ns(),
        );
        order.set_status(OrderStatus::Rejected);
        self.fabric.unicast(
            req.sender_id,
            &OutboundMessage::ExecutionReport(ExecutionReport::of_order(order)),
        );
    }

    fn reject_cancel(&self, req: &CancelRequest) {
        self.fabric.unicast(
            req.sender_id,
            &OutboundMessage::CancelReject {
                order_id: req.order_id,
            },
        );
    }

    /// Derive, stamp, tape and broadcast a market-data snapshot for
    /// `ticker`. Called after every event that changed book state.
    fn publish_market_data(&mut self, ticker: &str, aggressing_side: Side) {
        let data = self.market_snapshot(ticker, aggressing_side);
        self.publish(data);
    }

    /// Build a fully stamped snapshot: book-derived fields plus the
    /// engine-owned timestamps and equilibrium statistics.
    fn market_snapshot(&mut self, ticker: &str, aggressing_side: Side) -> MarketData {
        let now = self.clock.now_ns();
        let book = self.books.get_mut(ticker).expect("snapshot for listed ticker");
        let mut data = book.snapshot(aggressing_side);

        data.timestamp_ms = self.clock.session_elapsed_ms();
        data.time_diff_ms = self
            .last_trade_ns
            .get(ticker)
            .map(|prev| now.saturating_sub(*prev) / 1_000_000)
            .unwrap_or(0);

        let window = self.windows.get(ticker).expect("window for listed ticker");
        data.p_equilibrium = window.p_equilibrium();
        data.smiths_alpha = window.smiths_alpha();
        data
    }

    fn publish(&mut self, data: MarketData) {
        if let Some(tapes) = self.tapes.ticker_tapes_mut(&data.ticker) {
            tapes.market_data.append(&data);
        }
        let ticker = data.ticker.clone();
        self.fabric.broadcast(&ticker, &OutboundMessage::MarketData(data));
    }

    // --- test and inspection access ---

    /// The order book for `ticker`, if listed.
    pub fn book(&self, ticker: &str) -> Option<&OrderBook> {
        self.books.get(ticker)
    }

    /// Realized profits by display name.
    pub fn profits(&self) -> &HashMap<String, f64> {
        &self.profits
    }

    #[cfg(debug_assertions)]
    fn assert_invariants(&self) {
        for (ticker, book) in &self.books {
            assert!(book.validate(), "order book invariant violated for {ticker}");
        }
    }
}
