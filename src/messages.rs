//! Wire-content message types exchanged with trading agents.
//!
//! Framing is the transport's concern; these types define content only and
//! are `serde`-serializable for whichever codec the transport applies.

use crate::order::{AgentId, Order, OrderId, Side, TimeInForce};
use crate::orderbook::MarketData;
use crate::trade::Trade;
use serde::{Deserialize, Serialize};

/// Request to receive market-data and event broadcasts for one ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Subscribing agent.
    pub sender_id: AgentId,
    /// Ticker to subscribe to.
    pub ticker: String,
    /// Callback endpoint broadcasts are delivered to.
    pub endpoint: String,
    /// Display name recorded for per-fill attribution.
    pub agent_name: String,
}

/// A limit order submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    /// Submitting agent.
    pub sender_id: AgentId,
    /// Client-side correlation id, echoed on reports.
    pub client_order_id: u64,
    /// Ticker to trade.
    pub ticker: String,
    /// Bid or ask.
    pub side: Side,
    /// Quantity to trade.
    pub quantity: u64,
    /// Limit price. Submitters clamp to the domain range; the exchange
    /// does not re-clamp.
    pub price: u64,
    /// Private valuation for profit attribution.
    pub priv_value: f64,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Display name of the submitting agent.
    pub agent_name: String,
}

/// A market order submission. Executes greedily against the opposite side;
/// any residual is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOrderRequest {
    /// Submitting agent.
    pub sender_id: AgentId,
    /// Ticker to trade.
    pub ticker: String,
    /// Bid or ask.
    pub side: Side,
    /// Quantity to trade.
    pub quantity: u64,
    /// Private valuation for profit attribution.
    pub priv_value: f64,
    /// Display name of the submitting agent.
    pub agent_name: String,
}

/// Request to cancel a resting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    /// Requesting agent.
    pub sender_id: AgentId,
    /// Exchange-assigned id of the order to cancel.
    pub order_id: OrderId,
    /// Ticker the order rests on.
    pub ticker: String,
    /// Side the order rests on.
    pub side: Side,
}

/// Messages agents send to the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InboundMessage {
    /// Market-data subscription request.
    Subscribe(SubscribeRequest),
    /// Limit order submission.
    LimitOrder(LimitOrderRequest),
    /// Market order submission.
    MarketOrder(MarketOrderRequest),
    /// Cancel request.
    CancelOrder(CancelRequest),
}

impl InboundMessage {
    /// Short wire name of the message kind, used on the audit tape.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Subscribe(_) => "SUBSCRIBE",
            InboundMessage::LimitOrder(_) => "LIMIT_ORDER",
            InboundMessage::MarketOrder(_) => "MARKET_ORDER",
            InboundMessage::CancelOrder(_) => "CANCEL_ORDER",
        }
    }
}

/// Session lifecycle events broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Trading window opened.
    TradingSessionStart,
    /// Trading window closed and the engine has drained.
    TradingSessionEnd,
    /// Technical-indicator agents may begin trading.
    TechnicalAgentsStarted,
    /// Order-injection phase begins. Understood by agents; the core
    /// currently never emits it.
    OrderInjectionStart,
}

/// Report of an order's current state, unicast to its submitter after
/// every transition the engine applies to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Post-transition state of the order.
    pub order: Order,
    /// The trade this report describes, present iff it represents a fill.
    pub trade: Option<Trade>,
}

impl ExecutionReport {
    /// Report a non-fill transition (accept, cancel, reject).
    pub fn of_order(order: Order) -> Self {
        Self { order, trade: None }
    }

    /// Report a fill: the post-fill order state plus the trade.
    pub fn of_fill(order: Order, trade: Trade) -> Self {
        Self {
            order,
            trade: Some(trade),
        }
    }
}

/// Messages the exchange sends to agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundMessage {
    /// Unicast order-state report.
    ExecutionReport(ExecutionReport),
    /// Unicast refusal of a cancel that matched no resting order.
    CancelReject {
        /// The order id the cancel referenced.
        order_id: OrderId,
    },
    /// Broadcast session lifecycle event.
    Event(SessionEvent),
    /// Broadcast market-data snapshot.
    MarketData(MarketData),
}

/// Control messages the session controller injects into the engine queue.
#[derive(Debug, Clone, Copy)]
pub enum ControlMessage {
    /// The technical-ready timer fired: reset legacy profits and broadcast
    /// `TECHNICAL_AGENTS_STARTED`.
    TechnicalReady,
    /// The trading window closed: drain the queue, refusing what remains,
    /// then stop.
    Drain,
}

/// Everything the matching engine consumes from its inbound FIFO.
#[derive(Debug, Clone)]
pub enum EngineMsg {
    /// A transport message from an agent.
    Inbound(InboundMessage),
    /// A session-controller control message.
    Control(ControlMessage),
}
