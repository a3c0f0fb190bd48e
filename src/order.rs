//! Order model: sides, time-in-force, status progression and fill arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonic order identifier, assigned by the matching engine on acceptance.
pub type OrderId = u64;

/// Identifier of a trading agent, assigned by the simulator.
pub type AgentId = u32;

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side.
    Bid,
    /// Sell side.
    Ask,
}

impl Side {
    /// The opposite side of the book.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => write!(f, "BID"),
            Side::Ask => write!(f, "ASK"),
        }
    }
}

/// Time-in-force policy of a limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled: any unfilled remainder rests on the book.
    Gtc,
    /// Immediate-or-cancel: any unfilled remainder is cancelled.
    Ioc,
    /// Fill-or-kill: executes in full or not at all, never partially.
    Fok,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

/// Lifecycle status of an order.
///
/// Transitions are monotonic along `New -> PartiallyFilled -> (Filled |
/// Cancelled)`; `Rejected` is terminal and only ever set on orders that
/// failed validation before reaching a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted, no fills yet.
    New,
    /// At least one fill, remaining quantity outstanding.
    PartiallyFilled,
    /// Fully executed.
    Filled,
    /// Cancelled with remaining quantity outstanding.
    Cancelled,
    /// Refused before reaching the book.
    Rejected,
}

impl OrderStatus {
    fn rank(self) -> u8 {
        match self {
            OrderStatus::New => 0,
            OrderStatus::PartiallyFilled => 1,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected => 2,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{s}")
    }
}

/// A submitted order instruction, limit or market.
///
/// `price` is `None` for market orders. `priv_value` is the submitter's
/// private valuation, carried only for per-fill profit attribution; the
/// matching engine never prices off it.
///
/// Invariant: `original_quantity == remaining_quantity + cumulative_quantity`
/// at all times. `avg_price` is meaningful iff `cumulative_quantity > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Engine-assigned monotonic id.
    pub id: OrderId,
    /// Client-supplied correlation id.
    pub client_order_id: u64,
    /// Submitting agent.
    pub sender_id: AgentId,
    /// Display name of the submitting agent.
    pub agent_name: String,
    /// Ticker the order trades.
    pub ticker: String,
    /// Bid or ask.
    pub side: Side,
    /// Quantity at submission.
    pub original_quantity: u64,
    /// Quantity still unexecuted.
    pub remaining_quantity: u64,
    /// Quantity executed so far.
    pub cumulative_quantity: u64,
    /// Volume-weighted average fill price; 0.0 until the first fill.
    pub avg_price: f64,
    /// Limit price; `None` for market orders.
    pub price: Option<u64>,
    /// Private valuation used for profit attribution.
    pub priv_value: f64,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Submission timestamp, monotonic nanoseconds.
    pub timestamp_ns: u64,
}

impl Order {
    /// Build a limit order in `New` state.
    #[allow(clippy::too_many_arguments)]
    pub fn new_limit(
        id: OrderId,
        client_order_id: u64,
        sender_id: AgentId,
        agent_name: String,
        ticker: String,
        side: Side,
        quantity: u64,
        price: u64,
        priv_value: f64,
        time_in_force: TimeInForce,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            id,
            client_order_id,
            sender_id,
            agent_name,
            ticker,
            side,
            original_quantity: quantity,
            remaining_quantity: quantity,
            cumulative_quantity: 0,
            avg_price: 0.0,
            price: Some(price),
            priv_value,
            time_in_force,
            status: OrderStatus::New,
            timestamp_ns,
        }
    }

    /// Build a market order in `New` state. Market orders behave as
    /// immediate-or-cancel: any unfilled remainder is cancelled.
    #[allow(clippy::too_many_arguments)]
    pub fn new_market(
        id: OrderId,
        sender_id: AgentId,
        agent_name: String,
        ticker: String,
        side: Side,
        quantity: u64,
        priv_value: f64,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            id,
            client_order_id: 0,
            sender_id,
            agent_name,
            ticker,
            side,
            original_quantity: quantity,
            remaining_quantity: quantity,
            cumulative_quantity: 0,
            avg_price: 0.0,
            price: None,
            priv_value,
            time_in_force: TimeInForce::Ioc,
            status: OrderStatus::New,
            timestamp_ns,
        }
    }

    /// Whether the order has no remaining quantity.
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Whether this order, as the aggressor, crosses a resting order at
    /// `opposite_price`. Market orders cross anything.
    pub fn crosses(&self, opposite_price: u64) -> bool {
        match (self.price, self.side) {
            (None, _) => true,
            (Some(limit), Side::Bid) => limit >= opposite_price,
            (Some(limit), Side::Ask) => limit <= opposite_price,
        }
    }

    /// Apply a fill of `quantity` at `price` to this order, updating the
    /// running volume-weighted average price, the quantity split and the
    /// status.
    pub fn apply_fill(&mut self, quantity: u64, price: u64) {
        debug_assert!(quantity > 0 && quantity <= self.remaining_quantity);

        let prior = self.cumulative_quantity as f64;
        let filled = quantity as f64;
        self.avg_price = (prior * self.avg_price + filled * price as f64) / (prior + filled);

        self.cumulative_quantity += quantity;
        self.remaining_quantity -= quantity;

        if self.remaining_quantity == 0 {
            self.set_status(OrderStatus::Filled);
        } else {
            self.set_status(OrderStatus::PartiallyFilled);
        }
    }

    /// Advance the lifecycle status. Status progression is monotonic;
    /// stepping backwards is a programming bug.
    pub fn set_status(&mut self, status: OrderStatus) {
        debug_assert!(
            status.rank() >= self.status.rank(),
            "status regression {} -> {} on order {}",
            self.status,
            status,
            self.id
        );
        self.status = status;
    }
}
