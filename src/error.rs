//! Exchange error types

use crate::order::{AgentId, OrderId};
use thiserror::Error;

/// Errors surfaced by the exchange core.
///
/// Transport and sink failures are recoverable by design: the engine logs
/// them and continues, since the next event restores state visibility and
/// tape durability is not a correctness requirement of the matching core.
/// Order-book invariant violations are programming bugs and panic instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// A subscribe or order referenced a ticker the exchange does not list.
    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    /// An order failed validation before reaching the book.
    #[error("malformed order from agent {sender_id}: {reason}")]
    MalformedOrder {
        /// The submitting agent.
        sender_id: AgentId,
        /// Why the order was refused.
        reason: String,
    },

    /// A cancel referenced an order that is not resting on the book.
    #[error("cancel miss: order {order_id} not resting on {ticker}")]
    CancelMiss {
        /// The order id the cancel referenced.
        order_id: OrderId,
        /// The ticker the cancel referenced.
        ticker: String,
    },

    /// The trading session is not open for the attempted operation.
    #[error("trading session closed")]
    SessionClosed,

    /// The inbound queue has been closed; the engine is gone.
    #[error("inbound queue closed")]
    QueueClosed,

    /// A unicast or broadcast send failed. Never retried.
    #[error("transport failure to {endpoint}: {reason}")]
    Transport {
        /// Destination endpoint.
        endpoint: String,
        /// Underlying failure description.
        reason: String,
    },

    /// A tape write failed. The engine keeps matching.
    #[error("tape sink failure: {0}")]
    Sink(String),

    /// Configuration could not be loaded or was inconsistent.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error creating tape files or directories.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
