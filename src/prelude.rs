//! Prelude module that re-exports the commonly used exchange types.
//!
//! ```rust
//! use exchange_rs::prelude::*;
//! ```

// Exchange wiring
pub use crate::config::ExchangeConfig;
pub use crate::error::ExchangeError;
pub use crate::exchange::{ExchangeHandle, StockExchange};

// Engine and book
pub use crate::engine::MatchingEngine;
pub use crate::orderbook::{LobSnapshot, MarketData, OrderBook};

// Domain types
pub use crate::order::{AgentId, Order, OrderId, OrderStatus, Side, TimeInForce};
pub use crate::trade::{Trade, TradeId, TradeTape};

// Messaging
pub use crate::messages::{
    CancelRequest, ExecutionReport, InboundMessage, LimitOrderRequest, MarketOrderRequest,
    OutboundMessage, SessionEvent, SubscribeRequest,
};

// Session and fan-out
pub use crate::fabric::SubscriptionFabric;
pub use crate::net::{LocalTransport, Transport};
pub use crate::session::{SessionClock, SessionState};

// Tapes
pub use crate::tape::{CsvRecord, CsvTape, ProfitSnapshot, TapeStore};
