//! # Agent-Based Market Simulator Exchange Core
//!
//! The exchange side of an agent-based financial market simulator:
//! autonomous trading agents connect over a transport, submit limit and
//! market orders against per-ticker price-time-priority books, and receive
//! execution reports plus market-data broadcasts back.
//!
//! ## Architecture
//!
//! Three cooperating tasks per exchange:
//!
//! 1. **Transport receivers** deposit inbound messages into one bounded
//!    FIFO through a cloneable [`ExchangeHandle`].
//! 2. A single **matching engine** task drains the FIFO and owns *all*
//!    mutable state: order books, trade windows, tape writers, the
//!    id-to-name registry and the profit map. One writer means the
//!    observable event sequence per ticker is a total order, with no
//!    per-collection locking.
//! 3. A **session controller** task owns the trading-window timeline:
//!    connect phase with idle-grace admission, session open, the
//!    technical-ready timer, and the drain/end handshake at close.
//!
//! ## Matching rules
//!
//! - Price-time priority: better prices first, FIFO within a price level.
//! - Trades execute at the resting order's price, so price improvement
//!   goes to the aggressor.
//! - GTC residuals rest; IOC and market-order residuals are cancelled.
//! - Fill-or-kill orders are admitted by a non-committing walk of the
//!   opposite side and either fill in full or leave the book untouched.
//! - Self-trades are allowed, and the engine never re-clamps prices; both
//!   are properties of the simulated market, not oversights.
//!
//! ## Fan-out
//!
//! Execution reports are unicast to their originator. Market-data and
//! session events are broadcast per ticker over a snapshot copy of the
//! subscriber set, shuffled anew for every event so no subscriber keeps a
//! standing latency advantage.
//!
//! ## Artifacts
//!
//! Per (exchange, ticker, session) the engine writes CSV tapes: executed
//! trades, market-data snapshots, per-trade LOB snapshots, end-of-session
//! per-agent profits, and a message audit tape.
//!
//! ## Example
//!
//! ```no_run
//! use exchange_rs::prelude::*;
//! use std::sync::Arc;
//!
//! let config = ExchangeConfig {
//!     name: "XBTX".to_string(),
//!     tickers: vec!["X".to_string()],
//!     connect_time_ms: 1_000,
//!     trading_time_ms: 30_000,
//!     technical_ready_delay_ms: 4_000,
//!     idle_grace_ms: 5_000,
//!     queue_capacity: 4_096,
//!     rolling_window: 20,
//!     legacy_agent_prefixes: vec![],
//!     output_dir: "./out".into(),
//! };
//!
//! let transport = Arc::new(LocalTransport::new());
//! let market_data = transport.register("agent://1");
//!
//! let mut exchange = StockExchange::new(config, transport).unwrap();
//! let handle = exchange.handle();
//! exchange.start();
//!
//! handle.submit(InboundMessage::Subscribe(SubscribeRequest {
//!     sender_id: 1,
//!     ticker: "X".to_string(),
//!     endpoint: "agent://1".to_string(),
//!     agent_name: "zic_1".to_string(),
//! })).unwrap();
//!
//! // ... trade, then:
//! exchange.terminate();
//! # drop(market_data);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fabric;
pub mod messages;
pub mod net;
pub mod order;
pub mod orderbook;
pub mod session;
pub mod tape;
pub mod trade;

pub mod exchange;
pub mod prelude;
mod utils;

pub use config::ExchangeConfig;
pub use engine::MatchingEngine;
pub use error::ExchangeError;
pub use exchange::{ExchangeHandle, StockExchange};
pub use fabric::SubscriptionFabric;
pub use messages::{
    CancelRequest, ControlMessage, EngineMsg, ExecutionReport, InboundMessage, LimitOrderRequest,
    MarketOrderRequest, OutboundMessage, SessionEvent, SubscribeRequest,
};
pub use net::{LocalTransport, Transport};
pub use order::{AgentId, Order, OrderId, OrderStatus, Side, TimeInForce};
pub use orderbook::{LobSnapshot, MarketData, OrderBook};
pub use session::{SessionClock, SessionState};
pub use tape::{CsvRecord, CsvTape, ProfitSnapshot, TapeStore};
pub use trade::{Trade, TradeId, TradeTape};
pub use utils::SimClock;
