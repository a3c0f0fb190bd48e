//! Trade records and the in-memory trade window used for equilibrium
//! statistics.

use crate::order::{AgentId, OrderId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Monotonic trade identifier, assigned by the matching engine.
pub type TradeId = u64;

/// Number of recent trades retained for p* and Smith's alpha. With decay
/// 0.9 per step, weights beyond this depth are below 1e-7 and contribute
/// nothing measurable.
pub const EQUILIBRIUM_WINDOW: usize = 150;

/// Exponential decay factor applied per step away from the newest trade.
const EQUILIBRIUM_DECAY: f64 = 0.9;

/// A consummated match between exactly two orders. Append-only; never
/// mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Monotonic trade id.
    pub id: TradeId,
    /// Ticker traded.
    pub ticker: String,
    /// Executed quantity.
    pub quantity: u64,
    /// Execution price (the resting order's price).
    pub price: u64,
    /// Execution timestamp, monotonic nanoseconds.
    pub timestamp_ns: u64,
    /// Buying agent.
    pub buyer_id: AgentId,
    /// Selling agent.
    pub seller_id: AgentId,
    /// Display name of the buyer.
    pub buyer_name: String,
    /// Display name of the seller.
    pub seller_name: String,
    /// The incoming order that triggered the match.
    pub aggressing_order_id: OrderId,
    /// The order that was already on the book.
    pub resting_order_id: OrderId,
    /// Buyer's private valuation.
    pub buyer_priv_value: f64,
    /// Seller's private valuation.
    pub seller_priv_value: f64,
    /// Buyer's profit on this trade: priv_value - price.
    pub buyer_profit: f64,
    /// Seller's profit on this trade: price - priv_value.
    pub seller_profit: f64,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [Trade] Id: {} {} {} @ ${} Buyer: {} Seller: {}",
            self.timestamp_ns,
            self.id,
            self.ticker,
            self.quantity,
            self.price,
            self.buyer_id,
            self.seller_id
        )
    }
}

/// Bounded in-memory window over one ticker's trade prices.
///
/// The persistent trade tape lives in the CSV sinks; this window keeps only
/// what the equilibrium statistics need. Newest trades sit at the front.
#[derive(Debug, Default)]
pub struct TradeTape {
    prices: VecDeque<f64>,
}

impl TradeTape {
    /// Create an empty window.
    pub fn new() -> Self {
        Self {
            prices: VecDeque::with_capacity(EQUILIBRIUM_WINDOW),
        }
    }

    /// Record a trade price, evicting the oldest entry once the window is
    /// full.
    pub fn record(&mut self, price: u64) {
        if self.prices.len() == EQUILIBRIUM_WINDOW {
            self.prices.pop_back();
        }
        self.prices.push_front(price as f64);
    }

    /// Number of trades currently in the window.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether no trades have been recorded.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Equilibrium price p*: exponentially weighted mean of recent trade
    /// prices with weight `0.9^i`, i = 0 at the newest trade. Returns 0.0
    /// when the window is empty.
    pub fn p_equilibrium(&self) -> f64 {
        if self.prices.is_empty() {
            return 0.0;
        }

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut weight = 1.0;
        for price in &self.prices {
            weighted_sum += price * weight;
            weight_sum += weight;
            weight *= EQUILIBRIUM_DECAY;
        }

        weighted_sum / weight_sum
    }

    /// Smith's alpha: root-mean-square deviation of the windowed trade
    /// prices from p*. A volatility proxy; 0.0 when the window is empty.
    pub fn smiths_alpha(&self) -> f64 {
        if self.prices.is_empty() {
            return 0.0;
        }

        let p_eq = self.p_equilibrium();
        let sum_squared_diff: f64 = self.prices.iter().map(|p| (p - p_eq).powi(2)).sum();

        (sum_squared_diff / self.prices.len() as f64).sqrt()
    }
}
