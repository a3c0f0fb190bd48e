//! Core order book: two price-time-priority sides plus the running trade
//! statistics that feed market-data snapshots.

use super::market_data::MarketData;
use super::side::BookSide;
use crate::order::{Order, OrderId, Side};
use crate::trade::Trade;
use std::collections::VecDeque;
use tracing::trace;

/// Per-ticker limit order book.
///
/// Bids are served highest price first, asks lowest price first; within a
/// price level, earlier arrivals are served first. All mutation happens on
/// the matching-engine thread, so the book itself carries no locks.
#[derive(Debug)]
pub struct OrderBook {
    ticker: String,
    bids: BookSide,
    asks: BookSide,

    /// Rolling window of recent trade prices for high/low derivation.
    window: VecDeque<u64>,
    lookback: usize,

    last_trade: Option<(u64, u64)>,
    traded_volume: u64,
    previous_traded_volume: u64,
    trade_count: u64,
}

impl OrderBook {
    /// Create an empty book for `ticker` with a rolling high/low window of
    /// `lookback` trades.
    pub fn new(ticker: &str, lookback: usize) -> Self {
        Self {
            ticker: ticker.to_string(),
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
            window: VecDeque::with_capacity(lookback),
            lookback: lookback.max(1),
            last_trade: None,
            traded_volume: 0,
            previous_traded_volume: 0,
            trade_count: 0,
        }
    }

    /// The ticker this book trades.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    fn side(&self, side: Side) -> &BookSide {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut BookSide {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    /// Rest an order on its side of the book.
    pub fn add(&mut self, order: Order) {
        trace!(
            "book {}: resting {} {} {}@{:?} (id {})",
            self.ticker,
            order.agent_name,
            order.side,
            order.remaining_quantity,
            order.price,
            order.id
        );
        self.side_mut(order.side).push(order);
    }

    /// Remove an order by id from the given side, returning it if present.
    pub fn remove(&mut self, order_id: OrderId, side: Side) -> Option<Order> {
        self.side_mut(side).remove(order_id)
    }

    /// The best resting order on `side`, if any.
    pub fn best(&self, side: Side) -> Option<&Order> {
        self.side(side).best()
    }

    /// Pop the best resting order on `side`.
    pub fn pop_best(&mut self, side: Side) -> Option<Order> {
        self.side_mut(side).pop_best()
    }

    /// Apply a fill to the best resting order on `side`, in place, keeping
    /// its queue position if partially filled. Returns the post-fill order
    /// state for the execution report.
    pub fn fill_best(&mut self, side: Side, quantity: u64, trade_price: u64) -> Order {
        self.side_mut(side).fill_best(quantity, trade_price)
    }

    /// Whether an order with `order_id` rests on `side`.
    pub fn contains(&self, order_id: OrderId, side: Side) -> bool {
        self.side(side).contains(order_id)
    }

    /// Aggregate resting quantity at the best price on `side`.
    pub fn top_size(&self, side: Side) -> u64 {
        self.side(side).top_size()
    }

    /// (bid_volume, ask_volume, bid_count, ask_count).
    pub fn totals(&self) -> (u64, u64, usize, usize) {
        (
            self.bids.volume(),
            self.asks.volume(),
            self.bids.order_count(),
            self.asks.order_count(),
        )
    }

    /// Quantity coverable on the side opposite to `aggressor_side` at
    /// prices acceptable to `limit`, capped at `target`. Pure peek; the
    /// book is not modified. Used for fill-or-kill admission.
    pub fn coverable_against(&self, aggressor_side: Side, target: u64, limit: u64) -> u64 {
        self.side(aggressor_side.opposite()).coverable(target, limit)
    }

    /// Record an executed trade in the book's running statistics: rolling
    /// high/low window, last trade, cumulative volume and trade count.
    pub fn note_trade(&mut self, trade: &Trade) {
        if self.window.len() == self.lookback {
            self.window.pop_front();
        }
        self.window.push_back(trade.price);

        self.last_trade = Some((trade.price, trade.quantity));
        self.traded_volume += trade.quantity;
        self.trade_count += 1;
    }

    /// Highest trade price over the rolling window.
    pub fn rolling_high(&self) -> Option<u64> {
        self.window.iter().max().copied()
    }

    /// Lowest trade price over the rolling window.
    pub fn rolling_low(&self) -> Option<u64> {
        self.window.iter().min().copied()
    }

    /// Mid price: (best_bid + best_ask) / 2, undefined when a side is empty.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Micro price: (best_bid * ask_size + best_ask * bid_size) /
    /// (bid_size + ask_size). Undefined when either side is empty or both
    /// top sizes are zero.
    pub fn micro_price(&self) -> Option<f64> {
        let bid = self.bids.best_price()?;
        let ask = self.asks.best_price()?;
        let bid_size = self.bids.top_size();
        let ask_size = self.asks.top_size();
        let denominator = bid_size + ask_size;
        if denominator == 0 {
            return None;
        }
        Some(
            (bid as f64 * ask_size as f64 + ask as f64 * bid_size as f64) / denominator as f64,
        )
    }

    /// Spread: best_ask - best_bid, undefined when a side is empty.
    pub fn spread(&self) -> Option<u64> {
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Book imbalance: (bid_vol - ask_vol) / (bid_vol + ask_vol). Always in
    /// [-1, 1]; 0 when both sides are empty.
    pub fn imbalance(&self) -> f64 {
        let bid_volume = self.bids.volume() as f64;
        let ask_volume = self.asks.volume() as f64;
        if bid_volume == 0.0 && ask_volume == 0.0 {
            return 0.0;
        }
        (bid_volume - ask_volume) / (bid_volume + ask_volume)
    }

    /// Derive a market-data snapshot for the event whose aggressor was on
    /// `aggressing_side`. Timestamps and equilibrium statistics are left at
    /// zero for the matching engine to fill in; everything else is computed
    /// here. Mutates the per-tick volume tracking.
    pub fn snapshot(&mut self, aggressing_side: Side) -> MarketData {
        let volume_per_tick = if self.trade_count <= 1 {
            self.traded_volume
        } else {
            self.traded_volume.saturating_sub(self.previous_traded_volume)
        };
        self.previous_traded_volume = self.traded_volume;

        MarketData {
            ticker: self.ticker.clone(),
            aggressing_side,
            best_bid: self.bids.best_price(),
            best_ask: self.asks.best_price(),
            best_bid_size: self.bids.top_size(),
            best_ask_size: self.asks.top_size(),
            bids_volume: self.bids.volume(),
            asks_volume: self.asks.volume(),
            bids_count: self.bids.order_count(),
            asks_count: self.asks.order_count(),
            last_price: self.last_trade.map(|(price, _)| price),
            last_quantity: self.last_trade.map(|(_, quantity)| quantity).unwrap_or(0),
            high_price: self.rolling_high(),
            low_price: self.rolling_low(),
            volume_per_tick,
            cumulative_volume: self.traded_volume,
            trades_count: self.trade_count,
            mid_price: self.mid_price(),
            micro_price: self.micro_price(),
            spread: self.spread(),
            imbalance: self.imbalance(),
            total_volume: self.bids.volume() + self.asks.volume(),
            timestamp_ms: 0,
            time_diff_ms: 0,
            p_equilibrium: 0.0,
            smiths_alpha: 0.0,
        }
    }

    /// Check every book invariant from scratch. Used by debug assertions
    /// after each engine step; a `false` here is a programming bug.
    pub fn validate(&self) -> bool {
        if !self.bids.validate() || !self.asks.validate() {
            return false;
        }
        // A crossed book (best_bid >= best_ask) means matching missed a cross.
        match (self.bids.best_price(), self.asks.best_price()) {
            (Some(bid), Some(ask)) => bid < ask,
            _ => true,
        }
    }
}
