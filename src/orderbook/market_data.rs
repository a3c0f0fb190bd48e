//! Derived market-data views published to subscribers and written to tape.

use crate::order::Side;
use serde::{Deserialize, Serialize};

/// A per-event snapshot of one ticker's market state.
///
/// Produced by [`super::OrderBook::snapshot`] and completed by the matching
/// engine (timestamps and equilibrium statistics, which need engine-owned
/// state). Fields that depend on an empty book side are `None` and are
/// serialized as `-1` sentinels in the CSV artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    /// Ticker this snapshot describes.
    pub ticker: String,
    /// Side of the event that produced the snapshot.
    pub aggressing_side: Side,
    /// Best bid price, if any bids rest.
    pub best_bid: Option<u64>,
    /// Best ask price, if any asks rest.
    pub best_ask: Option<u64>,
    /// Aggregate resting quantity at the best bid.
    pub best_bid_size: u64,
    /// Aggregate resting quantity at the best ask.
    pub best_ask_size: u64,
    /// Total resting quantity on the bid side.
    pub bids_volume: u64,
    /// Total resting quantity on the ask side.
    pub asks_volume: u64,
    /// Number of resting bid orders.
    pub bids_count: usize,
    /// Number of resting ask orders.
    pub asks_count: usize,
    /// Price of the last trade, if any.
    pub last_price: Option<u64>,
    /// Quantity of the last trade, 0 if none.
    pub last_quantity: u64,
    /// Highest trade price over the rolling window.
    pub high_price: Option<u64>,
    /// Lowest trade price over the rolling window.
    pub low_price: Option<u64>,
    /// Quantity traded since the previous snapshot.
    pub volume_per_tick: u64,
    /// Total quantity traded this session.
    pub cumulative_volume: u64,
    /// Number of trades this session.
    pub trades_count: u64,
    /// (best_bid + best_ask) / 2; `None` when either side is empty.
    pub mid_price: Option<f64>,
    /// Size-weighted top-of-book price, biased toward the heavier side;
    /// `None` when either side is empty or top sizes are zero.
    pub micro_price: Option<f64>,
    /// best_ask - best_bid; `None` when either side is empty.
    pub spread: Option<u64>,
    /// (bid_vol - ask_vol) / (bid_vol + ask_vol), in [-1, 1]; 0 on an
    /// empty book.
    pub imbalance: f64,
    /// bids_volume + asks_volume.
    pub total_volume: u64,
    /// Milliseconds since the trading session opened.
    pub timestamp_ms: u64,
    /// Milliseconds since the previous trade on this ticker; 0 if none.
    pub time_diff_ms: u64,
    /// Equilibrium price p* over the recent trade window.
    pub p_equilibrium: f64,
    /// Smith's alpha over the same window.
    pub smiths_alpha: f64,
}

/// A compressed book snapshot written once per executed trade, pairing the
/// book state with the aggressor's chosen limit price and the realized
/// trade price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobSnapshot {
    /// Ticker this snapshot describes.
    pub ticker: String,
    /// 1 when the aggressor was a bid, 0 when an ask.
    pub side: u8,
    /// Milliseconds since the trading session opened.
    pub timestamp_ms: u64,
    /// Milliseconds since the previous trade on this ticker; 0 for the
    /// first trade.
    pub time_diff_ms: u64,
    /// Best bid price, if any.
    pub best_bid: Option<u64>,
    /// Best ask price, if any.
    pub best_ask: Option<u64>,
    /// Micro price, if defined.
    pub micro_price: Option<f64>,
    /// Mid price, if defined.
    pub mid_price: Option<f64>,
    /// Book imbalance in [-1, 1].
    pub imbalance: f64,
    /// Spread, if defined.
    pub spread: Option<u64>,
    /// Total resting quantity across both sides.
    pub total_volume: u64,
    /// Equilibrium price p*.
    pub p_equilibrium: f64,
    /// Smith's alpha.
    pub smiths_alpha: f64,
    /// Limit price chosen by the aggressor (trade price for market orders).
    pub limit_price_chosen: f64,
    /// Realized trade price.
    pub trade_price: f64,
}

impl LobSnapshot {
    /// Build a LOB snapshot from a market-data view plus the trade context.
    pub fn from_market_data(data: &MarketData, limit_price_chosen: f64, trade_price: f64) -> Self {
        Self {
            ticker: data.ticker.clone(),
            side: match data.aggressing_side {
                Side::Bid => 1,
                Side::Ask => 0,
            },
            timestamp_ms: data.timestamp_ms,
            time_diff_ms: data.time_diff_ms,
            best_bid: data.best_bid,
            best_ask: data.best_ask,
            micro_price: data.micro_price,
            mid_price: data.mid_price,
            imbalance: data.imbalance,
            spread: data.spread,
            total_volume: data.total_volume,
            p_equilibrium: data.p_equilibrium,
            smiths_alpha: data.smiths_alpha,
            limit_price_chosen,
            trade_price,
        }
    }
}
