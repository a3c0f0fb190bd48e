//! One side of a limit order book: an ordered map of price levels, each a
//! FIFO queue of resting orders.

use crate::order::{Order, OrderId, Side};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A single price level: resting orders in arrival order plus their
/// aggregate remaining quantity.
#[derive(Debug, Default)]
struct PriceLevel {
    queue: VecDeque<Order>,
    size: u64,
}

/// One side of the book.
///
/// Levels are keyed by price in a `BTreeMap`, so the best price is the last
/// key for bids and the first key for asks: O(log N) insertion and
/// best-removal, O(1) peek within a level. An `id -> price` index makes
/// remove-by-id a level-local scan instead of a book-wide search.
///
/// Invariants: every resting order has `remaining_quantity > 0`; the sum of
/// level sizes equals `volume`; `order_count` equals the number of resting
/// orders.
#[derive(Debug)]
pub struct BookSide {
    side: Side,
    levels: BTreeMap<u64, PriceLevel>,
    index: HashMap<OrderId, u64>,
    volume: u64,
    order_count: usize,
}

impl BookSide {
    /// Create an empty side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            index: HashMap::new(),
            volume: 0,
            order_count: 0,
        }
    }

    /// Which side this is.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Total resting quantity on this side.
    pub fn volume(&self) -> u64 {
        self.volume
    }

    /// Number of resting orders on this side.
    pub fn order_count(&self) -> usize {
        self.order_count
    }

    /// Whether no orders rest on this side.
    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    /// Aggregate remaining quantity at `price`, 0 if the level is absent.
    pub fn size_at(&self, price: u64) -> u64 {
        self.levels.get(&price).map(|level| level.size).unwrap_or(0)
    }

    /// Price of the best level, if any: highest for bids, lowest for asks.
    pub fn best_price(&self) -> Option<u64> {
        match self.side {
            Side::Bid => self.levels.last_key_value().map(|(price, _)| *price),
            Side::Ask => self.levels.first_key_value().map(|(price, _)| *price),
        }
    }

    /// Aggregate remaining quantity at the best price level.
    pub fn top_size(&self) -> u64 {
        self.best_price().map(|p| self.size_at(p)).unwrap_or(0)
    }

    /// The order at the head of the best price level, if any.
    pub fn best(&self) -> Option<&Order> {
        let price = self.best_price()?;
        self.levels.get(&price).and_then(|level| level.queue.front())
    }

    /// Rest an order on this side. The order joins the tail of its price
    /// level's queue (arrival order within a level is service order).
    ///
    /// Panics if the order has no limit price or zero remaining quantity;
    /// both are validated upstream and constitute bugs here.
    pub fn push(&mut self, order: Order) {
        let price = order.price.expect("resting order must carry a limit price");
        assert!(order.remaining_quantity > 0, "resting order must have quantity");

        let level = self.levels.entry(price).or_default();
        level.size += order.remaining_quantity;
        self.volume += order.remaining_quantity;
        self.order_count += 1;
        self.index.insert(order.id, price);
        level.queue.push_back(order);
    }

    /// Remove an order by id, returning it if it was resting here.
    pub fn remove(&mut self, order_id: OrderId) -> Option<Order> {
        let price = *self.index.get(&order_id)?;
        let level = self.levels.get_mut(&price)?;
        let pos = level.queue.iter().position(|o| o.id == order_id)?;
        let order = level.queue.remove(pos)?;
        self.index.remove(&order_id);

        level.size -= order.remaining_quantity;
        self.volume -= order.remaining_quantity;
        self.order_count -= 1;
        if level.queue.is_empty() {
            self.levels.remove(&price);
        }
        Some(order)
    }

    /// Pop the order at the head of the best price level.
    pub fn pop_best(&mut self) -> Option<Order> {
        let price = self.best_price()?;
        let level = self.levels.get_mut(&price)?;
        let order = level.queue.pop_front()?;

        level.size -= order.remaining_quantity;
        self.volume -= order.remaining_quantity;
        self.order_count -= 1;
        self.index.remove(&order.id);
        if level.queue.is_empty() {
            self.levels.remove(&price);
        }
        Some(order)
    }

    /// Apply a fill of `quantity` at `trade_price` to the order at the head
    /// of the best level, in place. A partially filled order keeps its
    /// queue position, so time priority within the level is preserved.
    /// Returns the post-fill state of the resting order.
    pub fn fill_best(&mut self, quantity: u64, trade_price: u64) -> Order {
        let price = self.best_price().expect("fill_best on empty side");
        let level = self.levels.get_mut(&price).expect("best level must exist");
        let head = level.queue.front_mut().expect("best level must be non-empty");

        head.apply_fill(quantity, trade_price);
        level.size -= quantity;
        self.volume -= quantity;

        let snapshot = head.clone();
        if head.remaining_quantity == 0 {
            level.queue.pop_front();
            self.order_count -= 1;
            self.index.remove(&snapshot.id);
            if level.queue.is_empty() {
                self.levels.remove(&price);
            }
        }
        snapshot
    }

    /// Whether an order with `order_id` rests on this side.
    pub fn contains(&self, order_id: OrderId) -> bool {
        self.index.contains_key(&order_id)
    }

    /// Walk resting quantity in service order, peeking without mutation.
    /// Used by fill-or-kill coverage checks: returns the quantity coverable
    /// against `limit`, capped at `target`.
    pub fn coverable(&self, target: u64, limit: u64) -> u64 {
        let mut covered = 0u64;
        let iter: Box<dyn Iterator<Item = (&u64, &PriceLevel)>> = match self.side {
            Side::Bid => Box::new(self.levels.iter().rev()),
            Side::Ask => Box::new(self.levels.iter()),
        };
        for (price, level) in iter {
            let crosses = match self.side {
                // The aggressor is on the opposite side of `self`.
                Side::Bid => limit <= *price,
                Side::Ask => limit >= *price,
            };
            if !crosses {
                break;
            }
            covered = covered.saturating_add(level.size);
            if covered >= target {
                return target;
            }
        }
        covered
    }

    /// Recompute aggregates from scratch and compare to the tracked values.
    /// Invariant violations here are programming bugs; callers assert on
    /// the result in debug builds.
    pub fn validate(&self) -> bool {
        let mut volume = 0u64;
        let mut count = 0usize;
        for (price, level) in &self.levels {
            let level_sum: u64 = level.queue.iter().map(|o| o.remaining_quantity).sum();
            if level_sum != level.size || level.queue.is_empty() {
                return false;
            }
            if level.queue.iter().any(|o| {
                o.remaining_quantity == 0 || o.price != Some(*price) || o.side != self.side
            }) {
                return false;
            }
            volume += level_sum;
            count += level.queue.len();
        }
        volume == self.volume && count == self.order_count && count == self.index.len()
    }
}
