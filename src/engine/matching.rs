//! Matching rules: spread crossing, limit and market execution, and
//! fill-or-kill admission.

use super::MatchingEngine;
use crate::messages::{ExecutionReport, OutboundMessage};
use crate::order::{Order, OrderStatus, Side, TimeInForce};
use crate::orderbook::LobSnapshot;
use crate::trade::Trade;
use tracing::info;

impl MatchingEngine {
    /// Whether an incoming limit order crosses the spread: a bid priced at
    /// or above the best ask, or an ask priced at or below the best bid.
    pub(super) fn crosses_spread(&self, order: &Order) -> bool {
        let book = self.books.get(&order.ticker).expect("validated ticker");
        match book.best(order.side.opposite()) {
            Some(best) => order.crosses(best.price.expect("resting orders carry prices")),
            None => false,
        }
    }

    /// Route a validated limit order through the matching rules.
    ///
    /// Fill-or-kill orders take the all-or-nothing path regardless of
    /// whether they cross. Any other crossing order matches; any other
    /// non-crossing order rests with an acknowledgement. IOC semantics
    /// only bite after a match: the residual of a crossed IOC is
    /// cancelled inside [`Self::match_order`].
    pub(super) fn match_limit_order(&mut self, order: Order) {
        match (order.time_in_force, self.crosses_spread(&order)) {
            (TimeInForce::Fok, _) => self.match_order_in_full(order),
            (_, true) => self.match_order(order),
            (_, false) => self.rest_order(order),
        }
    }

    /// Rest an order on its book, acknowledge it to the submitter and
    /// publish the book change.
    fn rest_order(&mut self, order: Order) {
        let ticker = order.ticker.clone();
        let side = order.side;
        let report = ExecutionReport::of_order(order.clone());

        self.books
            .get_mut(&ticker)
            .expect("validated ticker")
            .add(order);
        self.fabric
            .unicast(report.order.sender_id, &OutboundMessage::ExecutionReport(report));
        self.publish_market_data(&ticker, side);
    }

    /// Cancel an order that is not on the book (IOC/FOK/market residual or
    /// whole) and report the cancellation to the submitter.
    pub(super) fn cancel_order(&mut self, mut order: Order) {
        order.set_status(OrderStatus::Cancelled);
        self.fabric.unicast(
            order.sender_id,
            &OutboundMessage::ExecutionReport(ExecutionReport::of_order(order)),
        );
    }

    /// Match an aggressing order against the opposite side while it still
    /// crosses, allowing partial execution. Each iteration trades at the
    /// resting order's price (price improvement goes to the aggressor).
    /// A GTC residual rests without a further report — the last fill report
    /// already carries its state; an IOC (or market) residual is cancelled.
    pub(super) fn match_order(&mut self, mut order: Order) {
        let opposite = order.side.opposite();

        while !order.is_filled() {
            let top = self
                .books
                .get(&order.ticker)
                .expect("validated ticker")
                .best(opposite)
                .map(|resting| {
                    (
                        resting.price.expect("resting orders carry prices"),
                        resting.remaining_quantity,
                    )
                });
            let Some((best_price, best_remaining)) = top else {
                break;
            };
            if !order.crosses(best_price) {
                break;
            }

            let quantity = order.remaining_quantity.min(best_remaining);
            self.execute_trade(&mut order, quantity, best_price);
        }

        if !order.is_filled() {
            match order.time_in_force {
                TimeInForce::Gtc => self
                    .books
                    .get_mut(&order.ticker)
                    .expect("validated ticker")
                    .add(order),
                TimeInForce::Ioc => self.cancel_order(order),
                // FOK never reaches the partial path: match_order_in_full
                // only replays walks proven fully coverable.
                TimeInForce::Fok => unreachable!("FOK residual in partial matching path"),
            }
        }
    }

    /// All-or-nothing matching: peek-walk the opposite side without
    /// committing, and only if the full quantity is coverable at acceptable
    /// prices replay the walk as real executions. Otherwise the book is
    /// left untouched and the order is cancelled — a fill-or-kill order
    /// never produces an observable partial fill.
    pub(super) fn match_order_in_full(&mut self, order: Order) {
        let limit = order.price.expect("fill-or-kill orders carry a limit price");
        let coverable = self
            .books
            .get(&order.ticker)
            .expect("validated ticker")
            .coverable_against(order.side, order.remaining_quantity, limit);

        if coverable >= order.remaining_quantity {
            self.match_order(order);
        } else {
            self.cancel_order(order);
        }
    }

    /// Execute one trade of `quantity` at `price` between the aggressor and
    /// the best resting order, then emit in the required order: tape
    /// append, execution reports (resting party first), market-data
    /// broadcast.
    fn execute_trade(&mut self, aggressor: &mut Order, quantity: u64, price: u64) {
        let ticker = aggressor.ticker.clone();
        let now = self.clock.now_ns();

        let resting = self
            .books
            .get_mut(&ticker)
            .expect("validated ticker")
            .fill_best(aggressor.side.opposite(), quantity, price);
        aggressor.apply_fill(quantity, price);

        let trade = self.build_trade(aggressor, &resting, quantity, price, now);
        info!("{trade}");

        // Profit attribution: only fills move the profit map, one credit per party.
        self.attribute_profit(&resting, price);
        self.attribute_profit(aggressor, price);

        // (a) the trade is recorded before anything referencing it is sent.
        if let Some(tapes) = self.tapes.ticker_tapes_mut(&ticker) {
            tapes.trades.append(&trade);
        }
        self.windows
            .get_mut(&ticker)
            .expect("validated ticker")
            .record(trade.price);
        self.books
            .get_mut(&ticker)
            .expect("validated ticker")
            .note_trade(&trade);

        let time_diff_ms = self
            .last_trade_ns
            .get(&ticker)
            .map(|prev| now.saturating_sub(*prev) / 1_000_000)
            .unwrap_or(0);
        self.last_trade_ns.insert(ticker.clone(), now);

        // (b) execution reports, resting counterparty first.
        self.fabric.unicast(
            resting.sender_id,
            &OutboundMessage::ExecutionReport(ExecutionReport::of_fill(
                resting.clone(),
                trade.clone(),
            )),
        );
        self.fabric.unicast(
            aggressor.sender_id,
            &OutboundMessage::ExecutionReport(ExecutionReport::of_fill(
                aggressor.clone(),
                trade.clone(),
            )),
        );

        // (c) one snapshot serves both the LOB tape row and the broadcast.
        let mut data = self.market_snapshot(&ticker, aggressor.side);
        data.time_diff_ms = time_diff_ms;

        let limit_price_chosen = aggressor
            .price
            .map(|p| p as f64)
            .unwrap_or(trade.price as f64);
        let lob = LobSnapshot::from_market_data(&data, limit_price_chosen, trade.price as f64);
        if let Some(tapes) = self.tapes.ticker_tapes_mut(&ticker) {
            tapes.lob_snapshots.append(&lob);
        }

        self.publish(data);
    }

    /// Assemble the trade record: buyer/seller resolved from the aggressor
    /// side, names from the subscribe registry, per-party profit from the
    /// private valuations.
    fn build_trade(
        &mut self,
        aggressor: &Order,
        resting: &Order,
        quantity: u64,
        price: u64,
        timestamp_ns: u64,
    ) -> Trade {
        let (buyer, seller) = match aggressor.side {
            Side::Bid => (aggressor, resting),
            Side::Ask => (resting, aggressor),
        };

        let id = self.next_trade_id;
        self.next_trade_id += 1;

        Trade {
            id,
            ticker: aggressor.ticker.clone(),
            quantity,
            price,
            timestamp_ns,
            buyer_id: buyer.sender_id,
            seller_id: seller.sender_id,
            buyer_name: self.resolve_name(buyer.sender_id, &buyer.agent_name),
            seller_name: self.resolve_name(seller.sender_id, &seller.agent_name),
            aggressing_order_id: aggressor.id,
            resting_order_id: resting.id,
            buyer_priv_value: buyer.priv_value,
            seller_priv_value: seller.priv_value,
            buyer_profit: buyer.priv_value - price as f64,
            seller_profit: price as f64 - seller.priv_value,
        }
    }

    /// Credit one party's per-trade profit: a buyer earns its valuation
    /// minus the price, a seller the price minus its valuation.
    fn attribute_profit(&mut self, order: &Order, price: u64) {
        let profit = match order.side {
            Side::Bid => order.priv_value - price as f64,
            Side::Ask => price as f64 - order.priv_value,
        };
        let name = self.resolve_name(order.sender_id, &order.agent_name);
        *self.profits.entry(name).or_insert(0.0) += profit;
    }

    // --- test and inspection access ---

    /// Whether the trade window for `ticker` has recorded any trades.
    pub fn has_traded(&self, ticker: &str) -> bool {
        self.windows
            .get(ticker)
            .map(|window| !window.is_empty())
            .unwrap_or(false)
    }
}
