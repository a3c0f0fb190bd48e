//! End-to-end matching scenarios driven directly through the engine.

use crate::{Harness, drain, market_data, reports};
use exchange_rs::{OrderStatus, OutboundMessage, Side, TimeInForce};

// --- crossing limit orders ---

#[test]
fn test_crossing_limit_orders_trade_at_resting_price() {
    let mut harness = Harness::new(&["X"]);
    let rx_a = harness.subscribe(1, "X");
    let rx_b = harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Gtc);
    harness.limit(2, "X", Side::Ask, 10, 99, TimeInForce::Gtc);

    // A: resting ack, then a fill report carrying the trade.
    let a_reports = reports(&drain(&rx_a));
    assert_eq!(a_reports.len(), 2);
    assert_eq!(a_reports[0].order.status, OrderStatus::New);
    assert!(a_reports[0].trade.is_none());
    assert_eq!(a_reports[1].order.status, OrderStatus::Filled);

    // The trade executed at the resting bid's price, not the ask's.
    let trade = a_reports[1].trade.as_ref().expect("fill report carries trade");
    assert_eq!(trade.price, 100);
    assert_eq!(trade.quantity, 10);
    assert_eq!(trade.buyer_id, 1);
    assert_eq!(trade.seller_id, 2);
    assert_eq!(trade.resting_order_id, a_reports[1].order.id);

    // B: one fill report, fully executed on arrival.
    let b_messages = drain(&rx_b);
    let b_reports = reports(&b_messages);
    assert_eq!(b_reports.len(), 1);
    assert_eq!(b_reports[0].order.status, OrderStatus::Filled);
    assert_eq!(b_reports[0].order.avg_price, 100.0);

    // The post-trade broadcast shows an empty book.
    let snapshots = market_data(&b_messages);
    let last = snapshots.last().expect("market data broadcast");
    assert_eq!(last.best_bid, None);
    assert_eq!(last.best_ask, None);
    assert_eq!(last.bids_volume + last.asks_volume, 0);
    assert_eq!(last.last_price, Some(100));
}

#[test]
fn test_partial_fill_walks_price_levels_and_rests_remainder() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.subscribe(3, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 5, 101, TimeInForce::Gtc);
    harness.limit(3, "X", Side::Ask, 5, 102, TimeInForce::Gtc);
    drain(&rx);

    harness.limit(1, "X", Side::Bid, 8, 102, TimeInForce::Gtc);

    let fills = reports(&drain(&rx));
    assert_eq!(fills.len(), 2);

    let first = fills[0].trade.as_ref().unwrap();
    assert_eq!((first.quantity, first.price), (5, 101));
    let second = fills[1].trade.as_ref().unwrap();
    assert_eq!((second.quantity, second.price), (3, 102));

    assert_eq!(fills[1].order.status, OrderStatus::Filled);
    // avg = (5*101 + 3*102) / 8
    assert!((fills[1].order.avg_price - 101.375).abs() < 1e-9);

    // 2@102 remains resting on the ask side.
    let book = harness.engine.book("X").unwrap();
    assert_eq!(book.best(Side::Ask).unwrap().remaining_quantity, 2);
    assert_eq!(book.best(Side::Ask).unwrap().price, Some(102));
    assert!(book.best(Side::Bid).is_none());
}

// --- fill-or-kill ---

#[test]
fn test_fok_without_coverage_leaves_book_unchanged() {
    let mut harness = Harness::new(&["X"]);
    let rx_a = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 10, 100, TimeInForce::Gtc);
    harness.limit(1, "X", Side::Bid, 10, 99, TimeInForce::Fok);

    let a_reports = reports(&drain(&rx_a));
    assert_eq!(a_reports.len(), 1);
    assert_eq!(a_reports[0].order.status, OrderStatus::Cancelled);
    assert_eq!(a_reports[0].order.cumulative_quantity, 0);
    assert!(a_reports[0].trade.is_none());

    let book = harness.engine.book("X").unwrap();
    assert_eq!(book.totals(), (0, 10, 0, 1));
}

#[test]
fn test_fok_with_partial_coverage_is_killed_whole() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    // Only 6 of 10 are coverable at acceptable prices.
    harness.limit(2, "X", Side::Ask, 6, 100, TimeInForce::Gtc);
    harness.limit(2, "X", Side::Ask, 10, 105, TimeInForce::Gtc);
    harness.limit(1, "X", Side::Bid, 10, 101, TimeInForce::Fok);

    let a_reports = reports(&drain(&rx));
    assert_eq!(a_reports.len(), 1);
    assert_eq!(a_reports[0].order.status, OrderStatus::Cancelled);

    // Nothing executed; both asks untouched.
    let book = harness.engine.book("X").unwrap();
    assert_eq!(book.totals(), (0, 16, 0, 2));
    assert!(!harness.engine.has_traded("X"));
}

#[test]
fn test_fok_with_full_coverage_fills_across_levels() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 5, 100, TimeInForce::Gtc);
    harness.limit(2, "X", Side::Ask, 5, 101, TimeInForce::Gtc);
    harness.limit(1, "X", Side::Bid, 10, 101, TimeInForce::Fok);

    let fills = reports(&drain(&rx));
    assert_eq!(fills.len(), 2);
    assert_eq!(fills[1].order.status, OrderStatus::Filled);
    assert_eq!(fills[1].order.cumulative_quantity, 10);

    let book = harness.engine.book("X").unwrap();
    assert_eq!(book.totals(), (0, 0, 0, 0));
}

// --- immediate-or-cancel ---

#[test]
fn test_non_crossing_ioc_rests_like_gtc() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 10, 100, TimeInForce::Gtc);
    drain(&rx);

    // A bid below the best ask has nothing to match against; it rests
    // regardless of time-in-force, as any non-crossing limit order does.
    harness.limit(1, "X", Side::Bid, 10, 99, TimeInForce::Ioc);

    let messages = drain(&rx);
    let acks = reports(&messages);
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].order.status, OrderStatus::New);
    assert!(acks[0].trade.is_none());

    let book = harness.engine.book("X").unwrap();
    assert_eq!(book.totals(), (10, 10, 1, 1));
    assert_eq!(book.best(Side::Bid).unwrap().price, Some(99));
    assert!(!harness.engine.has_traded("X"));
}

#[test]
fn test_crossing_ioc_residual_is_cancelled() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 5, 100, TimeInForce::Gtc);
    drain(&rx);

    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Ioc);

    let ioc_reports = reports(&drain(&rx));
    assert_eq!(ioc_reports.len(), 2);
    assert_eq!(ioc_reports[0].trade.as_ref().unwrap().quantity, 5);
    assert_eq!(ioc_reports[1].order.status, OrderStatus::Cancelled);
    assert_eq!(ioc_reports[1].order.remaining_quantity, 5);
    assert_eq!(ioc_reports[1].order.cumulative_quantity, 5);

    // The residual never rested.
    assert_eq!(harness.engine.book("X").unwrap().totals(), (0, 0, 0, 0));
}

// --- market orders ---

#[test]
fn test_market_order_sweeps_then_cancels_residual() {
    let mut harness = Harness::new(&["X"]);
    let rx_buyer = harness.subscribe(1, "X");
    let rx_seller = harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 10, 100, TimeInForce::Gtc);
    drain(&rx_seller);

    harness.market(1, "X", Side::Bid, 15);

    // Aggressor: one fill report, then the residual cancellation.
    let buyer_reports = reports(&drain(&rx_buyer));
    assert_eq!(buyer_reports.len(), 2);

    let fill = &buyer_reports[0];
    assert_eq!(fill.trade.as_ref().unwrap().quantity, 10);
    assert_eq!(fill.trade.as_ref().unwrap().price, 100);
    assert_eq!(fill.order.status, OrderStatus::PartiallyFilled);

    let cancel = &buyer_reports[1];
    assert!(cancel.trade.is_none());
    assert_eq!(cancel.order.status, OrderStatus::Cancelled);
    assert_eq!(cancel.order.remaining_quantity, 5);
    assert_eq!(cancel.order.cumulative_quantity, 10);

    // Resting seller: exactly one fill report.
    let seller_reports = reports(&drain(&rx_seller));
    assert_eq!(seller_reports.len(), 1);
    assert_eq!(seller_reports[0].order.status, OrderStatus::Filled);

    let book = harness.engine.book("X").unwrap();
    assert_eq!(book.totals(), (0, 0, 0, 0));
}

// --- cancels ---

#[test]
fn test_cancel_missing_order_returns_reject() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.open_session();

    harness.cancel(1, "X", 999, Side::Bid);

    let messages = drain(&rx);
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        OutboundMessage::CancelReject { order_id } => assert_eq!(*order_id, 999),
        other => panic!("expected cancel reject, got {other:?}"),
    }
    assert_eq!(harness.engine.book("X").unwrap().totals(), (0, 0, 0, 0));
}

#[test]
fn test_cancel_resting_order_reports_and_publishes() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.open_session();

    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Gtc);
    let resting_id = reports(&drain(&rx))[0].order.id;

    harness.cancel(1, "X", resting_id, Side::Bid);

    let messages = drain(&rx);
    let cancel_reports = reports(&messages);
    assert_eq!(cancel_reports.len(), 1);
    assert_eq!(cancel_reports[0].order.status, OrderStatus::Cancelled);
    assert_eq!(cancel_reports[0].order.remaining_quantity, 10);

    // The book change is published.
    let snapshots = market_data(&messages);
    assert_eq!(snapshots.last().unwrap().best_bid, None);
    assert_eq!(harness.engine.book("X").unwrap().totals(), (0, 0, 0, 0));
}

#[test]
fn test_gtc_add_then_cancel_round_trip_empties_book() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.open_session();

    for (side, price) in [
        (Side::Bid, 98),
        (Side::Bid, 99),
        (Side::Ask, 101),
        (Side::Ask, 102),
    ] {
        harness.limit(1, "X", side, 10, price, TimeInForce::Gtc);
    }

    let acks = reports(&drain(&rx));
    assert_eq!(acks.len(), 4);
    assert_eq!(harness.engine.book("X").unwrap().totals(), (20, 20, 2, 2));

    for ack in &acks {
        harness.cancel(1, "X", ack.order.id, ack.order.side);
    }

    let cancels = reports(&drain(&rx));
    assert_eq!(cancels.len(), 4);
    assert!(cancels.iter().all(|r| r.order.status == OrderStatus::Cancelled));
    assert_eq!(harness.engine.book("X").unwrap().totals(), (0, 0, 0, 0));
}

// --- priority ---

#[test]
fn test_same_price_fifo_through_the_engine() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.subscribe(3, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 5, 100, TimeInForce::Gtc);
    harness.limit(3, "X", Side::Ask, 5, 100, TimeInForce::Gtc);
    drain(&rx);

    harness.market(1, "X", Side::Bid, 7);

    let fills = reports(&drain(&rx));
    let trades: Vec<_> = fills.iter().filter_map(|r| r.trade.clone()).collect();
    assert_eq!(trades.len(), 2);
    // The earlier ask (agent 2) fills first and in full.
    assert_eq!(trades[0].seller_id, 2);
    assert_eq!(trades[0].quantity, 5);
    assert_eq!(trades[1].seller_id, 3);
    assert_eq!(trades[1].quantity, 2);
}

// --- validation ---

#[test]
fn test_zero_quantity_order_is_rejected() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.open_session();

    harness.limit(1, "X", Side::Bid, 0, 100, TimeInForce::Gtc);

    let rejects = reports(&drain(&rx));
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].order.status, OrderStatus::Rejected);
    assert_eq!(harness.engine.book("X").unwrap().totals(), (0, 0, 0, 0));
}

#[test]
fn test_unknown_ticker_order_is_rejected_without_state_change() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.open_session();

    harness.limit(1, "Z", Side::Bid, 10, 100, TimeInForce::Gtc);

    let rejects = reports(&drain(&rx));
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].order.status, OrderStatus::Rejected);
}

// --- emission ordering ---

#[test]
fn test_execution_report_precedes_market_data_for_same_event() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    harness.limit(2, "X", Side::Ask, 10, 100, TimeInForce::Gtc);
    drain(&rx);

    // Agent 1 is both the submitter and a subscriber: on its single
    // endpoint the fill report must arrive before the broadcast that
    // reflects the trade.
    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Gtc);

    let messages = drain(&rx);
    let report_pos = messages
        .iter()
        .position(|m| matches!(m, OutboundMessage::ExecutionReport(_)))
        .expect("fill report delivered");
    let data_pos = messages
        .iter()
        .position(|m| matches!(m, OutboundMessage::MarketData(_)))
        .expect("market data delivered");
    assert!(report_pos < data_pos);
}

// --- attribution and tapes ---

#[test]
fn test_profit_attribution_and_trade_tape_row() {
    let mut harness = Harness::new(&["X"]);
    harness.subscribe(1, "X");
    harness.subscribe(2, "X");
    harness.open_session();

    // Buyer values at 104, seller at 96; trade prints at 100.
    harness.engine.process(exchange_rs::EngineMsg::Inbound(
        exchange_rs::InboundMessage::LimitOrder(exchange_rs::LimitOrderRequest {
            sender_id: 1,
            client_order_id: 1,
            ticker: "X".to_string(),
            side: Side::Bid,
            quantity: 10,
            price: 100,
            priv_value: 104.0,
            time_in_force: TimeInForce::Gtc,
            agent_name: "zic_1".to_string(),
        }),
    ));
    harness.engine.process(exchange_rs::EngineMsg::Inbound(
        exchange_rs::InboundMessage::LimitOrder(exchange_rs::LimitOrderRequest {
            sender_id: 2,
            client_order_id: 2,
            ticker: "X".to_string(),
            side: Side::Ask,
            quantity: 10,
            price: 100,
            priv_value: 96.0,
            time_in_force: TimeInForce::Gtc,
            agent_name: "zic_2".to_string(),
        }),
    ));

    let profits = harness.engine.profits();
    assert!((profits["zic_1"] - 4.0).abs() < 1e-9);
    assert!((profits["zic_2"] - 4.0).abs() < 1e-9);

    let trades_csv = harness.buffers.tickers["X"][0].contents();
    let mut lines = trades_csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("id,ticker,quantity,price"));
    let row = lines.next().expect("one trade row");
    assert!(row.contains(",X,10,100,"));
    assert!(row.contains("zic_1"));
    assert!(row.contains("zic_2"));

    // One LOB snapshot row per executed trade.
    let lob_csv = harness.buffers.tickers["X"][2].contents();
    assert_eq!(lob_csv.lines().count(), 2);
}

#[test]
fn test_technical_ready_resets_legacy_profits_only() {
    use exchange_rs::{ControlMessage, EngineMsg, InboundMessage, LimitOrderRequest};

    let mut harness = Harness::new(&["X"]);
    harness.subscribe(1, "X"); // registers as zic_1: a legacy prefix
    harness.subscribe(2, "X");
    harness.open_session();

    // Manufacture profit: buyer values at 110, seller at 90, print at 100.
    for (agent, side, priv_value) in [(1u32, Side::Bid, 110.0), (2u32, Side::Ask, 90.0)] {
        harness
            .engine
            .process(EngineMsg::Inbound(InboundMessage::LimitOrder(LimitOrderRequest {
                sender_id: agent,
                client_order_id: agent as u64,
                ticker: "X".to_string(),
                side,
                quantity: 10,
                price: 100,
                priv_value,
                time_in_force: TimeInForce::Gtc,
                agent_name: format!("zic_{agent}"),
            })));
    }
    assert!((harness.engine.profits()["zic_1"] - 10.0).abs() < 1e-9);
    assert!((harness.engine.profits()["zic_2"] - 10.0).abs() < 1e-9);

    harness.engine.process(EngineMsg::Control(ControlMessage::TechnicalReady));

    // zic_* names match the configured legacy prefixes and reset to zero.
    assert_eq!(harness.engine.profits()["zic_1"], 0.0);
    assert_eq!(harness.engine.profits()["zic_2"], 0.0);
}

#[test]
fn test_message_audit_tape_records_orders_and_cancels() {
    let mut harness = Harness::new(&["X"]);
    harness.subscribe(1, "X");
    harness.open_session();

    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Gtc);
    harness.cancel(1, "X", 1, Side::Bid);

    let audit = harness.buffers.messages.contents();
    let lines: Vec<&str> = audit.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("LIMIT_ORDER"));
    assert!(lines[2].contains("CANCEL_ORDER"));
}

// --- session gating ---

#[test]
fn test_orders_before_open_are_ignored() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.session.advance(exchange_rs::SessionState::ConnectWindow);

    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Gtc);

    assert!(drain(&rx).is_empty());
    assert_eq!(harness.engine.book("X").unwrap().totals(), (0, 0, 0, 0));
}

#[test]
fn test_orders_after_close_are_refused_with_reject() {
    let mut harness = Harness::new(&["X"]);
    let rx = harness.subscribe(1, "X");
    harness.open_session();
    harness.session.advance(exchange_rs::SessionState::TradingClosed);

    harness.limit(1, "X", Side::Bid, 10, 100, TimeInForce::Gtc);

    let rejects = reports(&drain(&rx));
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].order.status, OrderStatus::Rejected);
}
