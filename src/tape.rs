//! CSV tape sinks for the persisted exchange artifacts.
//!
//! One buffered append-only writer per artifact. The matching engine hands
//! records over and keeps going regardless of sink errors: tape durability
//! is not a correctness requirement of the matching core, so failures are
//! logged and swallowed here.

use crate::error::ExchangeError;
use crate::messages::InboundMessage;
use crate::order::Side;
use crate::orderbook::{LobSnapshot, MarketData};
use crate::trade::Trade;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error};

/// A value that knows how to render itself as one CSV row.
pub trait CsvRecord {
    /// Comma-separated column names, written once per file.
    fn headers() -> &'static str;

    /// One comma-separated row.
    fn to_row(&self) -> String;
}

/// Render an optional integer column, `-1` when absent.
fn cell_u64(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-1".to_string())
}

/// Render an optional float column, `-1` when absent.
fn cell_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-1".to_string())
}

impl CsvRecord for Trade {
    fn headers() -> &'static str {
        "id,ticker,quantity,price,timestamp,buyer_id,seller_id,buyer_name,seller_name,\
         aggressing_order_id,resting_order_id,buyer_priv_value,seller_priv_value,\
         buyer_profit,seller_profit"
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.id,
            self.ticker,
            self.quantity,
            self.price,
            self.timestamp_ns,
            self.buyer_id,
            self.seller_id,
            self.buyer_name,
            self.seller_name,
            self.aggressing_order_id,
            self.resting_order_id,
            self.buyer_priv_value,
            self.seller_priv_value,
            self.buyer_profit,
            self.seller_profit
        )
    }
}

impl CsvRecord for MarketData {
    fn headers() -> &'static str {
        "ticker,timestamp,time_diff,side,best_bid,best_ask,best_bid_size,best_ask_size,\
         bids_volume,asks_volume,bids_count,asks_count,last_price,last_quantity,\
         high_price,low_price,volume_per_tick,cumulative_volume,trades_count,\
         mid_price,micro_price,spread,imbalance,total_volume,p_equilibrium,smiths_alpha"
    }

    fn to_row(&self) -> String {
        let side = match self.aggressing_side {
            Side::Bid => 1,
            Side::Ask => 0,
        };
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.ticker,
            self.timestamp_ms,
            self.time_diff_ms,
            side,
            cell_u64(self.best_bid),
            cell_u64(self.best_ask),
            self.best_bid_size,
            self.best_ask_size,
            self.bids_volume,
            self.asks_volume,
            self.bids_count,
            self.asks_count,
            cell_u64(self.last_price),
            self.last_quantity,
            cell_u64(self.high_price),
            cell_u64(self.low_price),
            self.volume_per_tick,
            self.cumulative_volume,
            self.trades_count,
            cell_f64(self.mid_price),
            cell_f64(self.micro_price),
            cell_u64(self.spread),
            self.imbalance,
            self.total_volume,
            self.p_equilibrium,
            self.smiths_alpha
        )
    }
}

impl CsvRecord for LobSnapshot {
    fn headers() -> &'static str {
        "timestamp,time_diff,side,best_bid,best_ask,micro_price,mid_price,imbalance,\
         spread,total_volume,p_equilibrium,smiths_alpha,limit_price_chosen,trade_price"
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.timestamp_ms,
            self.time_diff_ms,
            self.side,
            cell_u64(self.best_bid),
            cell_u64(self.best_ask),
            cell_f64(self.micro_price),
            cell_f64(self.mid_price),
            self.imbalance,
            cell_u64(self.spread),
            self.total_volume,
            self.p_equilibrium,
            self.smiths_alpha,
            self.limit_price_chosen,
            self.trade_price
        )
    }
}

/// One agent's realized profit at session end.
#[derive(Debug, Clone)]
pub struct ProfitSnapshot {
    /// Agent display name.
    pub agent_name: String,
    /// Realized profit across all fills.
    pub profit: f64,
}

impl CsvRecord for ProfitSnapshot {
    fn headers() -> &'static str {
        "agent_name,profit"
    }

    fn to_row(&self) -> String {
        format!("{},{}", self.agent_name, self.profit)
    }
}

/// Audit-tape row for one inbound order or cancel message.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    /// Monotonic nanoseconds at processing time.
    pub timestamp_ns: u64,
    /// Wire name of the message kind.
    pub kind: &'static str,
    /// Submitting agent.
    pub sender_id: u32,
    /// Ticker referenced.
    pub ticker: String,
    /// Side referenced.
    pub side: Side,
    /// Quantity, 0 for cancels.
    pub quantity: u64,
    /// Limit price, absent for market orders and cancels.
    pub price: Option<u64>,
    /// Client order id for orders, target order id for cancels.
    pub order_id: u64,
}

impl MessageRecord {
    /// Build an audit row for an inbound message. Subscribes are not part
    /// of the audit tape.
    pub fn from_inbound(msg: &InboundMessage, timestamp_ns: u64) -> Option<Self> {
        match msg {
            InboundMessage::Subscribe(_) => None,
            InboundMessage::LimitOrder(req) => Some(Self {
                timestamp_ns,
                kind: msg.kind(),
                sender_id: req.sender_id,
                ticker: req.ticker.clone(),
                side: req.side,
                quantity: req.quantity,
                price: Some(req.price),
                order_id: req.client_order_id,
            }),
            InboundMessage::MarketOrder(req) => Some(Self {
                timestamp_ns,
                kind: msg.kind(),
                sender_id: req.sender_id,
                ticker: req.ticker.clone(),
                side: req.side,
                quantity: req.quantity,
                price: None,
                order_id: 0,
            }),
            InboundMessage::CancelOrder(req) => Some(Self {
                timestamp_ns,
                kind: msg.kind(),
                sender_id: req.sender_id,
                ticker: req.ticker.clone(),
                side: req.side,
                quantity: 0,
                price: None,
                order_id: req.order_id,
            }),
        }
    }
}

impl CsvRecord for MessageRecord {
    fn headers() -> &'static str {
        "timestamp,type,sender_id,ticker,side,quantity,price,order_id"
    }

    fn to_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}",
            self.timestamp_ns,
            self.kind,
            self.sender_id,
            self.ticker,
            self.side,
            self.quantity,
            cell_u64(self.price),
            self.order_id
        )
    }
}

/// In-memory byte sink with shared read access, used by tests and
/// in-process simulations to inspect tape output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer contents as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A buffered append-only CSV writer. The header row is emitted before the
/// first record.
pub struct CsvTape {
    writer: BufWriter<Box<dyn Write + Send>>,
    label: String,
    header_written: bool,
}

impl std::fmt::Debug for CsvTape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvTape")
            .field("label", &self.label)
            .field("header_written", &self.header_written)
            .finish()
    }
}

impl CsvTape {
    /// Create a tape writing to a new file at `path`.
    pub fn create(path: &Path) -> Result<Self, ExchangeError> {
        let file = File::create(path)?;
        debug!("created tape file {}", path.display());
        Ok(Self {
            writer: BufWriter::new(Box::new(file)),
            label: path.display().to_string(),
            header_written: false,
        })
    }

    /// Create a tape writing to an arbitrary sink.
    pub fn from_writer(label: &str, writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            label: label.to_string(),
            header_written: false,
        }
    }

    /// Append one record. Sink failures are logged, never propagated: tape
    /// durability is not a correctness requirement of the matching core.
    pub fn append<R: CsvRecord>(&mut self, record: &R) {
        if !self.header_written {
            if let Err(e) = writeln!(self.writer, "{}", R::headers()) {
                error!(
                    "{}",
                    ExchangeError::Sink(format!("{}: header write failed: {e}", self.label))
                );
                return;
            }
            self.header_written = true;
        }
        if let Err(e) = writeln!(self.writer, "{}", record.to_row()) {
            error!(
                "{}",
                ExchangeError::Sink(format!("{}: row write failed: {e}", self.label))
            );
        }
    }

    /// Flush buffered rows to the sink.
    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            error!("tape {}: flush failed: {e}", self.label);
        }
    }
}

/// The four per-ticker artifact tapes.
#[derive(Debug)]
pub struct TickerTapes {
    /// Executed trades.
    pub trades: CsvTape,
    /// Market-data snapshots, one row per publish event.
    pub market_data: CsvTape,
    /// LOB snapshots, one row per executed trade.
    pub lob_snapshots: CsvTape,
    /// Per-agent realized profits at session end.
    pub profits: CsvTape,
}

/// In-memory handles to the buffers behind an in-memory tape store.
#[derive(Debug, Clone)]
pub struct TapeBuffers {
    /// Per-ticker buffers keyed by ticker, in the order trades,
    /// market data, LOB snapshots, profits.
    pub tickers: HashMap<String, [SharedBuf; 4]>,
    /// The shared message audit buffer.
    pub messages: SharedBuf,
}

/// All tape writers owned by one exchange: per-ticker artifact sets plus
/// the shared message audit tape.
#[derive(Debug)]
pub struct TapeStore {
    tapes: HashMap<String, TickerTapes>,
    messages: CsvTape,
}

impl TapeStore {
    /// Create tape files under `output_dir` in the artifact subdirectories,
    /// named `<kind>_<exchange>_<ticker>_<iso8601>.csv`.
    pub fn open(
        output_dir: &Path,
        exchange_name: &str,
        tickers: &[String],
    ) -> Result<Self, ExchangeError> {
        let stamp = crate::utils::file_timestamp();
        for dir in ["trades", "market_data", "lob_snapshots", "profits", "messages"] {
            std::fs::create_dir_all(output_dir.join(dir))?;
        }

        let mut tapes = HashMap::new();
        for ticker in tickers {
            let suffix = format!("{exchange_name}_{ticker}_{stamp}.csv");
            tapes.insert(
                ticker.clone(),
                TickerTapes {
                    trades: CsvTape::create(&output_dir.join("trades").join(format!("trades_{suffix}")))?,
                    market_data: CsvTape::create(
                        &output_dir.join("market_data").join(format!("data_{suffix}")),
                    )?,
                    lob_snapshots: CsvTape::create(
                        &output_dir
                            .join("lob_snapshots")
                            .join(format!("lob_snapshot_{suffix}")),
                    )?,
                    profits: CsvTape::create(
                        &output_dir
                            .join("profits")
                            .join(format!("profits_snapshot_{suffix}")),
                    )?,
                },
            );
        }

        let messages = CsvTape::create(
            &output_dir
                .join("messages")
                .join(format!("msgs_{exchange_name}_{stamp}.csv")),
        )?;

        Ok(Self { tapes, messages })
    }

    /// Create a store over in-memory buffers, returning the buffer handles
    /// for inspection.
    pub fn in_memory(tickers: &[String]) -> (Self, TapeBuffers) {
        let mut tapes = HashMap::new();
        let mut buffers = HashMap::new();
        for ticker in tickers {
            let bufs: [SharedBuf; 4] = std::array::from_fn(|_| SharedBuf::new());
            tapes.insert(
                ticker.clone(),
                TickerTapes {
                    trades: CsvTape::from_writer(&format!("trades[{ticker}]"), Box::new(bufs[0].clone())),
                    market_data: CsvTape::from_writer(
                        &format!("market_data[{ticker}]"),
                        Box::new(bufs[1].clone()),
                    ),
                    lob_snapshots: CsvTape::from_writer(
                        &format!("lob_snapshots[{ticker}]"),
                        Box::new(bufs[2].clone()),
                    ),
                    profits: CsvTape::from_writer(
                        &format!("profits[{ticker}]"),
                        Box::new(bufs[3].clone()),
                    ),
                },
            );
            buffers.insert(ticker.clone(), bufs);
        }

        let messages_buf = SharedBuf::new();
        let messages = CsvTape::from_writer("messages", Box::new(messages_buf.clone()));

        (
            Self { tapes, messages },
            TapeBuffers {
                tickers: buffers,
                messages: messages_buf,
            },
        )
    }

    /// The tape set for `ticker`, if listed.
    pub fn ticker_tapes_mut(&mut self, ticker: &str) -> Option<&mut TickerTapes> {
        self.tapes.get_mut(ticker)
    }

    /// The shared message audit tape.
    pub fn messages_mut(&mut self) -> &mut CsvTape {
        &mut self.messages
    }

    /// Flush every tape.
    pub fn flush_all(&mut self) {
        for tapes in self.tapes.values_mut() {
            tapes.trades.flush();
            tapes.market_data.flush();
            tapes.lob_snapshots.flush();
            tapes.profits.flush();
        }
        self.messages.flush();
    }
}
