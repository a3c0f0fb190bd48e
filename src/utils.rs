//! Time utilities shared by the exchange components.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Monotonic clock for the lifetime of one exchange process.
///
/// Order and trade timestamps are nanoseconds since clock construction, so
/// they are comparable across the whole run and immune to wall-clock
/// adjustments. Market-data timestamps are milliseconds since the trading
/// session opened; the session-open mark is set once by the session
/// controller.
#[derive(Debug)]
pub struct SimClock {
    origin: Instant,
    session_open_ns: AtomicU64,
    session_open: AtomicBool,
}

impl SimClock {
    /// Create a clock anchored at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            session_open_ns: AtomicU64::new(0),
            session_open: AtomicBool::new(false),
        }
    }

    /// Monotonic nanoseconds since clock construction.
    pub fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }

    /// Record the trading-session open instant. Called once by the session
    /// controller when the window transitions to open.
    pub fn mark_session_open(&self) {
        self.session_open_ns.store(self.now_ns(), Ordering::SeqCst);
        self.session_open.store(true, Ordering::SeqCst);
    }

    /// Milliseconds elapsed since the trading session opened, or 0 before
    /// the session-open mark is set.
    pub fn session_elapsed_ms(&self) -> u64 {
        if !self.session_open.load(Ordering::SeqCst) {
            return 0;
        }
        let open = self.session_open_ns.load(Ordering::SeqCst);
        self.now_ns().saturating_sub(open) / 1_000_000
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Current local time formatted as an ISO-8601 stamp for tape file names.
pub fn file_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
