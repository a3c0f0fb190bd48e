//! Trading-window state machine and the session controller task.

use crate::engine::MatchingEngine;
use crate::fabric::SubscriptionFabric;
use crate::messages::{ControlMessage, EngineMsg, OutboundMessage, SessionEvent};
use crate::utils::SimClock;
use crossbeam::channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Lifecycle phase of one exchange run. Transitions are forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// The exchange has been constructed but not started.
    PreConnect,
    /// Accepting subscriber connections; orders are ignored.
    ConnectWindow,
    /// The matching engine is accepting and matching orders.
    TradingOpen,
    /// The window has closed; remaining queued messages are refused.
    TradingClosed,
}

/// Shared view of the session state: a mutex-guarded phase plus a condvar
/// for waiters, and the derived technical-ready flag.
#[derive(Debug)]
pub struct SessionClock {
    state: Mutex<SessionState>,
    cvar: Condvar,
    technical_ready: AtomicBool,
}

impl SessionClock {
    /// Create a clock in `PreConnect`.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::PreConnect),
            cvar: Condvar::new(),
            technical_ready: AtomicBool::new(false),
        }
    }

    /// The current phase.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the trading window is open.
    pub fn is_open(&self) -> bool {
        self.state() == SessionState::TradingOpen
    }

    /// Advance to `next` and wake all waiters. Phases only move forward;
    /// a backwards transition is a programming bug.
    pub fn advance(&self, next: SessionState) {
        let mut state = self.state.lock();
        debug_assert!(next >= *state, "session regression {:?} -> {next:?}", *state);
        *state = next;
        drop(state);
        self.cvar.notify_all();
    }

    /// Raise the technical-ready flag.
    pub fn mark_technical_ready(&self) {
        self.technical_ready.store(true, Ordering::SeqCst);
    }

    /// Whether technical agents have been signalled to start.
    pub fn technical_ready(&self) -> bool {
        self.technical_ready.load(Ordering::SeqCst)
    }

    /// Block until `pred` holds for the current phase, or `timeout`
    /// elapses. Returns whether the predicate held.
    pub fn wait_for(&self, pred: impl Fn(SessionState) -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !pred(*state) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if self.cvar.wait_for(&mut state, deadline - now).timed_out() {
                return pred(*state);
            }
        }
        true
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the trading-window timeline: connect phase with idle-grace
/// admission, session open, the technical-ready timer, session close and
/// the drain/end handshake with the matching engine.
pub struct SessionController {
    connect_window: Duration,
    trading_window: Duration,
    technical_ready_delay: Duration,
    idle_grace: Duration,
    fabric: Arc<SubscriptionFabric>,
    session: Arc<SessionClock>,
    clock: Arc<SimClock>,
    tx: Sender<EngineMsg>,
    engine_handle: JoinHandle<MatchingEngine>,
}

impl SessionController {
    /// Build a controller over an already-spawned engine thread.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connect_window: Duration,
        trading_window: Duration,
        technical_ready_delay: Duration,
        idle_grace: Duration,
        fabric: Arc<SubscriptionFabric>,
        session: Arc<SessionClock>,
        clock: Arc<SimClock>,
        tx: Sender<EngineMsg>,
        engine_handle: JoinHandle<MatchingEngine>,
    ) -> Self {
        Self {
            connect_window,
            trading_window,
            technical_ready_delay,
            idle_grace,
            fabric,
            session,
            clock,
            tx,
            engine_handle,
        }
    }

    /// Run the whole session timeline to completion. Invoked on the
    /// session thread; returns once tapes are finalized.
    pub fn run(self) {
        self.connect_phase();
        self.open_phase();
        self.close_phase();
    }

    /// Sleep through the connect window, then keep watching until no new
    /// subscriber has arrived for a full idle-grace period.
    fn connect_phase(&self) {
        self.session.advance(SessionState::ConnectWindow);
        info!(
            "waiting {:?} for connections, then {:?} idle grace",
            self.connect_window, self.idle_grace
        );
        std::thread::sleep(self.connect_window);

        let poll = (self.idle_grace / 5).clamp(Duration::from_millis(10), Duration::from_millis(500));
        let mut last_connection = Instant::now();
        let mut known = self.fabric.subscriber_count();
        loop {
            std::thread::sleep(poll);
            let current = self.fabric.subscriber_count();
            if current > known {
                info!("new connection detected, {current} agents connected");
                known = current;
                last_connection = Instant::now();
            }
            if last_connection.elapsed() >= self.idle_grace {
                break;
            }
        }
        info!("connect phase complete with {known} agents");
    }

    /// Open the trading window, broadcast the session start, arm the
    /// technical-ready timer and sleep out the trading window.
    fn open_phase(&self) {
        self.clock.mark_session_open();
        self.session.advance(SessionState::TradingOpen);
        self.fabric
            .broadcast_all(&OutboundMessage::Event(SessionEvent::TradingSessionStart));
        info!("trading session open for {:?}", self.trading_window);

        if self.technical_ready_delay < self.trading_window {
            std::thread::sleep(self.technical_ready_delay);
            self.session.mark_technical_ready();
            if self.tx.send(EngineMsg::Control(ControlMessage::TechnicalReady)).is_err() {
                warn!("engine queue closed before technical-ready fired");
            }
            std::thread::sleep(self.trading_window - self.technical_ready_delay);
        } else {
            // A delay that outlives the window would fire after session
            // end and break the broadcast total order; skip it.
            std::thread::sleep(self.trading_window);
        }
    }

    /// Close the window, drain the engine, then broadcast the end event
    /// and finalize profits and tapes.
    fn close_phase(self) {
        self.session.advance(SessionState::TradingClosed);
        if self.tx.send(EngineMsg::Control(ControlMessage::Drain)).is_err() {
            warn!("engine queue already closed at session end");
        }

        let mut engine = self
            .engine_handle
            .join()
            .expect("matching engine thread panicked");

        self.fabric
            .broadcast_all(&OutboundMessage::Event(SessionEvent::TradingSessionEnd));
        engine.finalize();
        info!("trading session ended");
    }
}
