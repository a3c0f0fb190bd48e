//! Top-level exchange: wires the engine, session controller and fabric
//! together and owns the thread lifecycle.

use crate::config::ExchangeConfig;
use crate::engine::MatchingEngine;
use crate::error::ExchangeError;
use crate::fabric::SubscriptionFabric;
use crate::messages::{EngineMsg, InboundMessage};
use crate::net::Transport;
use crate::session::{SessionClock, SessionController};
use crate::tape::TapeStore;
use crate::utils::SimClock;
use crossbeam::channel::{Sender, bounded};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Cloneable producer handle to an exchange's inbound queue. Transport
/// receivers deposit agent messages through this; the bounded queue applies
/// backpressure by blocking the sender when full.
#[derive(Clone)]
pub struct ExchangeHandle {
    tx: Sender<EngineMsg>,
}

impl ExchangeHandle {
    /// Enqueue an inbound message for the matching engine.
    ///
    /// # Errors
    /// [`ExchangeError::QueueClosed`] once the exchange has terminated.
    pub fn submit(&self, msg: InboundMessage) -> Result<(), ExchangeError> {
        self.tx
            .send(EngineMsg::Inbound(msg))
            .map_err(|_| ExchangeError::QueueClosed)
    }
}

/// One exchange instance: per-ticker order books behind a single matching
/// engine, a session controller owning the trading window, and tape files
/// for every persisted artifact.
///
/// `start()` spawns the engine and session threads; `terminate()` joins
/// them and must be invoked on every exit path.
pub struct StockExchange {
    config: ExchangeConfig,
    fabric: Arc<SubscriptionFabric>,
    session: Arc<SessionClock>,
    clock: Arc<SimClock>,
    tx: Option<Sender<EngineMsg>>,
    engine: Option<(MatchingEngine, crossbeam::channel::Receiver<EngineMsg>)>,
    session_thread: Option<JoinHandle<()>>,
}

impl StockExchange {
    /// Build an exchange from configuration, opening the tape files under
    /// the configured output directory.
    pub fn new(config: ExchangeConfig, transport: Arc<dyn Transport>) -> Result<Self, ExchangeError> {
        let config = config.validated()?;
        let tapes = TapeStore::open(&config.output_dir, &config.name, &config.tickers)?;
        Ok(Self::with_tapes(config, transport, tapes))
    }

    /// Build an exchange over explicit tape sinks. Used by in-process
    /// simulations and tests that want in-memory tapes.
    pub fn with_tapes(
        config: ExchangeConfig,
        transport: Arc<dyn Transport>,
        tapes: TapeStore,
    ) -> Self {
        let fabric = Arc::new(SubscriptionFabric::new(&config.tickers, transport));
        let session = Arc::new(SessionClock::new());
        let clock = Arc::new(SimClock::new());
        let (tx, rx) = bounded(config.queue_capacity);

        let engine = MatchingEngine::new(
            &config,
            tapes,
            Arc::clone(&fabric),
            Arc::clone(&session),
            Arc::clone(&clock),
        );

        Self {
            config,
            fabric,
            session,
            clock,
            tx: Some(tx),
            engine: Some((engine, rx)),
            session_thread: None,
        }
    }

    /// Producer handle for transport receivers.
    ///
    /// Panics after `terminate()`; handles must be taken while the
    /// exchange is alive.
    pub fn handle(&self) -> ExchangeHandle {
        ExchangeHandle {
            tx: self.tx.clone().expect("exchange terminated"),
        }
    }

    /// Shared session-state view.
    pub fn session(&self) -> Arc<SessionClock> {
        Arc::clone(&self.session)
    }

    /// The subscription fabric, shared with the session controller.
    pub fn fabric(&self) -> Arc<SubscriptionFabric> {
        Arc::clone(&self.fabric)
    }

    /// Spawn the matching-engine and session-controller threads.
    ///
    /// Panics if called twice.
    pub fn start(&mut self) {
        let (mut engine, rx) = self.engine.take().expect("exchange already started");
        let engine_thread = std::thread::Builder::new()
            .name(format!("{}-engine", self.config.name))
            .spawn(move || {
                engine.run(&rx);
                engine
            })
            .expect("failed to spawn matching engine thread");

        let controller = SessionController::new(
            self.config.connect_window(),
            self.config.trading_window(),
            self.config.technical_ready_delay(),
            self.config.idle_grace(),
            Arc::clone(&self.fabric),
            Arc::clone(&self.session),
            Arc::clone(&self.clock),
            self.tx.clone().expect("queue open at start"),
            engine_thread,
        );
        let session_thread = std::thread::Builder::new()
            .name(format!("{}-session", self.config.name))
            .spawn(move || controller.run())
            .expect("failed to spawn session thread");

        self.session_thread = Some(session_thread);
        info!("{}: exchange started", self.config.name);
    }

    /// Join the session controller (which itself joins the engine), then
    /// close the inbound queue. Blocks until the trading window has run
    /// its course.
    pub fn terminate(&mut self) {
        if let Some(thread) = self.session_thread.take() {
            thread.join().expect("session thread panicked");
        }
        self.tx = None;
        info!("{}: exchange terminated", self.config.name);
    }
}

impl Drop for StockExchange {
    fn drop(&mut self) {
        // terminate() is the supported shutdown path; this is a backstop so
        // a dropped exchange never leaks running threads.
        if self.session_thread.is_some() {
            self.terminate();
        }
    }
}
