//! Subscription fabric: per-ticker subscriber sets and randomized fan-out.

use crate::error::ExchangeError;
use crate::messages::OutboundMessage;
use crate::net::Transport;
use crate::order::AgentId;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Tracks who is subscribed to which ticker and delivers exchange output:
/// execution reports unicast to their originator, market-data and event
/// broadcasts fanned out per ticker.
///
/// Each broadcast works on a snapshot copy of the subscriber set, shuffled
/// with a uniform permutation before sequential delivery. Without the
/// shuffle, subscribers near the head of the iteration would consistently
/// see market data first and gain a standing latency advantage; the
/// shuffle bounds that advantage to a single event.
pub struct SubscriptionFabric {
    transport: Arc<dyn Transport>,
    /// ticker -> subscriber id -> callback endpoint.
    subscribers: RwLock<HashMap<String, HashMap<AgentId, String>>>,
    /// subscriber id -> endpoint, across all tickers, for unicasts.
    endpoints: RwLock<HashMap<AgentId, String>>,
    rng: Mutex<StdRng>,
}

impl SubscriptionFabric {
    /// Create a fabric listing `tickers`, delivering through `transport`.
    pub fn new(tickers: &[String], transport: Arc<dyn Transport>) -> Self {
        Self::with_rng_seed_impl(tickers, transport, StdRng::from_os_rng())
    }

    /// Create a fabric with a deterministic shuffle order, for tests.
    pub fn with_rng_seed(tickers: &[String], transport: Arc<dyn Transport>, seed: u64) -> Self {
        Self::with_rng_seed_impl(tickers, transport, StdRng::seed_from_u64(seed))
    }

    fn with_rng_seed_impl(tickers: &[String], transport: Arc<dyn Transport>, rng: StdRng) -> Self {
        let subscribers = tickers
            .iter()
            .map(|ticker| (ticker.clone(), HashMap::new()))
            .collect();
        Self {
            transport,
            subscribers: RwLock::new(subscribers),
            endpoints: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
        }
    }

    /// The tickers this fabric was created with.
    pub fn tickers(&self) -> Vec<String> {
        self.subscribers.read().keys().cloned().collect()
    }

    /// Register `subscriber_id` for `ticker` broadcasts at `endpoint`.
    ///
    /// Returns `true` when this agent was not previously known to the
    /// exchange on any ticker (used by the connect-phase admission watch).
    ///
    /// # Errors
    /// [`ExchangeError::UnknownTicker`] when the ticker is not listed; the
    /// fabric is left unchanged.
    pub fn subscribe(
        &self,
        ticker: &str,
        subscriber_id: AgentId,
        endpoint: &str,
    ) -> Result<bool, ExchangeError> {
        let mut subscribers = self.subscribers.write();
        let set = subscribers
            .get_mut(ticker)
            .ok_or_else(|| ExchangeError::UnknownTicker(ticker.to_string()))?;
        set.insert(subscriber_id, endpoint.to_string());

        let is_new = self
            .endpoints
            .write()
            .insert(subscriber_id, endpoint.to_string())
            .is_none();
        info!(
            "agent {} subscribed to {} at {}{}",
            subscriber_id,
            ticker,
            endpoint,
            if is_new { "" } else { " (already known)" }
        );
        Ok(is_new)
    }

    /// Number of distinct agents subscribed across all tickers.
    pub fn subscriber_count(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Broadcast a message to every subscriber of `ticker`, in a fresh
    /// uniformly random order. Transport failures are logged and skipped;
    /// the next event's broadcast restores visibility.
    pub fn broadcast(&self, ticker: &str, message: &OutboundMessage) {
        let mut targets: Vec<(AgentId, String)> = {
            let subscribers = self.subscribers.read();
            match subscribers.get(ticker) {
                Some(set) => set.iter().map(|(id, ep)| (*id, ep.clone())).collect(),
                None => {
                    warn!("broadcast for unlisted ticker {ticker}");
                    return;
                }
            }
        };

        targets.shuffle(&mut *self.rng.lock());

        for (subscriber_id, endpoint) in targets {
            if let Err(e) = self.transport.send_broadcast(&endpoint, message) {
                warn!("broadcast to agent {subscriber_id} failed: {e}");
            }
        }
    }

    /// Broadcast a message to the subscribers of every ticker. An agent
    /// subscribed to several tickers receives one copy per ticker, matching
    /// the per-ticker fan-out semantics.
    pub fn broadcast_all(&self, message: &OutboundMessage) {
        for ticker in self.tickers() {
            self.broadcast(&ticker, message);
        }
    }

    /// Unicast a message to one agent via its registered endpoint.
    /// Unknown agents (never subscribed) are logged and dropped.
    pub fn unicast(&self, subscriber_id: AgentId, message: &OutboundMessage) {
        let endpoint = self.endpoints.read().get(&subscriber_id).cloned();
        match endpoint {
            Some(endpoint) => {
                if let Err(e) = self.transport.send_unicast(&endpoint, message) {
                    warn!("unicast to agent {subscriber_id} failed: {e}");
                }
            }
            None => warn!("unicast to unknown agent {subscriber_id} dropped"),
        }
    }

    /// Send a message to a single endpoint over the broadcast channel.
    /// Used for the targeted session-start sent to late subscribers.
    pub fn send_to_endpoint(&self, endpoint: &str, message: &OutboundMessage) {
        if let Err(e) = self.transport.send_broadcast(endpoint, message) {
            warn!("targeted send to {endpoint} failed: {e}");
        }
    }
}
