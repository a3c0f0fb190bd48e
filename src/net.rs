//! Transport seam between the exchange core and the outside world.
//!
//! The core only ever calls the two primitives below; framing, sockets and
//! retries belong to the transport implementation. An in-process
//! channel-backed transport is provided for simulations and tests.

use crate::error::ExchangeError;
use crate::messages::OutboundMessage;
use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Delivery primitives the exchange core consumes.
pub trait Transport: Send + Sync {
    /// Deliver a message addressed to one endpoint over the direct channel.
    fn send_unicast(&self, endpoint: &str, message: &OutboundMessage)
    -> Result<(), ExchangeError>;

    /// Deliver a message to one endpoint over the broadcast channel.
    fn send_broadcast(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<(), ExchangeError>;
}

/// In-process transport: every endpoint is a channel registered by name.
///
/// Both primitives deliver into the same per-endpoint queue, so a receiver
/// observes unicasts and broadcasts in exactly the order the engine sent
/// them.
#[derive(Default)]
pub struct LocalTransport {
    endpoints: RwLock<HashMap<String, Sender<OutboundMessage>>>,
}

impl LocalTransport {
    /// Create a transport with no endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint and return the receiving end of its queue.
    /// Re-registering a name replaces the previous queue.
    pub fn register(&self, endpoint: &str) -> Receiver<OutboundMessage> {
        let (tx, rx) = unbounded();
        self.endpoints.write().insert(endpoint.to_string(), tx);
        rx
    }

    fn deliver(&self, endpoint: &str, message: &OutboundMessage) -> Result<(), ExchangeError> {
        let endpoints = self.endpoints.read();
        let tx = endpoints
            .get(endpoint)
            .ok_or_else(|| ExchangeError::Transport {
                endpoint: endpoint.to_string(),
                reason: "endpoint not registered".to_string(),
            })?;
        tx.send(message.clone()).map_err(|_| ExchangeError::Transport {
            endpoint: endpoint.to_string(),
            reason: "receiver dropped".to_string(),
        })
    }
}

impl Transport for LocalTransport {
    fn send_unicast(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<(), ExchangeError> {
        self.deliver(endpoint, message)
    }

    fn send_broadcast(
        &self,
        endpoint: &str,
        message: &OutboundMessage,
    ) -> Result<(), ExchangeError> {
        self.deliver(endpoint, message)
    }
}
