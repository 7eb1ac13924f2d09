//! In-process Transport
//!
//! A shared routing table of channel senders keyed by endpoint. Every
//! attached transport owns the receiving half of its own inbox.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::trace;

use super::{RawReceive, Transport};
use crate::identity::Endpoint;

type Datagram = (Endpoint, Vec<u8>);

/// Routing table shared by all attached [`MemoryTransport`]s
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    routes: Arc<Mutex<HashMap<Endpoint, Sender<Datagram>>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a transport reachable at `endpoint`
    ///
    /// Re-attaching an endpoint replaces its previous inbox.
    pub fn attach(&self, endpoint: Endpoint) -> MemoryTransport {
        let (tx, rx) = channel::unbounded();
        self.routes.lock().insert(endpoint.clone(), tx);
        MemoryTransport {
            local: endpoint,
            network: self.clone(),
            inbox: rx,
        }
    }

    /// Make `endpoint` unreachable; later sends to it fail
    pub fn detach(&self, endpoint: &Endpoint) {
        self.routes.lock().remove(endpoint);
    }

    fn route(&self, destination: &Endpoint) -> Option<Sender<Datagram>> {
        self.routes.lock().get(destination).cloned()
    }
}

/// One participant's view of a [`MemoryNetwork`]
pub struct MemoryTransport {
    local: Endpoint,
    network: MemoryNetwork,
    inbox: Receiver<Datagram>,
}

impl MemoryTransport {
    /// Endpoint other participants use to reach this transport
    pub fn local(&self) -> &Endpoint {
        &self.local
    }

    /// Datagrams waiting in the inbox
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, destination: &Endpoint, payload: &[u8]) -> bool {
        match self.network.route(destination) {
            Some(tx) => {
                trace!("memory: {} -> {} ({} bytes)", self.local, destination, payload.len());
                tx.send((self.local.clone(), payload.to_vec())).is_ok()
            }
            None => false,
        }
    }

    fn receive(&mut self, timeout: Duration) -> RawReceive {
        match self.inbox.recv_timeout(timeout) {
            Ok((source, payload)) => RawReceive::datagram(source, payload),
            Err(RecvTimeoutError::Timeout) => RawReceive::timed_out(),
            Err(RecvTimeoutError::Disconnected) => {
                // Inbox replaced by a re-attach; the wait stays bounded.
                std::thread::sleep(timeout);
                RawReceive::failed()
            }
        }
    }
}
