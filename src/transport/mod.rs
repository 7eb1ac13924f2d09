//! Transport Module
//!
//! Best-effort datagram send/receive keyed by endpoints.
//!
//! ## Implementations
//! - [`UdpTransport`]: UDP sockets with an endpoint directory
//! - [`MemoryTransport`]: in-process network over channels, used by tests
//!   and local simulations
//!
//! Transports may lose, duplicate or reorder datagrams. Reliability is the
//! session's job, not the transport's.

mod memory;
mod udp;

use std::time::Duration;

use crate::identity::Endpoint;

pub use memory::{MemoryNetwork, MemoryTransport};
pub use udp::{Directory, UdpTransport, MAX_DATAGRAM_SIZE};

/// Result of one bounded receive, as reported by the transport
///
/// Only `ok && !timed_out` with a payload present carries data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReceive {
    pub ok: bool,
    pub timed_out: bool,
    pub source: Option<Endpoint>,
    pub payload: Option<Vec<u8>>,
}

impl RawReceive {
    pub fn datagram(source: Endpoint, payload: Vec<u8>) -> Self {
        Self {
            ok: true,
            timed_out: false,
            source: Some(source),
            payload: Some(payload),
        }
    }

    pub fn timed_out() -> Self {
        Self {
            ok: true,
            timed_out: true,
            source: None,
            payload: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            ok: false,
            timed_out: false,
            source: None,
            payload: None,
        }
    }
}

/// Unreliable datagram transport
pub trait Transport {
    /// Send `payload` to `destination`
    ///
    /// `false` reports a local failure (unknown destination, socket error),
    /// never a protocol error.
    fn send(&mut self, destination: &Endpoint, payload: &[u8]) -> bool;

    /// Block for at most `timeout` waiting for the next datagram
    fn receive(&mut self, timeout: Duration) -> RawReceive;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, destination: &Endpoint, payload: &[u8]) -> bool {
        (**self).send(destination, payload)
    }

    fn receive(&mut self, timeout: Duration) -> RawReceive {
        (**self).receive(timeout)
    }
}
