//! UDP Transport
//!
//! Datagrams over a single bound socket. Endpoints are mapped to socket
//! addresses through a [`Directory`] built from the service description.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, warn};

use super::{RawReceive, Transport};
use crate::buffer::BufferPool;
use crate::error::Result;
use crate::identity::Endpoint;

/// Largest payload a UDP/IPv4 datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Smallest read timeout handed to the socket (zero means "block forever")
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Two-way mapping between endpoints and socket addresses
#[derive(Debug, Clone, Default)]
pub struct Directory {
    by_endpoint: HashMap<Endpoint, SocketAddr>,
    by_addr: HashMap<SocketAddr, Endpoint>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, endpoint: Endpoint, addr: SocketAddr) {
        self.by_addr.insert(addr, endpoint.clone());
        self.by_endpoint.insert(endpoint, addr);
    }

    pub fn address_of(&self, endpoint: &Endpoint) -> Option<SocketAddr> {
        self.by_endpoint.get(endpoint).copied()
    }

    pub fn endpoint_of(&self, addr: &SocketAddr) -> Option<&Endpoint> {
        self.by_addr.get(addr)
    }

    pub fn len(&self) -> usize {
        self.by_endpoint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_endpoint.is_empty()
    }
}

/// Transport over a UDP socket
pub struct UdpTransport {
    socket: UdpSocket,
    directory: Directory,
    buffers: BufferPool,
}

impl UdpTransport {
    /// Bind a socket on `addr` (e.g. `0.0.0.0:0`)
    pub fn bind(addr: &str, directory: Directory, buffers: BufferPool) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        debug!("UDP transport bound to {}", socket.local_addr()?);
        Ok(Self {
            socket,
            directory,
            buffers,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Register peers learned after binding
    pub fn directory_mut(&mut self) -> &mut Directory {
        &mut self.directory
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, destination: &Endpoint, payload: &[u8]) -> bool {
        let Some(addr) = self.directory.address_of(destination) else {
            warn!("No address known for endpoint {}", destination);
            return false;
        };

        match self.socket.send_to(payload, addr) {
            Ok(sent) => sent == payload.len(),
            Err(e) => {
                warn!("Send to {} failed: {}", addr, e);
                false
            }
        }
    }

    fn receive(&mut self, timeout: Duration) -> RawReceive {
        if let Err(e) = self.socket.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT))) {
            warn!("Failed to set read timeout: {}", e);
            return RawReceive::failed();
        }

        let mut lease = self.buffers.lease(MAX_DATAGRAM_SIZE);
        match self.socket.recv_from(&mut lease) {
            Ok((len, from)) => match self.directory.endpoint_of(&from) {
                Some(source) => {
                    lease.truncate(len);
                    RawReceive::datagram(source.clone(), lease.to_vec())
                }
                None => {
                    debug!("Dropping {} bytes from unknown peer {}", len, from);
                    RawReceive::failed()
                }
            },
            // Unix reports WouldBlock on read timeout, Windows reports TimedOut
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                RawReceive::timed_out()
            }
            Err(e) => {
                warn!("Receive failed: {}", e);
                RawReceive::failed()
            }
        }
    }
}
