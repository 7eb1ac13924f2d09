//! Shared test fixtures
//!
//! Server-side wire helpers, a scripted transport and a small in-memory
//! server that speaks just enough of the protocol to drive a client.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use keyshard::metrics::Instrumentation;
use keyshard::protocol::KeyRange;
use keyshard::transport::{MemoryNetwork, MemoryTransport, RawReceive, Transport};
use keyshard::{ClientIdentity, ClientSession, Endpoint, PublicKey, Sha256Hasher};
use parking_lot::Mutex;

// =============================================================================
// Wire Helpers
// =============================================================================

pub fn le(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

fn envelope(seqno: u64, destination: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00];
    out.extend_from_slice(&le(seqno));
    out.extend_from_slice(&le(destination.len() as u64));
    out.extend_from_slice(destination);
    out
}

/// Bytes of a server Reply; the trailing value is what real servers append
pub fn reply_bytes(seqno: u64, destination: &[u8], key: u64) -> Vec<u8> {
    let mut out = envelope(seqno, destination);
    out.push(0x02);
    out.extend_from_slice(&le(key));
    out.push(0x00);
    out
}

pub fn redirect_bytes(seqno: u64, destination: &[u8], key: u64) -> Vec<u8> {
    let mut out = envelope(seqno, destination);
    out.push(0x03);
    out.extend_from_slice(&le(key));
    let delegate = [0xEE; 4];
    out.extend_from_slice(&le(delegate.len() as u64));
    out.extend_from_slice(&delegate);
    out
}

pub fn ack_bytes(acked_seqno: u64) -> Vec<u8> {
    let mut out = vec![0x01];
    out.extend_from_slice(&le(acked_seqno));
    out
}

/// A client message as a server sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get {
        seqno: u64,
        requester: Vec<u8>,
        key: u64,
    },
    Set {
        seqno: u64,
        requester: Vec<u8>,
        key: u64,
        value: Option<Vec<u8>>,
    },
    Shard {
        seqno: u64,
        requester: Vec<u8>,
        range: KeyRange,
        recipient: Vec<u8>,
    },
    Ack {
        acked_seqno: u64,
    },
}

impl Request {
    pub fn seqno(&self) -> Option<u64> {
        match self {
            Request::Get { seqno, .. }
            | Request::Set { seqno, .. }
            | Request::Shard { seqno, .. } => Some(*seqno),
            Request::Ack { .. } => None,
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> u8 {
        let (first, rest) = self.buf.split_first().expect("short request");
        self.buf = rest;
        *first
    }

    fn u64(&mut self) -> u64 {
        let (head, rest) = self.buf.split_at(8);
        self.buf = rest;
        u64::from_le_bytes(head.try_into().expect("eight bytes"))
    }

    fn bytes(&mut self) -> Vec<u8> {
        let len = self.u64() as usize;
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        head.to_vec()
    }

    fn option_u64(&mut self) -> Option<u64> {
        match self.u8() {
            0 => None,
            1 => Some(self.u64()),
            tag => panic!("bad option tag {}", tag),
        }
    }
}

/// Parse a client message; panics on anything a correct client never sends
pub fn parse_request(bytes: &[u8]) -> Request {
    let mut reader = Reader { buf: bytes };
    match reader.u8() {
        0x01 => Request::Ack {
            acked_seqno: reader.u64(),
        },
        0x00 => {
            let seqno = reader.u64();
            let requester = reader.bytes();
            let request = match reader.u8() {
                0x00 => Request::Get {
                    seqno,
                    requester,
                    key: reader.u64(),
                },
                0x01 => {
                    let key = reader.u64();
                    let value = match reader.u8() {
                        0 => None,
                        1 => Some(reader.bytes()),
                        tag => panic!("bad option tag {}", tag),
                    };
                    Request::Set {
                        seqno,
                        requester,
                        key,
                        value,
                    }
                }
                0x04 => {
                    let low = reader.option_u64();
                    let high = reader.option_u64();
                    Request::Shard {
                        seqno,
                        requester,
                        range: KeyRange { low, high },
                        recipient: reader.bytes(),
                    }
                }
                tag => panic!("unexpected inner tag {}", tag),
            };
            assert!(reader.buf.is_empty(), "trailing bytes in request");
            request
        }
        tag => panic!("unexpected top-level tag {}", tag),
    }
}

// =============================================================================
// Scripted Transport
// =============================================================================

/// Everything a [`ScriptedTransport`] was asked to send
#[derive(Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<(Endpoint, Vec<u8>)>>>);

impl SentLog {
    pub fn requests(&self) -> Vec<Request> {
        self.0.lock().iter().map(|(_, bytes)| parse_request(bytes)).collect()
    }

    pub fn destinations(&self) -> Vec<Endpoint> {
        self.0.lock().iter().map(|(to, _)| to.clone()).collect()
    }

    pub fn raw(&self) -> Vec<Vec<u8>> {
        self.0.lock().iter().map(|(_, bytes)| bytes.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Transport that replays a fixed sequence of receive outcomes
///
/// Panics once the script runs dry so a mis-scripted test fails instead
/// of spinning forever.
pub struct ScriptedTransport {
    script: VecDeque<RawReceive>,
    sent: SentLog,
}

impl ScriptedTransport {
    pub fn new(script: Vec<RawReceive>) -> (Self, SentLog) {
        let sent = SentLog::default();
        let transport = Self {
            script: script.into(),
            sent: sent.clone(),
        };
        (transport, sent)
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, destination: &Endpoint, payload: &[u8]) -> bool {
        self.sent.0.lock().push((destination.clone(), payload.to_vec()));
        true
    }

    fn receive(&mut self, _timeout: Duration) -> RawReceive {
        self.script.pop_front().expect("receive script exhausted")
    }
}

// =============================================================================
// Identities and Sessions
// =============================================================================

pub fn client_key() -> PublicKey {
    PublicKey::new(vec![0xC1; 16])
}

pub fn server_key(n: u8) -> PublicKey {
    PublicKey::new(vec![0x50 + n; 16])
}

pub fn endpoint_of(key: &PublicKey) -> Endpoint {
    use keyshard::EndpointHasher;
    Sha256Hasher.hash_public_key(key)
}

pub fn client_identity() -> ClientIdentity {
    ClientIdentity::new(client_key(), &Sha256Hasher)
}

pub fn scripted_session(
    script: Vec<RawReceive>,
) -> (ClientSession<ScriptedTransport>, SentLog) {
    let (transport, sent) = ScriptedTransport::new(script);
    let session = ClientSession::new(
        0,
        client_identity(),
        transport,
        Sha256Hasher,
        Instrumentation::new(),
    )
    .with_seed(7);
    (session, sent)
}

pub fn memory_session(
    network: &MemoryNetwork,
    timeout: Duration,
) -> ClientSession<MemoryTransport> {
    let identity = client_identity();
    let transport = network.attach(identity.endpoint().clone());
    ClientSession::new(0, identity, transport, Sha256Hasher, Instrumentation::new())
        .with_seed(7)
        .with_receive_timeout(timeout)
}

// =============================================================================
// Fake Server
// =============================================================================

/// How a [`FakeServer`] treats incoming requests
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerBehavior {
    /// Silently drop this many requests before answering any
    pub drop_first: usize,

    /// Send each Reply twice
    pub duplicate_replies: bool,

    /// Ack every request before answering it
    pub ack_requests: bool,
}

/// What a [`FakeServer`] saw during its lifetime
#[derive(Debug, Clone, Default)]
pub struct ServerLog {
    /// Every non-ack request, retransmissions included
    pub requests: Vec<Request>,

    /// Seqnos of our messages the client acknowledged
    pub acks: Vec<u64>,
}

impl ServerLog {
    pub fn request_seqnos(&self) -> Vec<u64> {
        self.requests.iter().filter_map(Request::seqno).collect()
    }
}

/// Server thread on a [`MemoryNetwork`]
///
/// Replies to Get and Set, acks Shard, and redirects keys it has
/// delegated away.
pub struct FakeServer {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<ServerLog>,
}

const POLL: Duration = Duration::from_millis(10);

impl FakeServer {
    pub fn spawn(network: &MemoryNetwork, key: &PublicKey, behavior: ServerBehavior) -> Self {
        Self::serve(network.attach(endpoint_of(key)), behavior)
    }

    /// Serve on any transport, e.g. a UDP socket
    pub fn serve<T>(mut transport: T, behavior: ServerBehavior) -> Self
    where
        T: Transport + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stopping = stop.clone();

        let handle = thread::spawn(move || {
            let mut log = ServerLog::default();
            let mut dropped = 0;
            let mut next_seqno = 0u64;
            let mut delegated: Vec<KeyRange> = Vec::new();

            loop {
                let raw = transport.receive(POLL);
                let (source, payload) = match (raw.source, raw.payload) {
                    (Some(source), Some(payload)) => (source, payload),
                    _ => {
                        if stopping.load(Ordering::SeqCst) {
                            break;
                        }
                        continue;
                    }
                };

                let request = parse_request(&payload);
                if let Request::Ack { acked_seqno } = request {
                    log.acks.push(acked_seqno);
                    continue;
                }
                log.requests.push(request.clone());

                if dropped < behavior.drop_first {
                    dropped += 1;
                    continue;
                }

                let seqno = request.seqno().unwrap_or_default();
                if behavior.ack_requests {
                    transport.send(&source, &ack_bytes(seqno));
                }

                match request {
                    Request::Get { requester, key, .. } | Request::Set { requester, key, .. } => {
                        next_seqno += 1;
                        if delegated.iter().any(|range| range.contains(key)) {
                            transport.send(&source, &redirect_bytes(next_seqno, &requester, key));
                        } else {
                            let reply = reply_bytes(next_seqno, &requester, key);
                            transport.send(&source, &reply);
                            if behavior.duplicate_replies {
                                transport.send(&source, &reply);
                            }
                        }
                    }
                    Request::Shard { range, .. } => {
                        delegated.push(range);
                        if !behavior.ack_requests {
                            transport.send(&source, &ack_bytes(seqno));
                        }
                    }
                    Request::Ack { .. } => unreachable!(),
                }
            }

            log
        });

        Self { stop, handle }
    }

    /// Drain the inbox, stop the thread and return what it saw
    pub fn stop(self) -> ServerLog {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.join().expect("fake server panicked")
    }
}
