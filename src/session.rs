//! Session Module
//!
//! Reliable request/response delivery over an unreliable transport.
//!
//! ## Responsibilities
//! - Assign sequence numbers (1, 2, 3, ... per session)
//! - Send a request and block until the matching response arrives
//! - Retransmit the identical bytes on timeout (policy permitting)
//! - Acknowledge every received non-ack message (policy permitting)
//! - Recognise redirects for keys delegated to another server
//! - Acknowledge but otherwise ignore repeats of already-seen server messages
//!
//! ## Concurrency Model
//! One session per worker thread, one request outstanding at a time.
//! The session exclusively owns its transport; only the [`Instrumentation`]
//! handle is shared with other workers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, error, trace, warn};

use crate::identity::{
    ClientIdentity, Endpoint, EndpointHasher, PublicKey, Sha256Hasher, MAX_ENDPOINT_LEN,
};
use crate::metrics::{Counter, Instrumentation, ENCODE_TIME, REQUEST_LATENCY};
use crate::protocol::{self, InboundMessage, KeyRange, OutboundMessage, ParseError};
use crate::transport::Transport;

/// Receive bound used when none is configured
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(1000);

/// What response completes a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitMode {
    /// A `Reply` carrying the expected key
    Reply,

    /// A `Redirect` carrying the expected key
    Redirect,

    /// Any `Ack` (a matching `Reply` also completes)
    AckOnly,
}

impl AwaitMode {
    /// Whether `message` completes a request waiting for `expected_key`
    pub fn is_satisfied_by(&self, message: &InboundMessage, expected_key: u64) -> bool {
        match (self, message) {
            (AwaitMode::AckOnly, InboundMessage::Ack { .. }) => true,
            (AwaitMode::Reply | AwaitMode::AckOnly, InboundMessage::Reply { key, .. }) => {
                *key == expected_key
            }
            (AwaitMode::Redirect, InboundMessage::Redirect { key, .. }) => *key == expected_key,
            _ => false,
        }
    }
}

/// Reaction to a receive that produced no datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Retransmit the request (same seqno, same bytes)
    Resend,

    /// Keep waiting without sending anything
    Wait,
}

/// When received messages get acknowledged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Acknowledge every non-ack message
    Immediate,

    /// Acknowledge only while the outstanding request's seqno is a multiple
    /// of `every`
    Batched { every: u64 },
}

impl AckPolicy {
    pub fn should_ack(&self, request_seqno: u64) -> bool {
        match self {
            AckPolicy::Immediate => true,
            AckPolicy::Batched { every } => *every != 0 && request_seqno % every == 0,
        }
    }
}

/// Retransmission and acknowledgment discipline of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub on_timeout: TimeoutAction,
    pub ack: AckPolicy,
}

impl DeliveryPolicy {
    /// Bulk population: resend on timeout, ack everything
    pub fn populate() -> Self {
        Self {
            on_timeout: TimeoutAction::Resend,
            ack: AckPolicy::Immediate,
        }
    }

    /// Steady workload: resend on timeout, ack in batches
    pub fn steady(ack_batch_interval: u64) -> Self {
        Self {
            on_timeout: TimeoutAction::Resend,
            ack: AckPolicy::Batched {
                every: ack_batch_interval,
            },
        }
    }

    /// Scripted scenario: never resend, ack everything
    pub fn scripted() -> Self {
        Self {
            on_timeout: TimeoutAction::Wait,
            ack: AckPolicy::Immediate,
        }
    }
}

/// Classified outcome of one bounded receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receipt {
    /// A well-formed message
    Message {
        source: Endpoint,
        message: InboundMessage,
    },

    /// Bytes arrived but did not parse; already logged
    Unparsable { source: Endpoint, error: ParseError },

    /// Nothing arrived within the bound
    TimedOut,

    /// The transport failed, or reported an unusable source identity
    Failed,
}

/// The request currently awaiting its response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outstanding {
    pub seqno: u64,
    pub expected_key: u64,
    pub mode: AwaitMode,
}

/// A request that found its matching response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub seqno: u64,

    /// Transmissions of the request, first send included
    pub attempts: u32,

    /// From first send to receipt of the matching response
    pub elapsed: Duration,

    pub response: InboundMessage,
    pub source: Endpoint,
}

/// Per-worker client state machine
pub struct ClientSession<T: Transport, H: EndpointHasher = Sha256Hasher> {
    worker: usize,
    last_seqno: u64,
    identity: ClientIdentity,
    transport: T,
    hasher: H,
    rng: SmallRng,
    metrics: Instrumentation,
    receive_timeout: Duration,
    outstanding: Option<Outstanding>,
    completed: u64,

    /// Highest Reply/Redirect seqno seen from each server
    delivered: HashMap<Endpoint, u64>,
}

impl<T: Transport, H: EndpointHasher> ClientSession<T, H> {
    /// Create a session with an entropy-seeded RNG and the default timeout
    pub fn new(
        worker: usize,
        identity: ClientIdentity,
        transport: T,
        hasher: H,
        metrics: Instrumentation,
    ) -> Self {
        Self {
            worker,
            last_seqno: 0,
            identity,
            transport,
            hasher,
            rng: SmallRng::from_entropy(),
            metrics,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            outstanding: None,
            completed: 0,
            delivered: HashMap::new(),
        }
    }

    /// Reseed the payload RNG for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    // =========================================================================
    // Sequence Numbers and Message Construction
    // =========================================================================

    /// Claim the next sequence number
    pub fn next_seqno(&mut self) -> u64 {
        self.last_seqno += 1;
        self.last_seqno
    }

    /// Last sequence number claimed (0 before the first request)
    pub fn last_seqno(&self) -> u64 {
        self.last_seqno
    }

    pub fn get_message(&self, seqno: u64, key: u64) -> OutboundMessage {
        OutboundMessage::Get {
            seqno,
            requester: self.identity.public_key().clone(),
            key,
        }
    }

    /// Set request with `value_size` random bytes drawn from the session RNG
    pub fn set_message(&mut self, seqno: u64, key: u64, value_size: usize) -> OutboundMessage {
        let value = self.random_value(value_size);
        OutboundMessage::Set {
            seqno,
            requester: self.identity.public_key().clone(),
            key,
            value: Some(value),
        }
    }

    pub fn delete_message(&self, seqno: u64, key: u64) -> OutboundMessage {
        OutboundMessage::Set {
            seqno,
            requester: self.identity.public_key().clone(),
            key,
            value: None,
        }
    }

    pub fn shard_message(
        &self,
        seqno: u64,
        range: KeyRange,
        recipient: &PublicKey,
    ) -> OutboundMessage {
        OutboundMessage::Shard {
            seqno,
            requester: self.identity.public_key().clone(),
            range,
            recipient: recipient.clone(),
        }
    }

    pub fn get_request(&mut self, key: u64) -> OutboundMessage {
        let seqno = self.next_seqno();
        self.get_message(seqno, key)
    }

    pub fn set_request(&mut self, key: u64, value_size: usize) -> OutboundMessage {
        let seqno = self.next_seqno();
        self.set_message(seqno, key, value_size)
    }

    pub fn delete_request(&mut self, key: u64) -> OutboundMessage {
        let seqno = self.next_seqno();
        self.delete_message(seqno, key)
    }

    pub fn shard_request(&mut self, range: KeyRange, recipient: &PublicKey) -> OutboundMessage {
        let seqno = self.next_seqno();
        self.shard_message(seqno, range, recipient)
    }

    pub fn random_value(&mut self, len: usize) -> Vec<u8> {
        let mut value = vec![0u8; len];
        self.rng.fill_bytes(&mut value);
        value
    }

    // =========================================================================
    // Raw Passthroughs
    // =========================================================================

    /// Routable endpoint of a participant's public key
    pub fn resolve(&self, key: &PublicKey) -> Endpoint {
        self.hasher.hash_public_key(key)
    }

    /// Encode and send once; `false` on local send failure
    pub fn send(&mut self, message: &OutboundMessage, destination: &Endpoint) -> bool {
        let bytes = self.encode(message);
        self.transmit(&bytes, destination)
    }

    /// Acknowledge the peer's message `acked_seqno`
    pub fn send_ack(&mut self, acked_seqno: u64, destination: &Endpoint) -> bool {
        trace!("Acking seqno {} to {}", acked_seqno, destination);
        let sent = self.send(&OutboundMessage::Ack { acked_seqno }, destination);
        if sent {
            self.metrics.incr(Counter::AcksSent);
        }
        sent
    }

    /// Acknowledge `message` unless it is itself an ack
    pub fn acknowledge(&mut self, message: &InboundMessage, source: &Endpoint) -> bool {
        match message.ack_target() {
            Some(seqno) => self.send_ack(seqno, source),
            None => false,
        }
    }

    /// Wait up to `timeout` for one datagram and classify it
    pub fn receive(&mut self, timeout: Duration) -> Receipt {
        let raw = self.transport.receive(timeout);

        if !raw.ok {
            self.metrics.incr(Counter::ReceiveFailures);
            return Receipt::Failed;
        }
        if raw.timed_out {
            self.metrics.incr(Counter::Timeouts);
            return Receipt::TimedOut;
        }

        let (source, payload) = match (raw.source, raw.payload) {
            (Some(source), Some(payload)) => (source, payload),
            _ => {
                self.metrics.incr(Counter::ReceiveFailures);
                return Receipt::Failed;
            }
        };

        if source.len() > MAX_ENDPOINT_LEN {
            warn!(
                "Rejecting datagram with oversized source identity ({} > {} bytes)",
                source.len(),
                MAX_ENDPOINT_LEN
            );
            self.metrics.incr(Counter::ReceiveFailures);
            return Receipt::Failed;
        }

        match protocol::decode(&payload) {
            Ok(message) => {
                trace!("Received {} from {}", message, source);
                match message {
                    InboundMessage::Reply { .. } => self.metrics.incr(Counter::Replies),
                    InboundMessage::Redirect { .. } => self.metrics.incr(Counter::Redirects),
                    InboundMessage::Ack { .. } => self.metrics.incr(Counter::AcksReceived),
                }
                Receipt::Message { source, message }
            }
            Err(error) => {
                warn!("Dropping {} byte datagram from {}: {}", payload.len(), source, error);
                self.metrics.incr(Counter::ParseFailures);
                Receipt::Unparsable { source, error }
            }
        }
    }

    // =========================================================================
    // Reliable Delivery
    // =========================================================================

    /// Send `message` and block until a response satisfying `mode` for
    /// `expected_key` arrives
    ///
    /// There is no retry limit: the call returns only on a match. An ack
    /// has no response to wait for and yields `None` without being sent.
    pub fn send_and_await(
        &mut self,
        message: &OutboundMessage,
        destination: &Endpoint,
        expected_key: u64,
        mode: AwaitMode,
        policy: &DeliveryPolicy,
    ) -> Option<Completion> {
        let Some(seqno) = message.seqno() else {
            error!("Refusing to await a response to an ack");
            return None;
        };
        let bytes = self.encode(message);

        self.outstanding = Some(Outstanding {
            seqno,
            expected_key,
            mode,
        });
        self.metrics.incr(Counter::Requests);

        let started = Instant::now();
        let mut attempts = 1u32;
        self.transmit(&bytes, destination);

        loop {
            match self.receive(self.receive_timeout) {
                Receipt::TimedOut | Receipt::Failed => match policy.on_timeout {
                    TimeoutAction::Resend => {
                        warn!("#timeout; retransmitting seqno {} to {}", seqno, destination);
                        attempts += 1;
                        self.metrics.incr(Counter::Retransmissions);
                        self.transmit(&bytes, destination);
                    }
                    TimeoutAction::Wait => {
                        warn!("#timeout; still waiting on seqno {} from {}", seqno, destination);
                    }
                },
                Receipt::Unparsable { .. } => {}
                Receipt::Message { source, message } => {
                    if policy.ack.should_ack(seqno) {
                        self.acknowledge(&message, &source);
                    }

                    if self.already_delivered(&message, &source) {
                        trace!("Ignoring duplicate {} from {}", message, source);
                        self.metrics.incr(Counter::Duplicates);
                        continue;
                    }

                    if mode.is_satisfied_by(&message, expected_key) {
                        let elapsed = started.elapsed();
                        self.outstanding = None;
                        self.completed += 1;
                        self.metrics.record(REQUEST_LATENCY, elapsed);
                        debug!(
                            "Seqno {} completed by {} after {} attempt(s)",
                            seqno, message, attempts
                        );
                        return Some(Completion {
                            seqno,
                            attempts,
                            elapsed,
                            response: message,
                            source,
                        });
                    }

                    trace!(
                        "Ignoring {} while awaiting {:?} for key {}",
                        message,
                        mode,
                        expected_key
                    );
                }
            }
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// The request being waited on, if any
    pub fn outstanding(&self) -> Option<Outstanding> {
        self.outstanding
    }

    /// Requests that found their matching response
    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    pub fn metrics(&self) -> &Instrumentation {
        &self.metrics
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Whether `message` repeats one already seen from `source`; records it
    /// otherwise
    ///
    /// Servers number their messages to us in increasing order, so anything
    /// at or below the high-water mark is a duplicate.
    fn already_delivered(&mut self, message: &InboundMessage, source: &Endpoint) -> bool {
        let Some(seqno) = message.ack_target() else {
            return false;
        };
        match self.delivered.get_mut(source) {
            Some(highest) if seqno <= *highest => true,
            Some(highest) => {
                *highest = seqno;
                false
            }
            None => {
                self.delivered.insert(source.clone(), seqno);
                false
            }
        }
    }

    fn encode(&self, message: &OutboundMessage) -> Bytes {
        let started = Instant::now();
        let bytes = protocol::encode(message);
        self.metrics.record(ENCODE_TIME, started.elapsed());
        bytes
    }

    fn transmit(&mut self, bytes: &[u8], destination: &Endpoint) -> bool {
        self.metrics.incr(Counter::Transmissions);
        let sent = self.transport.send(destination, bytes);
        if !sent {
            warn!("Failed to send {} bytes to {}", bytes.len(), destination);
            self.metrics.incr(Counter::SendFailures);
        }
        sent
    }
}
