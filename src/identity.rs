//! Identity Module
//!
//! Public keys name participants; endpoints are the routable hashes of those
//! keys. Every send is addressed to an endpoint, never to a raw key.

use std::fmt;

use sha2::{Digest, Sha256};

/// Largest source identity the delivery engine accepts from a transport
pub const MAX_ENDPOINT_LEN: usize = 0xFFFFF;

/// Raw long-form public key of a client or server
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse a hex-encoded key as found in description files
    pub fn from_hex(encoded: &str) -> Option<Self> {
        hex::decode(encoded.trim()).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.0[..self.0.len().min(8)];
        write!(f, "PublicKey({}.., {} bytes)", hex::encode(prefix), self.0.len())
    }
}

/// Fixed-length routable identifier derived from a public key
///
/// Produced by an [`EndpointHasher`]; transports hand back the same bytes
/// as the source of received datagrams.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint(Vec<u8>);

impl Endpoint {
    /// Wrap hash output or a transport-reported source identity
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Endpoint({})", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = &self.0[..self.0.len().min(6)];
        write!(f, "{}", hex::encode(prefix))
    }
}

/// Maps public keys to endpoints
///
/// Must be deterministic: the same key always yields the same endpoint.
pub trait EndpointHasher {
    fn hash_public_key(&self, key: &PublicKey) -> Endpoint;
}

/// SHA-256 of the raw key bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    /// Length of every endpoint this hasher produces
    pub const ENDPOINT_LEN: usize = 32;
}

impl EndpointHasher for Sha256Hasher {
    fn hash_public_key(&self, key: &PublicKey) -> Endpoint {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Endpoint::from_bytes(hasher.finalize().to_vec())
    }
}

/// The local client's identity: its public key and routable form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    public_key: PublicKey,
    endpoint: Endpoint,
}

impl ClientIdentity {
    pub fn new<H: EndpointHasher>(public_key: PublicKey, hasher: &H) -> Self {
        let endpoint = hasher.hash_public_key(&public_key);
        Self {
            public_key,
            endpoint,
        }
    }

    /// Key placed in the requester field of every outbound request
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}
