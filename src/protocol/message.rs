//! Message definitions
//!
//! Two disjoint variant sets: what the client sends and what it receives.

use crate::identity::PublicKey;

/// Top-level tag of an addressed (sequenced) message
pub const MESSAGE_TAG: u8 = 0x00;

/// Top-level tag of an acknowledgment
pub const ACK_TAG: u8 = 0x01;

/// Inner tag: read a key
pub const GET_TAG: u8 = 0x00;

/// Inner tag: write or delete a key
pub const SET_TAG: u8 = 0x01;

/// Inner tag: server reply carrying the requested key
pub const REPLY_TAG: u8 = 0x02;

/// Inner tag: key now owned by another server
pub const REDIRECT_TAG: u8 = 0x03;

/// Inner tag: delegate a key range to another server
pub const SHARD_TAG: u8 = 0x04;

/// Optional field marker: absent
pub const NONE_TAG: u8 = 0x00;

/// Optional field marker: present
pub const SOME_TAG: u8 = 0x01;

/// A contiguous key range, low bound inclusive and high bound exclusive
///
/// An absent bound leaves that side open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRange {
    pub low: Option<u64>,
    pub high: Option<u64>,
}

impl KeyRange {
    /// Range with both bounds present: `[low, high)`
    pub fn bounded(low: u64, high: u64) -> Self {
        Self {
            low: Some(low),
            high: Some(high),
        }
    }

    /// Range covering every key
    pub fn everything() -> Self {
        Self {
            low: None,
            high: None,
        }
    }

    pub fn contains(&self, key: u64) -> bool {
        self.low.map_or(true, |low| key >= low) && self.high.map_or(true, |high| key < high)
    }
}

/// A message the client encodes and sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// Read the value stored under `key`
    Get {
        seqno: u64,
        requester: PublicKey,
        key: u64,
    },

    /// Store `value` under `key`; `None` deletes the key
    Set {
        seqno: u64,
        requester: PublicKey,
        key: u64,
        value: Option<Vec<u8>>,
    },

    /// Ask the receiving server to hand `range` over to `recipient`
    Shard {
        seqno: u64,
        requester: PublicKey,
        range: KeyRange,
        recipient: PublicKey,
    },

    /// Acknowledge receipt of the peer's message `acked_seqno`
    Ack { acked_seqno: u64 },
}

impl OutboundMessage {
    /// Sequence number of an addressed request, `None` for an ack
    pub fn seqno(&self) -> Option<u64> {
        match self {
            OutboundMessage::Get { seqno, .. }
            | OutboundMessage::Set { seqno, .. }
            | OutboundMessage::Shard { seqno, .. } => Some(*seqno),
            OutboundMessage::Ack { .. } => None,
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, OutboundMessage::Ack { .. })
    }
}

/// A message the client receives and decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    /// The server handled a request for `key`
    Reply { seqno: u64, key: u64 },

    /// `key` has been delegated away from the server that sent this
    Redirect { seqno: u64, key: u64 },

    /// The server received our message `acked_seqno`
    Ack { acked_seqno: u64 },
}

impl InboundMessage {
    /// Sequence number to acknowledge, `None` for an ack
    ///
    /// Acks are never acknowledged, which breaks the ack chain.
    pub fn ack_target(&self) -> Option<u64> {
        match self {
            InboundMessage::Reply { seqno, .. } | InboundMessage::Redirect { seqno, .. } => {
                Some(*seqno)
            }
            InboundMessage::Ack { .. } => None,
        }
    }
}

impl std::fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InboundMessage::Reply { seqno, key } => {
                write!(f, "Reply(seqno={}, key={})", seqno, key)
            }
            InboundMessage::Redirect { seqno, key } => {
                write!(f, "Redirect(seqno={}, key={})", seqno, key)
            }
            InboundMessage::Ack { acked_seqno } => write!(f, "Ack({})", acked_seqno),
        }
    }
}
