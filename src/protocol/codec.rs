//! Protocol codec
//!
//! Pure encoding and decoding functions for the wire protocol.
//!
//! ## Outbound Layouts
//! ```text
//! GET:   Tag(0) seqno requester | Tag(0) key
//! SET:   Tag(0) seqno requester | Tag(1) key Tag(1) value
//!        (delete: Tag(0) in place of Tag(1) value)
//! SHARD: Tag(0) seqno requester | Tag(4) Tag(1) lo Tag(1) hi recipient
//! ACK:   Tag(1) acked_seqno
//! ```
//!
//! ## Inbound Layouts
//! ```text
//! REPLY:    Tag(0) seqno destination | Tag(2) key ...
//! REDIRECT: Tag(0) seqno destination | Tag(3) key ...
//! ACK:      Tag(1) acked_seqno
//! ```
//!
//! Decoding walks a cursor left to right and stops at the first short read.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::message::{
    InboundMessage, KeyRange, OutboundMessage, ACK_TAG, GET_TAG, MESSAGE_TAG, NONE_TAG,
    REDIRECT_TAG, REPLY_TAG, SET_TAG, SHARD_TAG, SOME_TAG,
};

const TAG_SIZE: usize = 1;
const U64_SIZE: usize = 8;

/// Field the decoder was reading when the input ran out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireField {
    MessageTag,
    AckSeqno,
    Seqno,
    DestinationLength,
    DestinationBody,
    InnerTag,
    ReplyKey,
    RedirectKey,
}

impl fmt::Display for WireField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireField::MessageTag => "message tag",
            WireField::AckSeqno => "ack seqno",
            WireField::Seqno => "seqno",
            WireField::DestinationLength => "destination length",
            WireField::DestinationBody => "destination body",
            WireField::InnerTag => "inner message tag",
            WireField::ReplyKey => "reply key",
            WireField::RedirectKey => "redirect key",
        };
        f.write_str(name)
    }
}

/// Why a datagram could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("short message at {field}")]
    ShortRead { field: WireField },

    #[error("unexpected message tag {0}")]
    UnknownMessageTag(u8),

    #[error("unexpected inner message tag {0}")]
    UnknownInnerTag(u8),
}

// =============================================================================
// Encoding
// =============================================================================

/// Number of bytes `encode` produces for `message`
pub fn encoded_len(message: &OutboundMessage) -> usize {
    let envelope = |requester: &[u8]| TAG_SIZE + U64_SIZE + U64_SIZE + requester.len();
    let bound = |b: Option<u64>| TAG_SIZE + b.map_or(0, |_| U64_SIZE);

    match message {
        OutboundMessage::Get { requester, .. } => {
            envelope(requester.as_bytes()) + TAG_SIZE + U64_SIZE
        }
        OutboundMessage::Set {
            requester, value, ..
        } => {
            let value_len = value.as_ref().map_or(0, |v| U64_SIZE + v.len());
            envelope(requester.as_bytes()) + TAG_SIZE + U64_SIZE + TAG_SIZE + value_len
        }
        OutboundMessage::Shard {
            requester,
            range,
            recipient,
            ..
        } => {
            envelope(requester.as_bytes())
                + TAG_SIZE
                + bound(range.low)
                + bound(range.high)
                + U64_SIZE
                + recipient.len()
        }
        OutboundMessage::Ack { .. } => TAG_SIZE + U64_SIZE,
    }
}

/// Encode an outbound message to its exact wire bytes
pub fn encode(message: &OutboundMessage) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(message));

    match message {
        OutboundMessage::Get {
            seqno,
            requester,
            key,
        } => {
            put_envelope(&mut buf, *seqno, requester.as_bytes());
            buf.put_u8(GET_TAG);
            buf.put_u64_le(*key);
        }
        OutboundMessage::Set {
            seqno,
            requester,
            key,
            value,
        } => {
            put_envelope(&mut buf, *seqno, requester.as_bytes());
            buf.put_u8(SET_TAG);
            buf.put_u64_le(*key);
            match value {
                Some(value) => {
                    buf.put_u8(SOME_TAG);
                    put_bytes(&mut buf, value);
                }
                None => buf.put_u8(NONE_TAG),
            }
        }
        OutboundMessage::Shard {
            seqno,
            requester,
            range,
            recipient,
        } => {
            put_envelope(&mut buf, *seqno, requester.as_bytes());
            buf.put_u8(SHARD_TAG);
            put_range(&mut buf, range);
            put_bytes(&mut buf, recipient.as_bytes());
        }
        OutboundMessage::Ack { acked_seqno } => {
            buf.put_u8(ACK_TAG);
            buf.put_u64_le(*acked_seqno);
        }
    }

    buf.freeze()
}

fn put_envelope(buf: &mut BytesMut, seqno: u64, requester: &[u8]) {
    buf.put_u8(MESSAGE_TAG);
    buf.put_u64_le(seqno);
    put_bytes(buf, requester);
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u64_le(bytes.len() as u64);
    buf.put_slice(bytes);
}

fn put_range(buf: &mut BytesMut, range: &KeyRange) {
    for bound in [range.low, range.high] {
        match bound {
            Some(value) => {
                buf.put_u8(SOME_TAG);
                buf.put_u64_le(value);
            }
            None => buf.put_u8(NONE_TAG),
        }
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode an inbound datagram
///
/// Trailing bytes after the fields the client needs are ignored.
pub fn decode(bytes: &[u8]) -> Result<InboundMessage, ParseError> {
    let mut cursor = Cursor { buf: bytes };

    match cursor.tag(WireField::MessageTag)? {
        ACK_TAG => {
            let acked_seqno = cursor.u64(WireField::AckSeqno)?;
            Ok(InboundMessage::Ack { acked_seqno })
        }
        MESSAGE_TAG => {
            let seqno = cursor.u64(WireField::Seqno)?;
            cursor.skip_bytes()?;

            match cursor.tag(WireField::InnerTag)? {
                REPLY_TAG => {
                    let key = cursor.u64(WireField::ReplyKey)?;
                    Ok(InboundMessage::Reply { seqno, key })
                }
                REDIRECT_TAG => {
                    let key = cursor.u64(WireField::RedirectKey)?;
                    Ok(InboundMessage::Redirect { seqno, key })
                }
                other => Err(ParseError::UnknownInnerTag(other)),
            }
        }
        other => Err(ParseError::UnknownMessageTag(other)),
    }
}

/// Read position over an inbound datagram
struct Cursor<'a> {
    buf: &'a [u8],
}

impl Cursor<'_> {
    fn tag(&mut self, field: WireField) -> Result<u8, ParseError> {
        if self.buf.remaining() < TAG_SIZE {
            return Err(ParseError::ShortRead { field });
        }
        Ok(self.buf.get_u8())
    }

    fn u64(&mut self, field: WireField) -> Result<u64, ParseError> {
        if self.buf.remaining() < U64_SIZE {
            return Err(ParseError::ShortRead { field });
        }
        Ok(self.buf.get_u64_le())
    }

    /// Skip a length-prefixed byte field without inspecting it
    fn skip_bytes(&mut self) -> Result<(), ParseError> {
        let len = self.u64(WireField::DestinationLength)?;
        if len > self.buf.remaining() as u64 {
            return Err(ParseError::ShortRead {
                field: WireField::DestinationBody,
            });
        }
        self.buf.advance(len as usize);
        Ok(())
    }
}
