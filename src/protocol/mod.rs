//! Protocol Module
//!
//! Defines the tagged binary wire protocol spoken with shard servers.
//!
//! ## Primitives
//! - `Tag`: 1 byte selecting a variant
//! - `UInt64`: 8 bytes, little-endian
//! - `Bytes`: `UInt64` length followed by that many raw bytes
//!
//! ## Top-level Frames
//! ```text
//! addressed message:
//! ┌────────┬────────────┬──────────────────────┬─────────────────┐
//! │ Tag(0) │ seqno (8)  │ len (8) + key bytes  │  inner message  │
//! └────────┴────────────┴──────────────────────┴─────────────────┘
//!
//! acknowledgment:
//! ┌────────┬─────────────────┐
//! │ Tag(1) │ acked seqno (8) │
//! └────────┴─────────────────┘
//! ```
//!
//! ### Inner Message Tags
//! - 0x00: GET      - key
//! - 0x01: SET      - key + optional value
//! - 0x02: REPLY    - key (+ value, ignored by the client)
//! - 0x03: REDIRECT - key (+ new owner, ignored by the client)
//! - 0x04: SHARD    - key range + recipient
//!
//! The client only encodes what it sends ([`OutboundMessage`]) and only
//! decodes what it receives ([`InboundMessage`]).

mod message;
mod codec;

pub use message::{
    InboundMessage, KeyRange, OutboundMessage, ACK_TAG, GET_TAG, MESSAGE_TAG, NONE_TAG,
    REDIRECT_TAG, REPLY_TAG, SET_TAG, SHARD_TAG, SOME_TAG,
};
pub use codec::{decode, encode, encoded_len, ParseError, WireField};
