//! # keyshard
//!
//! Client networking stack for a sharded, key-addressed store:
//! - Tagged little-endian binary codec, bit-exact with the servers
//! - Reliable request/response over a lossy datagram transport
//! - Key-range delegation and redirect following
//! - Workload drivers for population, steady load and a shard scenario
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Workload Drivers                         │
//! │            (populate / steady / shard scenario)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ send_and_await
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     ClientSession                            │
//! │        (seqnos, retransmit, ack, match, redirect)            │
//! └──────┬──────────────────────┬──────────────────────┬────────┘
//!        │                      │                      │
//!        ▼                      ▼                      ▼
//!  ┌───────────┐        ┌──────────────┐       ┌─────────────┐
//!  │  Codec    │        │  Identity    │       │  Transport  │
//!  │ (encode/  │        │ (key → end-  │       │ (UDP / in-  │
//!  │  decode)  │        │  point hash) │       │  memory)    │
//!  └───────────┘        └──────────────┘       └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod service;

pub mod protocol;
pub mod identity;
pub mod buffer;
pub mod transport;
pub mod metrics;
pub mod session;
pub mod workload;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KeyshardError, Result};
pub use config::ClientConfig;
pub use identity::{ClientIdentity, Endpoint, EndpointHasher, PublicKey, Sha256Hasher};
pub use protocol::{InboundMessage, OutboundMessage};
pub use session::{AwaitMode, ClientSession, Completion, DeliveryPolicy};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of keyshard
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
