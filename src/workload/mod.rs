//! Workload Module
//!
//! Sequences of protocol interactions built on [`ClientSession`].
//!
//! ## Drivers
//! - [`populate`]: one set per key of `0..num_keys`, sequentially
//! - [`SteadyWorkload`]: endless gets or sets keyed by `seqno % num_keys`,
//!   one latency sample per completed request
//! - [`ShardScenario`]: delegate a key range to a second server and follow
//!   the resulting redirect
//!
//! [`ClientSession`]: crate::session::ClientSession

mod populate;
mod scenario;
mod steady;

pub use populate::{populate, PopulateReport};
pub use scenario::{ScenarioReport, ShardScenario};
pub use steady::{SteadyReport, SteadyWorkload};

/// Request kind issued by the steady workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    Set,
}
