//! Bulk population
//!
//! Writes every key of the key space once before an experiment starts.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::identity::{EndpointHasher, PublicKey};
use crate::session::{AwaitMode, ClientSession, DeliveryPolicy};
use crate::transport::Transport;

/// Outcome of a population run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulateReport {
    /// Keys written
    pub keys: u64,

    /// Retransmissions across all keys
    pub retransmissions: u64,

    pub elapsed: Duration,
}

/// Set every key in `0..num_keys` on `server`, one at a time
///
/// Each key is retried until its reply arrives before moving on.
pub fn populate<T: Transport, H: EndpointHasher>(
    session: &mut ClientSession<T, H>,
    server: &PublicKey,
    num_keys: u64,
    value_size: usize,
) -> PopulateReport {
    let destination = session.resolve(server);
    let policy = DeliveryPolicy::populate();
    let started = Instant::now();
    let mut retransmissions = 0u64;

    for key in 0..num_keys {
        let request = session.set_request(key, value_size);
        let seqno = session.last_seqno();

        if seqno % 100 == 0 {
            info!(
                "Worker {}: sending set request seqno {}, key {} to {}",
                session.worker(),
                seqno,
                key,
                destination
            );
        } else {
            debug!("Sending set request seqno {}, key {} to {}", seqno, key, destination);
        }

        let awaited =
            session.send_and_await(&request, &destination, key, AwaitMode::Reply, &policy);
        if let Some(completion) = awaited {
            retransmissions += u64::from(completion.attempts - 1);
        }
    }

    let report = PopulateReport {
        keys: num_keys,
        retransmissions,
        elapsed: started.elapsed(),
    };
    info!(
        "Worker {}: populated {} keys in {:?} ({} retransmissions)",
        session.worker(),
        report.keys,
        report.elapsed,
        report.retransmissions
    );
    report
}
