//! Shard-and-redirect scenario
//!
//! Scripted walk through a key-range delegation:
//! 1. GET key at primary, expect REPLY
//! 2. SHARD range containing key to delegate, expect ACK
//! 3. pause, GET key at primary again, expect REDIRECT
//! 4. pause, GET key at delegate with seqno 1, expect REPLY
//!
//! Waits in this script never retransmit on timeout.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::identity::{EndpointHasher, PublicKey};
use crate::protocol::KeyRange;
use crate::session::{AwaitMode, ClientSession, Completion, DeliveryPolicy};
use crate::transport::Transport;

/// The delegate has never heard from this client, so its first seqno is 1
const FIRST_SEQNO: u64 = 1;

/// Parameters of the scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardScenario {
    /// Range handed from primary to delegate
    pub range: KeyRange,

    /// Key probed before and after the delegation; must lie in `range`
    pub key: u64,

    /// Pause letting the delegation propagate between servers
    pub settle: Duration,
}

impl Default for ShardScenario {
    fn default() -> Self {
        // Servers move at most 61 keys per delegation; keep the range below that.
        Self {
            range: KeyRange::bounded(125, 175),
            key: 150,
            settle: Duration::from_secs(5),
        }
    }
}

/// Completions of the four scripted steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub initial_reply: Completion,
    pub delegation_ack: Completion,
    pub redirect: Completion,
    pub delegate_reply: Completion,
}

impl ShardScenario {
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Walk the four steps; `None` if a scripted message could not be awaited
    pub fn run<T: Transport, H: EndpointHasher>(
        &self,
        session: &mut ClientSession<T, H>,
        primary: &PublicKey,
        delegate: &PublicKey,
    ) -> Option<ScenarioReport> {
        if !self.range.contains(self.key) {
            warn!("Probe key {} lies outside the delegated range {:?}", self.key, self.range);
        }

        let primary_endpoint = session.resolve(primary);
        let delegate_endpoint = session.resolve(delegate);
        let policy = DeliveryPolicy::scripted();

        let request = session.get_request(self.key);
        let initial_reply = session.send_and_await(
            &request,
            &primary_endpoint,
            self.key,
            AwaitMode::Reply,
            &policy,
        )?;

        let shard = session.shard_request(self.range, delegate);
        info!(
            "Sending a shard request with seqno {}",
            shard.seqno().unwrap_or_default()
        );
        let delegation_ack = session.send_and_await(
            &shard,
            &primary_endpoint,
            self.key,
            AwaitMode::AckOnly,
            &policy,
        )?;

        thread::sleep(self.settle);

        info!("Sending a get request after the shard, expecting a redirect");
        let request = session.get_request(self.key);
        let redirect = session.send_and_await(
            &request,
            &primary_endpoint,
            self.key,
            AwaitMode::Redirect,
            &policy,
        )?;

        thread::sleep(self.settle);

        info!("Sending a get request to the delegate, expecting a reply");
        let request = session.get_message(FIRST_SEQNO, self.key);
        let delegate_reply = session.send_and_await(
            &request,
            &delegate_endpoint,
            self.key,
            AwaitMode::Reply,
            &policy,
        )?;

        info!("Successfully received reply from the delegate");

        Some(ScenarioReport {
            initial_reply,
            delegation_ack,
            redirect,
            delegate_reply,
        })
    }
}
