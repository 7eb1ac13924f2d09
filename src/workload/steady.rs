//! Steady-state workload
//!
//! Closed-loop load: one request in flight per worker, next request as soon
//! as the previous one completes.

use tracing::{info, warn};

use super::RequestKind;
use crate::config::ClientConfig;
use crate::identity::{EndpointHasher, PublicKey};
use crate::metrics::LatencySample;
use crate::session::{AwaitMode, ClientSession, DeliveryPolicy};
use crate::transport::Transport;

/// Parameters of a steady run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteadyWorkload {
    pub kind: RequestKind,
    pub num_keys: u64,
    pub value_size: usize,
    pub ack_batch_interval: u64,

    /// Stop after this many completed requests; `None` runs forever
    pub max_requests: Option<u64>,
}

/// Outcome of a bounded steady run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SteadyReport {
    pub completed: u64,
    pub retransmissions: u64,
}

impl SteadyWorkload {
    pub fn from_config(kind: RequestKind, config: &ClientConfig) -> Self {
        Self {
            kind,
            num_keys: config.num_keys,
            value_size: config.value_size,
            ack_batch_interval: config.ack_batch_interval,
            max_requests: None,
        }
    }

    pub fn with_max_requests(mut self, max: u64) -> Self {
        self.max_requests = Some(max);
        self
    }

    /// Issue requests to `server`, handing each latency sample to `on_sample`
    pub fn run<T, H, F>(
        &self,
        session: &mut ClientSession<T, H>,
        server: &PublicKey,
        mut on_sample: F,
    ) -> SteadyReport
    where
        T: Transport,
        H: EndpointHasher,
        F: FnMut(LatencySample),
    {
        let mut report = SteadyReport::default();
        if self.num_keys == 0 {
            warn!("Steady workload with an empty key space; nothing to do");
            return report;
        }

        let destination = session.resolve(server);
        let policy = DeliveryPolicy::steady(self.ack_batch_interval);

        while self.max_requests.map_or(true, |max| report.completed < max) {
            let seqno = session.next_seqno();
            let key = seqno % self.num_keys;
            let request = match self.kind {
                RequestKind::Get => session.get_message(seqno, key),
                RequestKind::Set => session.set_message(seqno, key, self.value_size),
            };

            let awaited =
                session.send_and_await(&request, &destination, key, AwaitMode::Reply, &policy);
            let Some(completion) = awaited else {
                break;
            };
            report.completed += 1;
            report.retransmissions += u64::from(completion.attempts - 1);

            let sample = LatencySample {
                worker: session.worker(),
                seqno,
                latency: completion.elapsed,
            };
            info!(
                target: "keyshard::latency",
                worker = sample.worker,
                seqno = sample.seqno,
                latency_ms = sample.latency.as_secs_f64() * 1000.0,
                "#req"
            );
            on_sample(sample);
        }

        report
    }
}
