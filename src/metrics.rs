//! Instrumentation
//!
//! Counters and named duration histograms shared by all workers of a
//! process. Workers receive a clone of the handle at construction; nothing
//! here is global.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Histogram name for end-to-end request latency
pub const REQUEST_LATENCY: &str = "request";

/// Histogram name for time spent encoding messages
pub const ENCODE_TIME: &str = "encode";

/// Upper bounds (microseconds) of the histogram buckets; the last is open
const BUCKET_BOUNDS_US: [u64; 7] = [100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000, u64::MAX];

/// Bucketed latency distribution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LatencyHistogram {
    pub buckets: [u64; 7],
    pub count: u64,
    pub total_us: u64,
    pub max_us: u64,
}

impl LatencyHistogram {
    pub fn record(&mut self, duration: Duration) {
        let us = duration.as_micros().min(u64::MAX as u128) as u64;
        self.count += 1;
        self.total_us = self.total_us.saturating_add(us);
        self.max_us = self.max_us.max(us);

        let bucket = BUCKET_BOUNDS_US
            .iter()
            .position(|&bound| us <= bound)
            .unwrap_or(BUCKET_BOUNDS_US.len() - 1);
        self.buckets[bucket] += 1;
    }

    pub fn mean_us(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        self.total_us / self.count
    }

    /// Upper bound of the bucket holding the 99th percentile
    pub fn p99_us(&self) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let target = (self.count * 99).div_ceil(100);
        let mut cumulative = 0u64;
        for (i, &count) in self.buckets.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return BUCKET_BOUNDS_US[i].min(self.max_us);
            }
        }
        self.max_us
    }
}

/// One completed request of the steady workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySample {
    pub worker: usize,
    pub seqno: u64,
    pub latency: Duration,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    transmissions: AtomicU64,
    retransmissions: AtomicU64,
    timeouts: AtomicU64,
    receive_failures: AtomicU64,
    parse_failures: AtomicU64,
    send_failures: AtomicU64,
    acks_sent: AtomicU64,
    replies: AtomicU64,
    redirects: AtomicU64,
    acks_received: AtomicU64,
    duplicates: AtomicU64,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub requests: u64,
    pub transmissions: u64,
    pub retransmissions: u64,
    pub timeouts: u64,
    pub receive_failures: u64,
    pub parse_failures: u64,
    pub send_failures: u64,
    pub acks_sent: u64,
    pub replies: u64,
    pub redirects: u64,
    pub acks_received: u64,
    pub duplicates: u64,
}

/// Which counter to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Requests,
    Transmissions,
    Retransmissions,
    Timeouts,
    ReceiveFailures,
    ParseFailures,
    SendFailures,
    AcksSent,
    Replies,
    Redirects,
    AcksReceived,
    Duplicates,
}

/// Cloneable observability handle
#[derive(Clone, Default)]
pub struct Instrumentation {
    counters: Arc<Counters>,
    timings: Arc<Mutex<BTreeMap<String, LatencyHistogram>>>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, counter: Counter) {
        self.counter(counter).fetch_add(1, Ordering::Relaxed);
    }

    /// Record a named duration
    pub fn record(&self, name: &str, duration: Duration) {
        let mut timings = self.timings.lock();
        match timings.get_mut(name) {
            Some(histogram) => histogram.record(duration),
            None => {
                let mut histogram = LatencyHistogram::default();
                histogram.record(duration);
                timings.insert(name.to_string(), histogram);
            }
        }
    }

    pub fn histogram(&self, name: &str) -> Option<LatencyHistogram> {
        self.timings.lock().get(name).cloned()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let c = &self.counters;
        CounterSnapshot {
            requests: c.requests.load(Ordering::Relaxed),
            transmissions: c.transmissions.load(Ordering::Relaxed),
            retransmissions: c.retransmissions.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            receive_failures: c.receive_failures.load(Ordering::Relaxed),
            parse_failures: c.parse_failures.load(Ordering::Relaxed),
            send_failures: c.send_failures.load(Ordering::Relaxed),
            acks_sent: c.acks_sent.load(Ordering::Relaxed),
            replies: c.replies.load(Ordering::Relaxed),
            redirects: c.redirects.load(Ordering::Relaxed),
            acks_received: c.acks_received.load(Ordering::Relaxed),
            duplicates: c.duplicates.load(Ordering::Relaxed),
        }
    }

    /// Human-readable summary of counters and timings
    pub fn report(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();
        let _ = writeln!(out, "requests:         {}", s.requests);
        let _ = writeln!(out, "transmissions:    {}", s.transmissions);
        let _ = writeln!(out, "retransmissions:  {}", s.retransmissions);
        let _ = writeln!(out, "timeouts:         {}", s.timeouts);
        let _ = writeln!(out, "receive failures: {}", s.receive_failures);
        let _ = writeln!(out, "parse failures:   {}", s.parse_failures);
        let _ = writeln!(out, "send failures:    {}", s.send_failures);
        let _ = writeln!(out, "acks sent:        {}", s.acks_sent);
        let _ = writeln!(out, "acks received:    {}", s.acks_received);
        let _ = writeln!(out, "duplicates:       {}", s.duplicates);
        let _ = writeln!(out, "replies:          {}", s.replies);
        let _ = writeln!(out, "redirects:        {}", s.redirects);

        for (name, h) in self.timings.lock().iter() {
            let _ = writeln!(
                out,
                "timing {}: count={} mean={}us p99<={}us max={}us",
                name,
                h.count,
                h.mean_us(),
                h.p99_us(),
                h.max_us
            );
        }
        out
    }

    fn counter(&self, counter: Counter) -> &AtomicU64 {
        let c = &self.counters;
        match counter {
            Counter::Requests => &c.requests,
            Counter::Transmissions => &c.transmissions,
            Counter::Retransmissions => &c.retransmissions,
            Counter::Timeouts => &c.timeouts,
            Counter::ReceiveFailures => &c.receive_failures,
            Counter::ParseFailures => &c.parse_failures,
            Counter::SendFailures => &c.send_failures,
            Counter::AcksSent => &c.acks_sent,
            Counter::Replies => &c.replies,
            Counter::Redirects => &c.redirects,
            Counter::AcksReceived => &c.acks_received,
            Counter::Duplicates => &c.duplicates,
        }
    }
}
