//! Configuration for keyshard clients
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{KeyshardError, Result};

/// Main configuration for a client process
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -------------------------------------------------------------------------
    // Delivery Configuration
    // -------------------------------------------------------------------------
    /// Upper bound of a single receive wait (milliseconds)
    pub receive_timeout_ms: u64,

    /// Steady workload acknowledges only when the request seqno is a
    /// multiple of this
    pub ack_batch_interval: u64,

    // -------------------------------------------------------------------------
    // Workload Configuration
    // -------------------------------------------------------------------------
    /// Size of the key space `0..num_keys`
    pub num_keys: u64,

    /// Bytes of random payload per set request
    pub value_size: usize,

    /// Seed of the per-worker RNG (worker id is mixed in); entropy if unset
    pub rng_seed: Option<u64>,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Local UDP bind address
    pub bind_addr: String,

    /// Log every message sent and received
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 1000,
            ack_batch_interval: 100,
            num_keys: 1000,
            value_size: 1024,
            rng_seed: None,
            bind_addr: "0.0.0.0:0".to_string(),
            verbose: false,
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Seed for worker `worker`, if seeding is configured
    pub fn worker_seed(&self, worker: usize) -> Option<u64> {
        self.rng_seed.map(|seed| seed.wrapping_add(worker as u64))
    }

    /// Reject settings no workload can run with
    pub fn validate(&self) -> Result<()> {
        if self.receive_timeout_ms == 0 {
            return Err(KeyshardError::Config(
                "receive timeout must be at least 1 ms".to_string(),
            ));
        }
        if self.num_keys == 0 {
            return Err(KeyshardError::Config("num_keys must be positive".to_string()));
        }
        if self.ack_batch_interval == 0 {
            return Err(KeyshardError::Config(
                "ack batch interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the receive timeout (in milliseconds)
    pub fn receive_timeout_ms(mut self, ms: u64) -> Self {
        self.config.receive_timeout_ms = ms;
        self
    }

    /// Set the ack batching interval of the steady workload
    pub fn ack_batch_interval(mut self, every: u64) -> Self {
        self.config.ack_batch_interval = every;
        self
    }

    /// Set the key space size
    pub fn num_keys(mut self, count: u64) -> Self {
        self.config.num_keys = count;
        self
    }

    /// Set the payload size of set requests (in bytes)
    pub fn value_size(mut self, size: usize) -> Self {
        self.config.value_size = size;
        self
    }

    /// Seed the per-worker RNGs
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Set the local bind address
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
