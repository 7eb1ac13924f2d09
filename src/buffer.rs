//! Buffer Leases
//!
//! Scoped byte regions handed to transports for receiving datagrams.
//! A lease returns its region to the pool when dropped, so every exit path
//! of a receive releases what it acquired.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

/// Default number of idle regions kept for reuse
pub const DEFAULT_MAX_POOLED: usize = 16;

/// Pool of reusable byte regions
///
/// Cloning shares the pool. Each worker normally owns its own.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    max_pooled: usize,
    allocated: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
}

/// Allocation counters of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub allocated: u64,
    pub reused: u64,
    pub released: u64,
}

impl BufferPool {
    pub fn new(max_pooled: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                max_pooled,
                allocated: AtomicU64::new(0),
                reused: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Acquire an owned, zeroed region of exactly `len` bytes
    pub fn lease(&self, len: usize) -> BufferLease {
        let recycled = {
            let mut free = self.inner.free.lock();
            let fit = free.iter().position(|buf| buf.capacity() >= len);
            fit.map(|idx| free.swap_remove(idx))
        };

        let data = match recycled {
            Some(mut buf) => {
                self.inner.reused.fetch_add(1, Ordering::Relaxed);
                buf.clear();
                buf.resize(len, 0);
                buf
            }
            None => {
                self.inner.allocated.fetch_add(1, Ordering::Relaxed);
                trace!("buffer pool: allocating region of {} bytes", len);
                vec![0u8; len]
            }
        };

        BufferLease {
            data,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of idle regions waiting for reuse
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }

    pub fn stats(&self) -> BufferPoolStats {
        BufferPoolStats {
            allocated: self.inner.allocated.load(Ordering::Relaxed),
            reused: self.inner.reused.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POOLED)
    }
}

/// An owned byte region on loan from a [`BufferPool`]
pub struct BufferLease {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl BufferLease {
    /// Shrink the visible region, e.g. to the size of a received datagram
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Copy the visible bytes out; the region itself goes back on drop
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }
}

impl Deref for BufferLease {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for BufferLease {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        self.pool.released.fetch_add(1, Ordering::Relaxed);
        let mut free = self.pool.free.lock();
        if free.len() < self.pool.max_pooled {
            free.push(std::mem::take(&mut self.data));
        }
    }
}
