//! Pool of reusable same-size buffers for reducing allocation churn on row operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::types::{Result, RowpackError};

use super::buffer::Buffer;
use super::stats::{PoolCounters, PoolStats};

/// Free list of buffers that all share one capacity.
pub struct FixedBufferPool {
    size: usize,
    guard_len: usize,
    check_guards: Arc<AtomicBool>,
    free: Mutex<Vec<Buffer>>,
    counters: PoolCounters,
}

impl FixedBufferPool {
    /// Creates a pool handing out buffers of `size` usable bytes plus `guard_len` guard bytes.
    pub fn new(size: usize, guard_len: usize) -> Self {
        Self::with_guard_flag(size, guard_len, Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn with_guard_flag(size: usize, guard_len: usize, flag: Arc<AtomicBool>) -> Self {
        Self {
            size,
            guard_len,
            check_guards: flag,
            free: Mutex::new(Vec::new()),
            counters: PoolCounters::default(),
        }
    }

    /// Capacity of every buffer in this pool.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of buffers waiting on the free list.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Enables or disables guard verification on release.
    pub fn set_guard_checking(&self, enabled: bool) {
        self.check_guards.store(enabled, Ordering::Relaxed);
    }

    /// Whether releases currently verify guard bytes.
    pub fn guard_checking(&self) -> bool {
        self.check_guards.load(Ordering::Relaxed)
    }

    /// Takes a free buffer or allocates a new one.
    pub fn borrow(&self) -> Buffer {
        let reused = self.free.lock().pop();
        match reused {
            Some(mut buffer) => {
                // Guard may be stale from a release made with checking off.
                buffer.init_guard();
                self.counters.borrowed(true);
                buffer
            }
            None => {
                self.counters.borrowed(false);
                Buffer::allocate(self.size, self.guard_len)
            }
        }
    }

    /// Returns a buffer to the free list after validating its size and, optionally, its guard.
    pub fn release(&self, buffer: Buffer) -> Result<()> {
        if buffer.capacity() != self.size {
            error!(
                expected = self.size,
                actual = buffer.capacity(),
                "pool.size_mismatch"
            );
            return Err(RowpackError::BufferSizeMismatch {
                expected: self.size,
                actual: buffer.capacity(),
            });
        }
        if self.guard_checking() {
            if let Err(err) = buffer.verify_guard() {
                self.counters.guard_failed();
                error!(size = self.size, error = %err, "pool.guard_corrupted");
                return Err(err);
            }
        }
        self.counters.released();
        self.free.lock().push(buffer);
        Ok(())
    }

    /// Snapshot of this pool's counters.
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }
}
