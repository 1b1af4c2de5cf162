use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error};

use crate::options::PoolOptions;
use crate::types::{Result, RowpackError};

use super::buffer::Buffer;
use super::fixed::FixedBufferPool;
use super::stats::{PoolCounters, PoolStats};

/// Size-classed pool: one [`FixedBufferPool`] per capacity ceiling, with
/// untracked overflow allocation for requests larger than every tier.
pub struct TieredBufferPool {
    tiers: Vec<FixedBufferPool>,
    guard_len: usize,
    check_guards: Arc<AtomicBool>,
    overflow: PoolCounters,
}

impl TieredBufferPool {
    /// Builds a pool from options; tier ceilings are sorted and deduplicated.
    pub fn new(options: &PoolOptions) -> Self {
        let mut ceilings = options.tiers.clone();
        ceilings.sort_unstable();
        ceilings.dedup();
        let check_guards = Arc::new(AtomicBool::new(options.check_guards));
        let tiers = ceilings
            .into_iter()
            .map(|size| {
                FixedBufferPool::with_guard_flag(size, options.guard_len, Arc::clone(&check_guards))
            })
            .collect();
        Self {
            tiers,
            guard_len: options.guard_len,
            check_guards,
            overflow: PoolCounters::default(),
        }
    }

    /// Tier ceilings in ascending order.
    pub fn tier_sizes(&self) -> Vec<usize> {
        self.tiers.iter().map(FixedBufferPool::size).collect()
    }

    /// Smallest tier whose ceiling is strictly greater than `size`.
    fn tier_for(&self, size: usize) -> Option<&FixedBufferPool> {
        self.tiers.iter().find(|tier| tier.size() > size)
    }

    /// Borrows a buffer of at least `size` usable bytes.
    pub fn borrow(&self, size: usize) -> Buffer {
        match self.tier_for(size) {
            Some(tier) => tier.borrow(),
            None => {
                self.overflow.overflow_allocated();
                debug!(size, "pool.overflow_alloc");
                Buffer::allocate(size, self.guard_len)
            }
        }
    }

    /// Returns a buffer previously borrowed with the same `size`.
    ///
    /// Overflow buffers are freed instead of queued.
    pub fn release(&self, size: usize, buffer: Buffer) -> Result<()> {
        if let Some(tier) = self.tier_for(size) {
            return tier.release(buffer);
        }
        if buffer.capacity() != size {
            error!(
                expected = size,
                actual = buffer.capacity(),
                "pool.overflow_size_mismatch"
            );
            return Err(RowpackError::BufferSizeMismatch {
                expected: size,
                actual: buffer.capacity(),
            });
        }
        if self.guard_checking() {
            if let Err(err) = buffer.verify_guard() {
                self.overflow.guard_failed();
                error!(size, error = %err, "pool.guard_corrupted");
                return Err(err);
            }
        }
        self.overflow.overflow_released();
        drop(buffer);
        Ok(())
    }

    /// Enables or disables guard verification for every tier.
    pub fn set_guard_checking(&self, enabled: bool) {
        self.check_guards.store(enabled, Ordering::Relaxed);
    }

    /// Whether releases currently verify guard bytes.
    pub fn guard_checking(&self) -> bool {
        self.check_guards.load(Ordering::Relaxed)
    }

    /// Aggregated counters across all tiers plus overflow activity.
    pub fn stats(&self) -> PoolStats {
        self.tiers
            .iter()
            .map(FixedBufferPool::stats)
            .fold(self.overflow.snapshot(), |acc, s| acc + s)
    }

    /// Counters of the tier serving `size`, if any.
    pub fn tier_stats(&self, size: usize) -> Option<PoolStats> {
        self.tier_for(size).map(FixedBufferPool::stats)
    }
}
