use std::ops::Add;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of buffer pool activity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    /// Number of `borrow` calls served by pooled tiers.
    pub borrows: u64,
    /// Borrows satisfied by a queued buffer.
    pub hits: u64,
    /// Borrows that had to allocate a new buffer.
    pub allocations: u64,
    /// Buffers accepted back into a tier.
    pub releases: u64,
    /// One-off allocations larger than every tier.
    pub overflow_allocations: u64,
    /// Overflow buffers freed on release.
    pub overflow_releases: u64,
    /// Releases rejected because the guard region was overwritten.
    pub guard_failures: u64,
}

impl Add for PoolStats {
    type Output = PoolStats;

    fn add(self, rhs: PoolStats) -> PoolStats {
        PoolStats {
            borrows: self.borrows + rhs.borrows,
            hits: self.hits + rhs.hits,
            allocations: self.allocations + rhs.allocations,
            releases: self.releases + rhs.releases,
            overflow_allocations: self.overflow_allocations + rhs.overflow_allocations,
            overflow_releases: self.overflow_releases + rhs.overflow_releases,
            guard_failures: self.guard_failures + rhs.guard_failures,
        }
    }
}

#[derive(Default)]
pub(crate) struct PoolCounters {
    borrows: AtomicU64,
    hits: AtomicU64,
    allocations: AtomicU64,
    releases: AtomicU64,
    overflow_allocations: AtomicU64,
    overflow_releases: AtomicU64,
    guard_failures: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn borrowed(&self, hit: bool) {
        self.borrows.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.allocations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn released(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn overflow_allocated(&self) {
        self.overflow_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn overflow_released(&self) {
        self.overflow_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn guard_failed(&self) {
        self.guard_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            borrows: self.borrows.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            overflow_allocations: self.overflow_allocations.load(Ordering::Relaxed),
            overflow_releases: self.overflow_releases.load(Ordering::Relaxed),
            guard_failures: self.guard_failures.load(Ordering::Relaxed),
        }
    }
}
