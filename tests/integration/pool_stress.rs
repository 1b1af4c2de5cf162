#![allow(missing_docs)]

use std::sync::{Arc, Once};
use std::thread;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rowpack::pool::{FixedBufferPool, PooledBuffer, TieredBufferPool};
use rowpack::{PoolOptions, RowpackError};
use tracing_subscriber::EnvFilter;

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;
const SEED: u64 = 0x0b0f_f3a5;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rowpack=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

#[test]
fn release_then_borrow_reuses_the_buffer() {
    init_tracing();
    let pool = FixedBufferPool::new(128, 0);
    let buffer = pool.borrow();
    pool.release(buffer).unwrap();
    let before = pool.stats();
    let again = pool.borrow();
    let after = pool.stats();
    assert_eq!(after.allocations, before.allocations);
    assert_eq!(after.hits, before.hits + 1);
    pool.release(again).unwrap();
}

#[test]
fn wrong_size_release_is_fatal() {
    let small = FixedBufferPool::new(64, 0);
    let large = FixedBufferPool::new(256, 0);
    let err = small.release(large.borrow()).unwrap_err();
    assert!(matches!(err, RowpackError::BufferSizeMismatch { expected: 64, actual: 256 }));
    assert!(err.is_fatal());
}

#[test]
fn guard_overwrite_is_detected_only_while_checking() {
    init_tracing();
    let pool = Arc::new(TieredBufferPool::new(
        &PoolOptions::default().tiers(vec![64]).guard_len(8).check_guards(true),
    ));
    let mut buf = PooledBuffer::borrow(&pool, 40);
    let capacity = buf.capacity();
    buf.backing_mut()[capacity + 3] ^= 0xFF;
    let err = buf.release().unwrap_err();
    assert!(matches!(err, RowpackError::GuardCorrupted { capacity: 64, offset: 67 }));
    assert_eq!(pool.stats().guard_failures, 1);

    pool.set_guard_checking(false);
    let mut buf = PooledBuffer::borrow(&pool, 40);
    let capacity = buf.capacity();
    buf.backing_mut()[capacity] ^= 0xFF;
    buf.release().unwrap();
    assert_eq!(pool.stats().guard_failures, 1);
}

#[test]
fn turning_checks_on_only_reports_new_overruns() {
    init_tracing();
    let pool = Arc::new(TieredBufferPool::new(
        &PoolOptions::default().tiers(vec![32]).guard_len(8),
    ));
    let mut buf = PooledBuffer::borrow(&pool, 16);
    let capacity = buf.capacity();
    buf.backing_mut()[capacity] ^= 0xFF;
    buf.release().unwrap();

    pool.set_guard_checking(true);
    let reused = PooledBuffer::borrow(&pool, 16);
    reused.release().unwrap();
    let stats = pool.stats();
    assert_eq!(stats.guard_failures, 0);
    assert_eq!((stats.hits, stats.allocations), (1, 1));
}

#[test]
fn oversized_requests_bypass_the_tiers() {
    init_tracing();
    let pool = Arc::new(TieredBufferPool::new(&PoolOptions::default().tiers(vec![64, 256])));
    let buf = PooledBuffer::borrow(&pool, 256);
    assert_eq!(buf.capacity(), 256);
    buf.release().unwrap();
    let stats = pool.stats();
    assert_eq!((stats.overflow_allocations, stats.overflow_releases), (1, 1));
    assert_eq!(stats.borrows, 0);

    // 64 is not strictly greater than 64, so the request lands in the 256 tier.
    let buf = PooledBuffer::borrow(&pool, 64);
    assert_eq!(buf.capacity(), 256);
}

#[test]
fn concurrent_borrowers_return_every_buffer() {
    init_tracing();
    let pool = Arc::new(TieredBufferPool::new(
        &PoolOptions::default().guard_len(16).check_guards(true),
    ));
    let largest = *pool.tier_sizes().last().unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(SEED + t as u64);
                let mut held: Vec<PooledBuffer> = Vec::new();
                for _ in 0..ROUNDS {
                    if held.is_empty() || rng.gen_bool(0.5) {
                        let len = if rng.gen_bool(0.02) {
                            largest + rng.gen_range(1..4096)
                        } else {
                            rng.gen_range(0..8192)
                        };
                        let mut buf = PooledBuffer::borrow(&pool, len);
                        buf.as_mut_slice().fill(t as u8);
                        held.push(buf);
                    } else {
                        let idx = rng.gen_range(0..held.len());
                        let buf = held.swap_remove(idx);
                        assert!(buf.as_slice().iter().all(|b| *b == t as u8));
                        buf.release().unwrap();
                    }
                }
                for buf in held {
                    buf.release().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = pool.stats();
    assert_eq!(stats.borrows, stats.releases);
    assert_eq!(stats.overflow_allocations, stats.overflow_releases);
    assert_eq!(stats.borrows, stats.hits + stats.allocations);
    assert_eq!(stats.guard_failures, 0);
    assert!(stats.hits > stats.allocations);
}
