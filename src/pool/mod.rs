#![forbid(unsafe_code)]

//! Reusable scratch memory for row buffers, key bounds and charset conversion.

mod buffer;
mod fixed;
mod pooled;
mod stats;
mod tiered;

pub use buffer::Buffer;
pub use fixed::FixedBufferPool;
pub use pooled::PooledBuffer;
pub use stats::PoolStats;
pub use tiered::TieredBufferPool;
