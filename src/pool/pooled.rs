use std::sync::Arc;

use tracing::error;

use crate::types::Result;

use super::buffer::Buffer;
use super::tiered::TieredBufferPool;

/// A buffer on loan from a [`TieredBufferPool`].
///
/// The buffer goes back to the pool exactly once: through [`PooledBuffer::release`],
/// which reports size or guard violations, or on drop, which logs them.
pub struct PooledBuffer {
    buffer: Option<Buffer>,
    len: usize,
    pool: Arc<TieredBufferPool>,
}

impl PooledBuffer {
    /// Borrows a buffer of at least `len` bytes and exposes exactly `len` of them.
    pub fn borrow(pool: &Arc<TieredBufferPool>, len: usize) -> Self {
        let buffer = pool.borrow(len);
        Self {
            buffer: Some(buffer),
            len,
            pool: Arc::clone(pool),
        }
    }

    fn inner(&self) -> &Buffer {
        self.buffer.as_ref().expect("pooled buffer already released")
    }

    fn inner_mut(&mut self) -> &mut Buffer {
        self.buffer.as_mut().expect("pooled buffer already released")
    }

    /// Requested length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the requested length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity of the underlying buffer (at least `len`).
    pub fn capacity(&self) -> usize {
        self.inner().capacity()
    }

    /// The first `len` bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.inner().as_slice()[..self.len]
    }

    /// The first `len` bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.inner_mut().as_mut_slice()[..len]
    }

    /// The whole allocation including spare capacity and guard bytes.
    pub fn backing_mut(&mut self) -> &mut [u8] {
        self.inner_mut().backing_mut()
    }

    /// Returns the buffer to its pool, surfacing size or guard violations.
    pub fn release(mut self) -> Result<()> {
        match self.buffer.take() {
            Some(buffer) => self.pool.release(self.len, buffer),
            None => Ok(()),
        }
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            if let Err(err) = self.pool.release(self.len, buffer) {
                error!(len = self.len, error = %err, "pool.release_on_drop_failed");
            }
        }
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len)
            .field("capacity", &self.buffer.as_ref().map(Buffer::capacity))
            .finish()
    }
}
