use crate::types::{Result, RowpackError};

const GUARD_SEED: u8 = 0xA5;

#[inline]
fn guard_byte(i: usize) -> u8 {
    GUARD_SEED ^ (i as u8)
}

/// A heap buffer with `capacity` usable bytes followed by `guard_len` sentinel bytes.
pub struct Buffer {
    data: Box<[u8]>,
    capacity: usize,
}

impl Buffer {
    /// Allocates a zeroed buffer and writes its guard pattern.
    pub fn allocate(capacity: usize, guard_len: usize) -> Self {
        let mut buffer = Self {
            data: vec![0u8; capacity + guard_len].into_boxed_slice(),
            capacity,
        };
        buffer.init_guard();
        buffer
    }

    /// Usable bytes, excluding the guard.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Length of the trailing guard region.
    pub fn guard_len(&self) -> usize {
        self.data.len() - self.capacity
    }

    /// The usable region.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.capacity]
    }

    /// The usable region, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.capacity]
    }

    /// The whole allocation including guard bytes, as handed to native code.
    pub fn backing_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn init_guard(&mut self) {
        let cap = self.capacity;
        for (i, b) in self.data[cap..].iter_mut().enumerate() {
            *b = guard_byte(i);
        }
    }

    /// Checks that every guard byte still holds its sentinel value.
    pub fn verify_guard(&self) -> Result<()> {
        let cap = self.capacity;
        match self.data[cap..]
            .iter()
            .enumerate()
            .find(|(i, b)| **b != guard_byte(*i))
        {
            None => Ok(()),
            Some((i, _)) => Err(RowpackError::GuardCorrupted {
                capacity: cap,
                offset: cap + i,
            }),
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity)
            .field("guard_len", &self.guard_len())
            .finish()
    }
}
