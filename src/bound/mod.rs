#![forbid(unsafe_code)]

//! Key-range boundaries for ordered index scans.
//!
//! Comparisons are applied column by column in key order. `Ge`/`Gt` write the
//! high key and `Le`/`Lt` the low key; `Eq` writes both. A range made only
//! of equalities keeps a single key buffer for both sides.

use std::sync::Arc;

use tracing::{error, trace};

use crate::codec::Value;
use crate::layout::{ColumnSlot, RowLayout};
use crate::pool::{PooledBuffer, TieredBufferPool};
use crate::types::{ColumnId, Result, RowpackError};

/// Comparison applied to one key column.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoundType {
    /// `column = value`
    Eq,
    /// `column >= value`
    Ge,
    /// `column > value`
    Gt,
    /// `column <= value`
    Le,
    /// `column < value`
    Lt,
}

/// Key storage of one bound.
#[derive(Debug)]
enum BoundKeys {
    Shared(PooledBuffer),
    Split {
        low: PooledBuffer,
        high: PooledBuffer,
    },
}

/// One side of an [`IndexBound`].
#[derive(Copy, Clone, Debug)]
pub struct BoundSide<'a> {
    /// Encoded key, laid out by the index layout.
    pub key: &'a [u8],
    /// Number of leading key columns set on this side.
    pub count: usize,
    /// Whether the boundary value itself is in range.
    pub inclusive: bool,
}

/// A low/high key pair for one scan range.
#[derive(Debug)]
pub struct IndexBound {
    keys: BoundKeys,
    low_count: usize,
    high_count: usize,
    low_inclusive: bool,
    high_inclusive: bool,
    range_no: u32,
}

impl IndexBound {
    /// Low side (written by `Le`, `Lt` and `Eq`).
    pub fn low(&self) -> BoundSide<'_> {
        let key = match &self.keys {
            BoundKeys::Shared(buf) => buf.as_slice(),
            BoundKeys::Split { low, .. } => low.as_slice(),
        };
        BoundSide {
            key,
            count: self.low_count,
            inclusive: self.low_inclusive,
        }
    }

    /// High side (written by `Ge`, `Gt` and `Eq`).
    pub fn high(&self) -> BoundSide<'_> {
        let key = match &self.keys {
            BoundKeys::Shared(buf) => buf.as_slice(),
            BoundKeys::Split { high, .. } => high.as_slice(),
        };
        BoundSide {
            key,
            count: self.high_count,
            inclusive: self.high_inclusive,
        }
    }

    /// Whether both sides share one key buffer.
    pub fn is_shared(&self) -> bool {
        matches!(self.keys, BoundKeys::Shared(_))
    }

    /// Position of this range within its scan, starting at 0.
    pub fn range_no(&self) -> u32 {
        self.range_no
    }

    /// Returns the key buffers to their pool.
    pub fn release(self) -> Result<()> {
        match self.keys {
            BoundKeys::Shared(buf) => buf.release(),
            BoundKeys::Split { low, high } => {
                let low = low.release();
                high.release()?;
                low
            }
        }
    }
}

/// Bounds produced by one [`IndexBoundBuilder`], in range order.
#[derive(Debug, Default)]
pub struct IndexBounds {
    bounds: Vec<IndexBound>,
}

impl IndexBounds {
    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Whether no range constrains the scan.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Range `i`.
    pub fn get(&self, i: usize) -> Option<&IndexBound> {
        self.bounds.get(i)
    }

    /// Ranges in order.
    pub fn iter(&self) -> std::slice::Iter<'_, IndexBound> {
        self.bounds.iter()
    }

    /// Returns every key buffer to the pool, reporting the first failure.
    pub fn release(self) -> Result<()> {
        let mut first_err = None;
        for bound in self.bounds {
            if let Err(err) = bound.release() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl<'a> IntoIterator for &'a IndexBounds {
    type Item = &'a IndexBound;
    type IntoIter = std::slice::Iter<'a, IndexBound>;

    fn into_iter(self) -> Self::IntoIter {
        self.bounds.iter()
    }
}

/// Accumulates per-column comparisons into [`IndexBound`]s.
///
/// Each side takes key columns in order starting at the first; a side may
/// not skip or repeat a column. A failed [`set_bound`](Self::set_bound)
/// leaves the open range as it was.
pub struct IndexBoundBuilder {
    layout: Arc<RowLayout>,
    pool: Arc<TieredBufferPool>,
    scratch: Vec<u8>,
    low: Option<PooledBuffer>,
    high: Option<PooledBuffer>,
    low_count: usize,
    high_count: usize,
    low_strict: bool,
    high_strict: bool,
    equality_only: bool,
    bounds: Vec<IndexBound>,
}

impl IndexBoundBuilder {
    /// Starts a builder over an index layout.
    pub fn new(layout: Arc<RowLayout>, pool: Arc<TieredBufferPool>) -> Self {
        Self {
            layout,
            pool,
            scratch: Vec::new(),
            low: None,
            high: None,
            low_count: 0,
            high_count: 0,
            low_strict: false,
            high_strict: false,
            equality_only: true,
            bounds: Vec::new(),
        }
    }

    fn fresh_key(layout: &RowLayout, pool: &Arc<TieredBufferPool>) -> PooledBuffer {
        let mut buf = PooledBuffer::borrow(pool, layout.buffer_size());
        buf.as_mut_slice().copy_from_slice(layout.template());
        buf
    }

    /// Copies the column's bytes and null flag from the scratch row into one side's key.
    fn commit(&mut self, low_side: bool, slot: &ColumnSlot) {
        let (layout, pool) = (&self.layout, &self.pool);
        let key = if low_side { &mut self.low } else { &mut self.high };
        let key = key.get_or_insert_with(|| Self::fresh_key(layout, pool));
        let key = key.as_mut_slice();
        let span = slot.offset()..slot.offset() + slot.footprint();
        key[span.clone()].copy_from_slice(&self.scratch[span]);
        if let Some(bit) = slot.null_bit() {
            key[bit.byte] = (key[bit.byte] & !bit.mask()) | (self.scratch[bit.byte] & bit.mask());
        }
    }

    fn check_order(column: ColumnId, position: usize, expected: usize) -> Result<()> {
        if position == expected {
            return Ok(());
        }
        error!(column = column.0, position, expected, "bound.out_of_order");
        Err(RowpackError::BoundOutOfOrder {
            id: column,
            position,
            expected,
        })
    }

    /// Applies `column <op> value` to the open range.
    ///
    /// `column` must be the next key column on every side `kind` writes, so a
    /// `Ge`/`Gt` and a `Le`/`Lt` may share the last column of a range.
    pub fn set_bound(&mut self, column: ColumnId, kind: BoundType, value: &Value) -> Result<()> {
        trace!(column = column.0, ?kind, "bound.set");
        let layout = Arc::clone(&self.layout);
        let slot = layout.slot(column)?;
        let (writes_low, writes_high) = match kind {
            BoundType::Eq => (true, true),
            BoundType::Ge | BoundType::Gt => (false, true),
            BoundType::Le | BoundType::Lt => (true, false),
        };
        if writes_low {
            Self::check_order(column, slot.ordinal(), self.low_count)?;
        }
        if writes_high {
            Self::check_order(column, slot.ordinal(), self.high_count)?;
        }

        self.scratch.clear();
        self.scratch.extend_from_slice(layout.template());
        layout.set(&mut self.scratch, column, value)?;

        if writes_low {
            self.commit(true, slot);
            self.low_count += 1;
            self.low_strict |= kind == BoundType::Lt;
        }
        if writes_high {
            self.commit(false, slot);
            self.high_count += 1;
            self.high_strict |= kind == BoundType::Gt;
        }
        self.equality_only &= kind == BoundType::Eq;
        Ok(())
    }

    /// Closes the open range. Nothing is emitted when no column was bounded.
    pub fn end_of_range(&mut self) -> Result<()> {
        let low = self.low.take();
        let high = self.high.take();
        let (low_count, high_count) = (self.low_count, self.high_count);
        let (low_strict, high_strict) = (self.low_strict, self.high_strict);
        let equality_only = self.equality_only;
        self.low_count = 0;
        self.high_count = 0;
        self.low_strict = false;
        self.high_strict = false;
        self.equality_only = true;

        if low_count == 0 && high_count == 0 {
            for buf in [low, high].into_iter().flatten() {
                buf.release()?;
            }
            return Ok(());
        }

        let keys = if equality_only {
            if let Some(dup) = high {
                dup.release()?;
            }
            BoundKeys::Shared(low.unwrap_or_else(|| Self::fresh_key(&self.layout, &self.pool)))
        } else {
            BoundKeys::Split {
                low: low.unwrap_or_else(|| Self::fresh_key(&self.layout, &self.pool)),
                high: high.unwrap_or_else(|| Self::fresh_key(&self.layout, &self.pool)),
            }
        };
        let range_no = self.bounds.len() as u32;
        trace!(range_no, low_count, high_count, equality_only, "bound.end_of_range");
        self.bounds.push(IndexBound {
            keys,
            low_count,
            high_count,
            low_inclusive: !low_strict,
            high_inclusive: !high_strict,
            range_no,
        });
        Ok(())
    }

    /// Closes the open range and returns every bound built so far.
    pub fn finish(mut self) -> Result<IndexBounds> {
        self.end_of_range()?;
        Ok(IndexBounds {
            bounds: std::mem::take(&mut self.bounds),
        })
    }
}
