#![forbid(unsafe_code)]

//! Fixed row layouts: null bitmap, alignment-bucketed column offsets and a
//! template row used to initialise fresh buffers.

mod cache;
mod row;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::codec::{self, CharsetRegistry, Value};
use crate::pool::PooledBuffer;
use crate::primitives::bytes::align;
use crate::schema::{Alignment, ColumnDescriptor};
use crate::types::{ColumnId, Result, RowpackError};

pub use cache::{LayoutCache, LayoutCacheStats, LayoutKey, LayoutScope};
pub use row::RowBuffer;

/// Position of a column's null flag in the bitmap.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NullBit {
    /// Byte within the bitmap (`position / 8`).
    pub byte: usize,
    /// Bit within that byte (`position % 8`).
    pub bit: u8,
}

impl NullBit {
    fn from_position(position: usize) -> Self {
        Self {
            byte: position / 8,
            bit: (position % 8) as u8,
        }
    }

    /// Bit number across the whole bitmap.
    pub fn position(&self) -> usize {
        self.byte * 8 + self.bit as usize
    }

    pub(crate) fn mask(&self) -> u8 {
        1 << self.bit
    }
}

/// Placement of one column.
#[derive(Clone, Debug)]
pub struct ColumnSlot {
    column: ColumnDescriptor,
    ordinal: usize,
    offset: usize,
    null_bit: Option<NullBit>,
}

impl ColumnSlot {
    /// Column metadata.
    pub fn column(&self) -> &ColumnDescriptor {
        &self.column
    }

    /// Position in declaration order.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Byte offset of the value within the row.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Null flag position, for nullable columns.
    pub fn null_bit(&self) -> Option<NullBit> {
        self.null_bit
    }

    /// Bytes occupied by the value.
    pub fn footprint(&self) -> usize {
        self.column.footprint()
    }
}

/// Immutable byte layout of a column set.
#[derive(Debug)]
pub struct RowLayout {
    slots: Vec<ColumnSlot>,
    by_id: FxHashMap<ColumnId, usize>,
    null_bytes: usize,
    buffer_size: usize,
    charsets: Arc<CharsetRegistry>,
    template: PooledBuffer,
}

/// Computes the layout of `columns` and prepares its template row.
///
/// Columns are placed after the null bitmap, rounded up to 8 bytes, in
/// alignment buckets 8, 4, 2, 1; declaration order is kept within a bucket.
/// Null bits follow declaration order.
pub fn build_layout(columns: &[ColumnDescriptor], charsets: &Arc<CharsetRegistry>) -> Result<RowLayout> {
    let mut by_id = FxHashMap::default();
    for (ordinal, column) in columns.iter().enumerate() {
        if by_id.insert(column.id(), ordinal).is_some() {
            return Err(RowpackError::InvalidColumn {
                column: column.name().to_string(),
                reason: format!("column id {} appears twice in the layout", column.id()),
            });
        }
        if column.column_type().is_character() {
            // Unknown collations fail here rather than on first write.
            charsets.for_column(column)?;
        }
    }

    let mut null_bits = vec![None; columns.len()];
    let mut nullable = 0;
    for (ordinal, column) in columns.iter().enumerate() {
        if column.nullable() {
            null_bits[ordinal] = Some(NullBit::from_position(nullable));
            nullable += 1;
        }
    }
    let null_bytes = nullable.div_ceil(8);

    let mut offsets = vec![0; columns.len()];
    let mut offset = align::up8(null_bytes);
    for bucket in Alignment::ORDER {
        for (ordinal, column) in columns.iter().enumerate() {
            if column.column_type().alignment() == bucket {
                offsets[ordinal] = offset;
                offset += column.footprint();
            }
        }
    }
    let buffer_size = offset;

    let slots: Vec<ColumnSlot> = columns
        .iter()
        .enumerate()
        .map(|(ordinal, column)| ColumnSlot {
            column: column.clone(),
            ordinal,
            offset: offsets[ordinal],
            null_bit: null_bits[ordinal],
        })
        .collect();

    let mut template = PooledBuffer::borrow(charsets.pool(), buffer_size);
    let image = template.as_mut_slice();
    image.fill(0);
    for slot in &slots {
        match (slot.null_bit, codec::zero_value(&slot.column)) {
            (Some(bit), _) => image[bit.byte] |= bit.mask(),
            (None, Some(zero)) => codec::pack(image, slot.offset, &slot.column, &zero, charsets)?,
            (None, None) => {}
        }
    }

    debug!(
        columns = slots.len(),
        nullable,
        null_bytes,
        buffer_size,
        "layout.build"
    );
    Ok(RowLayout {
        slots,
        by_id,
        null_bytes,
        buffer_size,
        charsets: Arc::clone(charsets),
        template,
    })
}

impl RowLayout {
    /// Total row size in bytes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.slots.len()
    }

    /// Length of the null bitmap.
    pub fn null_bytes(&self) -> usize {
        self.null_bytes
    }

    /// Slots in declaration order.
    pub fn slots(&self) -> &[ColumnSlot] {
        &self.slots
    }

    /// Row image with every nullable column null and every other column zero.
    pub fn template(&self) -> &[u8] {
        self.template.as_slice()
    }

    /// Charset registry the layout encodes text with.
    pub fn charsets(&self) -> &Arc<CharsetRegistry> {
        &self.charsets
    }

    /// Placement of column `id`.
    pub fn slot(&self, id: ColumnId) -> Result<&ColumnSlot> {
        match self.by_id.get(&id) {
            Some(&ordinal) => Ok(&self.slots[ordinal]),
            None => {
                tracing::error!(column = id.0, "layout.column_not_in_layout");
                Err(RowpackError::ColumnNotInLayout { id })
            }
        }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len < self.buffer_size {
            return Err(RowpackError::BufferSizeMismatch {
                expected: self.buffer_size,
                actual: len,
            });
        }
        Ok(())
    }

    /// Copies the template row into `buf`.
    pub fn init(&self, buf: &mut [u8]) -> Result<()> {
        self.check_len(buf.len())?;
        buf[..self.buffer_size].copy_from_slice(self.template());
        Ok(())
    }

    /// Writes `value` for column `id`; null sets the column's null bit.
    pub fn set(&self, buf: &mut [u8], id: ColumnId, value: &Value) -> Result<()> {
        self.check_len(buf.len())?;
        let slot = self.slot(id)?;
        if value.is_null() {
            return self.set_null_slot(buf, slot);
        }
        codec::pack(buf, slot.offset, &slot.column, value, &self.charsets)?;
        if let Some(bit) = slot.null_bit {
            buf[bit.byte] &= !bit.mask();
        }
        Ok(())
    }

    /// Reads column `id`, returning [`Value::Null`] when its null bit is set.
    pub fn get(&self, buf: &[u8], id: ColumnId) -> Result<Value> {
        self.check_len(buf.len())?;
        let slot = self.slot(id)?;
        if Self::slot_is_null(buf, slot) {
            return Ok(Value::Null);
        }
        codec::unpack(buf, slot.offset, &slot.column, &self.charsets)
    }

    /// Marks column `id` null.
    pub fn set_null(&self, buf: &mut [u8], id: ColumnId) -> Result<()> {
        self.check_len(buf.len())?;
        let slot = self.slot(id)?;
        self.set_null_slot(buf, slot)
    }

    /// Whether column `id` is null; always false for non-nullable columns.
    pub fn is_null(&self, buf: &[u8], id: ColumnId) -> Result<bool> {
        self.check_len(buf.len())?;
        Ok(Self::slot_is_null(buf, self.slot(id)?))
    }

    fn set_null_slot(&self, buf: &mut [u8], slot: &ColumnSlot) -> Result<()> {
        match slot.null_bit {
            Some(bit) => {
                buf[bit.byte] |= bit.mask();
                Ok(())
            }
            None => Err(RowpackError::NullNotAllowed {
                column: slot.column.name().to_string(),
            }),
        }
    }

    fn slot_is_null(buf: &[u8], slot: &ColumnSlot) -> bool {
        slot.null_bit
            .map(|bit| buf[bit.byte] & bit.mask() != 0)
            .unwrap_or(false)
    }
}
