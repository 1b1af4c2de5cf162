use std::sync::Arc;

use smallvec::SmallVec;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

use crate::codec::Value;
use crate::pool::{PooledBuffer, TieredBufferPool};
use crate::types::{ColumnId, Result, RowpackError};

use super::RowLayout;

/// A pooled row image bound to its layout, plus a presence mask recording
/// which columns were written or requested.
///
/// Typed getters return `Ok(None)` for null columns.
#[derive(Debug)]
pub struct RowBuffer {
    layout: Arc<RowLayout>,
    buf: PooledBuffer,
    mask: SmallVec<[u8; 8]>,
}

macro_rules! typed_accessors {
    ($($set:ident / $get:ident : $ty:ty => $name:literal, $variant:ident);* $(;)?) => {
        $(
            #[doc = concat!("Writes a ", $name, " value.")]
            pub fn $set(&mut self, id: ColumnId, value: $ty) -> Result<()> {
                self.set(id, &Value::$variant(value))
            }

            #[doc = concat!("Reads a ", $name, " value.")]
            pub fn $get(&self, id: ColumnId) -> Result<Option<$ty>> {
                match self.get(id)? {
                    Value::Null => Ok(None),
                    Value::$variant(v) => Ok(Some(v)),
                    other => Err(self.wrong_accessor(id, $name, &other)),
                }
            }
        )*
    };
}

impl RowBuffer {
    /// Borrows a buffer for `layout` and initialises it from the template row.
    pub fn new(layout: Arc<RowLayout>, pool: &Arc<TieredBufferPool>) -> Self {
        let mut buf = PooledBuffer::borrow(pool, layout.buffer_size());
        buf.as_mut_slice().copy_from_slice(layout.template());
        let mask = SmallVec::from_elem(0, layout.column_count().div_ceil(8));
        Self { layout, buf, mask }
    }

    /// Layout of this row.
    pub fn layout(&self) -> &Arc<RowLayout> {
        &self.layout
    }

    /// Row bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_slice()
    }

    /// Row bytes, mutably, for callers filling the row from storage.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        self.buf.as_mut_slice()
    }

    /// Presence mask, one bit per column in declaration order.
    pub fn mask(&self) -> &[u8] {
        &self.mask
    }

    fn mark(&mut self, id: ColumnId) -> Result<()> {
        let ordinal = self.layout.slot(id)?.ordinal();
        self.mask[ordinal / 8] |= 1 << (ordinal % 8);
        Ok(())
    }

    /// Marks column `id` for reading without writing it.
    pub fn request(&mut self, id: ColumnId) -> Result<()> {
        self.mark(id)
    }

    /// Whether column `id` was written or requested.
    pub fn is_present(&self, id: ColumnId) -> Result<bool> {
        let ordinal = self.layout.slot(id)?.ordinal();
        Ok(self.mask[ordinal / 8] & (1 << (ordinal % 8)) != 0)
    }

    /// Writes a value of any type.
    pub fn set(&mut self, id: ColumnId, value: &Value) -> Result<()> {
        self.layout.set(self.buf.as_mut_slice(), id, value)?;
        self.mark(id)
    }

    /// Reads a value of any type.
    pub fn get(&self, id: ColumnId) -> Result<Value> {
        self.layout.get(self.buf.as_slice(), id)
    }

    /// Marks column `id` null.
    pub fn set_null(&mut self, id: ColumnId) -> Result<()> {
        self.layout.set_null(self.buf.as_mut_slice(), id)?;
        self.mark(id)
    }

    /// Whether column `id` is null.
    pub fn is_null(&self, id: ColumnId) -> Result<bool> {
        self.layout.is_null(self.buf.as_slice(), id)
    }

    fn wrong_accessor(&self, id: ColumnId, wanted: &'static str, found: &Value) -> RowpackError {
        let (column, column_type) = match self.layout.slot(id) {
            Ok(slot) => (
                slot.column().name().to_string(),
                slot.column().column_type().name(),
            ),
            Err(_) => (id.to_string(), "unknown"),
        };
        tracing::error!(%column, wanted, found = found.type_name(), "row.wrong_accessor");
        RowpackError::TypeMismatch {
            column,
            column_type,
            value_type: wanted,
        }
    }

    /// Writes a signed integer.
    pub fn set_i64(&mut self, id: ColumnId, value: i64) -> Result<()> {
        self.set(id, &Value::Int(value))
    }

    /// Reads an integer column as `i64`.
    pub fn get_i64(&self, id: ColumnId) -> Result<Option<i64>> {
        match self.get(id)? {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(v)),
            Value::UInt(v) if v <= i64::MAX as u64 => Ok(Some(v as i64)),
            other => Err(self.wrong_accessor(id, "int", &other)),
        }
    }

    /// Writes an unsigned integer.
    pub fn set_u64(&mut self, id: ColumnId, value: u64) -> Result<()> {
        self.set(id, &Value::UInt(value))
    }

    /// Reads an integer column as `u64`.
    pub fn get_u64(&self, id: ColumnId) -> Result<Option<u64>> {
        match self.get(id)? {
            Value::Null => Ok(None),
            Value::UInt(v) => Ok(Some(v)),
            Value::Int(v) if v >= 0 => Ok(Some(v as u64)),
            other => Err(self.wrong_accessor(id, "uint", &other)),
        }
    }

    /// Reads a float or double column as `f64`.
    pub fn get_f64(&self, id: ColumnId) -> Result<Option<f64>> {
        match self.get(id)? {
            Value::Null => Ok(None),
            Value::Double(v) => Ok(Some(v)),
            Value::Float(v) => Ok(Some(v as f64)),
            other => Err(self.wrong_accessor(id, "double", &other)),
        }
    }

    /// Writes a double.
    pub fn set_f64(&mut self, id: ColumnId, value: f64) -> Result<()> {
        self.set(id, &Value::Double(value))
    }

    typed_accessors! {
        set_f32 / get_f32: f32 => "float", Float;
        set_decimal / get_decimal: String => "decimal", Decimal;
        set_str / get_str: String => "string", Str;
        set_bytes / get_bytes: Vec<u8> => "bytes", Bytes;
        set_date / get_date: Date => "date", Date;
        set_time / get_time: Time => "time", Time;
        set_datetime / get_datetime: PrimitiveDateTime => "datetime", DateTime;
        set_timestamp / get_timestamp: OffsetDateTime => "timestamp", Timestamp;
    }

    /// Returns the buffer to its pool, surfacing guard or size violations.
    pub fn release(self) -> Result<()> {
        self.buf.release()
    }
}
