//! Native-order integers, floats and bit fields.

use crate::primitives::bytes::ne;
use crate::schema::{ColumnDescriptor, ColumnType};
use crate::types::{Result, RowpackError};

use super::Value;

/// Inclusive range of an integer column type.
pub fn integer_bounds(ty: ColumnType) -> (i128, i128) {
    use ColumnType::*;
    match ty {
        Tinyint => (i8::MIN as i128, i8::MAX as i128),
        Tinyunsigned => (0, u8::MAX as i128),
        Smallint => (i16::MIN as i128, i16::MAX as i128),
        Smallunsigned => (0, u16::MAX as i128),
        Mediumint => (-(1 << 23), (1 << 23) - 1),
        Mediumunsigned => (0, (1 << 24) - 1),
        Int => (i32::MIN as i128, i32::MAX as i128),
        Unsigned => (0, u32::MAX as i128),
        Bigint => (i64::MIN as i128, i64::MAX as i128),
        _ => (0, u64::MAX as i128),
    }
}

fn is_signed(ty: ColumnType) -> bool {
    matches!(
        ty,
        ColumnType::Tinyint
            | ColumnType::Smallint
            | ColumnType::Mediumint
            | ColumnType::Int
            | ColumnType::Bigint
    )
}

pub(crate) fn out_of_range(column: &ColumnDescriptor, value: impl ToString, min: impl ToString, max: impl ToString) -> RowpackError {
    RowpackError::ValueOutOfRange {
        column: column.name().to_string(),
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    }
}

pub fn pack_integer(column: &ColumnDescriptor, value: i128, dst: &mut [u8]) -> Result<()> {
    let (min, max) = integer_bounds(column.column_type());
    if value < min || value > max {
        return Err(out_of_range(column, value, min, max));
    }
    // Two's complement truncation to the column width.
    let raw = value as u64;
    match dst.len() {
        1 => dst[0] = raw as u8,
        2 => ne::put_u16(dst, raw as u16),
        3 => ne::put_u24(dst, raw as u32 & 0x00FF_FFFF),
        4 => ne::put_u32(dst, raw as u32),
        _ => ne::put_u64(dst, raw),
    }
    Ok(())
}

pub fn unpack_integer(column: &ColumnDescriptor, src: &[u8]) -> Value {
    let signed = is_signed(column.column_type());
    match (src.len(), signed) {
        (1, true) => Value::Int(src[0] as i8 as i64),
        (1, false) => Value::UInt(src[0] as u64),
        (2, true) => Value::Int(ne::get_u16(src) as i16 as i64),
        (2, false) => Value::UInt(ne::get_u16(src) as u64),
        (3, true) => Value::Int(ne::get_i24(src) as i64),
        (3, false) => Value::UInt(ne::get_u24(src) as u64),
        (4, true) => Value::Int(ne::get_u32(src) as i32 as i64),
        (4, false) => Value::UInt(ne::get_u32(src) as u64),
        (_, true) => Value::Int(ne::get_u64(src) as i64),
        (_, false) => Value::UInt(ne::get_u64(src)),
    }
}

pub fn pack_float(column: &ColumnDescriptor, value: f64, dst: &mut [u8]) -> Result<()> {
    if value.is_finite() && value.abs() > f32::MAX as f64 {
        return Err(out_of_range(column, value, f32::MIN, f32::MAX));
    }
    ne::put_u32(dst, (value as f32).to_bits());
    Ok(())
}

pub fn unpack_float(src: &[u8]) -> Value {
    Value::Float(f32::from_bits(ne::get_u32(src)))
}

pub fn pack_double(value: f64, dst: &mut [u8]) {
    ne::put_u64(dst, value.to_bits());
}

pub fn unpack_double(src: &[u8]) -> Value {
    Value::Double(f64::from_bits(ne::get_u64(src)))
}

/// Bit fields are stored as 32-bit native words, least significant word first.
pub fn pack_bit(column: &ColumnDescriptor, value: i128, dst: &mut [u8]) -> Result<()> {
    let bits = column.length() as u32;
    let max: u128 = if bits >= 64 {
        u64::MAX as u128
    } else {
        (1u128 << bits) - 1
    };
    if value < 0 || value as u128 > max {
        return Err(out_of_range(column, value, 0, max));
    }
    let value = value as u64;
    for (i, word) in dst.chunks_exact_mut(4).enumerate() {
        let shifted = value.checked_shr(32 * i as u32).unwrap_or(0);
        ne::put_u32(word, shifted as u32);
    }
    Ok(())
}

pub fn unpack_bit(src: &[u8]) -> Value {
    let value = src
        .chunks_exact(4)
        .enumerate()
        .fold(0u64, |acc, (i, word)| {
            let word = ne::get_u32(word) as u64;
            acc | word.checked_shl(32 * i as u32).unwrap_or(0)
        });
    Value::UInt(value)
}
