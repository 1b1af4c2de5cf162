#![forbid(unsafe_code)]

//! Typed pack/unpack of column values into their exact row representation.
//!
//! v1 numeric and temporal values use native byte order; v2 temporals and
//! packed decimals are big-endian.

pub mod charset;
pub mod decimal;
mod numeric;
pub mod string;
mod temporal;
pub mod temporal2;
mod value;

use tracing::error;

use crate::schema::{ColumnDescriptor, ColumnType};
use crate::types::{Result, RowpackError};

pub use charset::{CharsetConverter, CharsetRegistry};
pub use numeric::integer_bounds;
pub use value::Value;

fn mismatch(column: &ColumnDescriptor, value: &Value) -> RowpackError {
    error!(
        column = column.name(),
        column_type = column.column_type().name(),
        value_type = value.type_name(),
        "codec.type_mismatch"
    );
    RowpackError::TypeMismatch {
        column: column.name().to_string(),
        column_type: column.column_type().name(),
        value_type: value.type_name(),
    }
}

fn out_of_line(column: &ColumnDescriptor) -> RowpackError {
    RowpackError::Unsupported {
        column: column.name().to_string(),
        reason: "blob and text payloads are stored out of line",
    }
}

fn region<'a>(buf: &'a [u8], offset: usize, column: &ColumnDescriptor) -> Result<&'a [u8]> {
    let end = offset + column.footprint();
    buf.get(offset..end).ok_or(RowpackError::BufferSizeMismatch {
        expected: end,
        actual: buf.len(),
    })
}

fn region_mut<'a>(buf: &'a mut [u8], offset: usize, column: &ColumnDescriptor) -> Result<&'a mut [u8]> {
    let end = offset + column.footprint();
    let actual = buf.len();
    buf.get_mut(offset..end)
        .ok_or(RowpackError::BufferSizeMismatch {
            expected: end,
            actual,
        })
}

fn integer_of(column: &ColumnDescriptor, value: &Value) -> Result<i128> {
    match value {
        Value::Int(v) => Ok(*v as i128),
        Value::UInt(v) => Ok(*v as i128),
        other => Err(mismatch(column, other)),
    }
}

/// Writes `value` into `buf[offset..offset + footprint]`.
///
/// Null is rejected here; nullability lives in the row's null bitmap.
pub fn pack(buf: &mut [u8], offset: usize, column: &ColumnDescriptor, value: &Value, charsets: &CharsetRegistry) -> Result<()> {
    use ColumnType::*;
    if value.is_null() {
        return Err(RowpackError::NullNotAllowed {
            column: column.name().to_string(),
        });
    }
    let dst = region_mut(buf, offset, column)?;
    match column.column_type() {
        Tinyint | Tinyunsigned | Smallint | Smallunsigned | Mediumint | Mediumunsigned | Int
        | Unsigned | Bigint | Bigunsigned => {
            numeric::pack_integer(column, integer_of(column, value)?, dst)
        }
        Float => match value {
            Value::Float(v) => numeric::pack_float(column, *v as f64, dst),
            Value::Double(v) => numeric::pack_float(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Double => match value {
            Value::Double(v) => {
                numeric::pack_double(*v, dst);
                Ok(())
            }
            Value::Float(v) => {
                numeric::pack_double(*v as f64, dst);
                Ok(())
            }
            other => Err(mismatch(column, other)),
        },
        Bit => numeric::pack_bit(column, integer_of(column, value)?, dst),
        Year => temporal::pack_year(column, integer_of(column, value)?, dst),
        Decimal | Decimalunsigned | Olddecimal | Olddecimalunsigned => match value {
            Value::Decimal(text) => decimal::pack(column, text, dst),
            Value::Int(v) => decimal::pack(column, &v.to_string(), dst),
            Value::UInt(v) => decimal::pack(column, &v.to_string(), dst),
            other => Err(mismatch(column, other)),
        },
        Char | Varchar | Longvarchar => match value {
            Value::Str(text) => string::pack_text(column, text, dst, charsets),
            other => Err(mismatch(column, other)),
        },
        Binary | Varbinary | Longvarbinary => match value {
            Value::Bytes(bytes) => string::pack_bytes(column, bytes, dst),
            other => Err(mismatch(column, other)),
        },
        Date => match value {
            Value::Date(v) => temporal::pack_date(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Time => match value {
            Value::Time(v) => temporal::pack_time(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Datetime => match value {
            Value::DateTime(v) => temporal::pack_datetime(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Timestamp => match value {
            Value::Timestamp(v) => temporal::pack_timestamp(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Time2 => match value {
            Value::Time(v) => temporal2::pack_time2(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Datetime2 => match value {
            Value::DateTime(v) => temporal2::pack_datetime2(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Timestamp2 => match value {
            Value::Timestamp(v) => temporal2::pack_timestamp2(column, *v, dst),
            other => Err(mismatch(column, other)),
        },
        Blob | Text => Err(out_of_line(column)),
    }
}

/// Reads the value stored at `buf[offset..offset + footprint]`.
pub fn unpack(buf: &[u8], offset: usize, column: &ColumnDescriptor, charsets: &CharsetRegistry) -> Result<Value> {
    use ColumnType::*;
    let src = region(buf, offset, column)?;
    match column.column_type() {
        Tinyint | Tinyunsigned | Smallint | Smallunsigned | Mediumint | Mediumunsigned | Int
        | Unsigned | Bigint | Bigunsigned => Ok(numeric::unpack_integer(column, src)),
        Float => Ok(numeric::unpack_float(src)),
        Double => Ok(numeric::unpack_double(src)),
        Bit => Ok(numeric::unpack_bit(src)),
        Year => Ok(temporal::unpack_year(src)),
        Decimal | Decimalunsigned | Olddecimal | Olddecimalunsigned => {
            decimal::unpack(column, src).map(Value::Decimal)
        }
        Char | Varchar | Longvarchar => string::unpack_text(column, src, charsets),
        Binary | Varbinary | Longvarbinary => string::unpack_bytes(column, src),
        Date => temporal::unpack_date(column, src),
        Time => temporal::unpack_time(column, src),
        Datetime => temporal::unpack_datetime(column, src),
        Timestamp => temporal::unpack_timestamp(column, src),
        Time2 => temporal2::unpack_time2(column, src),
        Datetime2 => temporal2::unpack_datetime2(column, src),
        Timestamp2 => temporal2::unpack_timestamp2(column, src),
        Blob | Text => Err(out_of_line(column)),
    }
}

/// Value a non-null column holds before anything is written to it, or `None`
/// for out-of-line columns whose handle stays zeroed.
pub fn zero_value(column: &ColumnDescriptor) -> Option<Value> {
    use ColumnType::*;
    let epoch_date = time::Date::from_calendar_date(1970, time::Month::January, 1).ok()?;
    let value = match column.column_type() {
        Tinyint | Smallint | Mediumint | Int | Bigint | Year => Value::Int(0),
        Tinyunsigned | Smallunsigned | Mediumunsigned | Unsigned | Bigunsigned | Bit => {
            Value::UInt(0)
        }
        Float => Value::Float(0.0),
        Double => Value::Double(0.0),
        Decimal | Decimalunsigned | Olddecimal | Olddecimalunsigned => Value::Decimal("0".into()),
        Char | Varchar | Longvarchar => Value::Str(String::new()),
        Binary | Varbinary | Longvarbinary => Value::Bytes(Vec::new()),
        Date => Value::Date(epoch_date),
        Time | Time2 => Value::Time(time::Time::MIDNIGHT),
        Datetime | Datetime2 => Value::DateTime(time::PrimitiveDateTime::new(epoch_date, time::Time::MIDNIGHT)),
        Timestamp | Timestamp2 => Value::Timestamp(time::OffsetDateTime::UNIX_EPOCH),
        Blob | Text => return None,
    };
    Some(value)
}
