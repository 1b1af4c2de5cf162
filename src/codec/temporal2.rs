//! v2 temporal columns with fractional seconds, always big-endian.
//!
//! ```text
//! DATETIME2  1 sign | 17 year*13+month | 5 day | 5 hour | 6 minute | 6 second | frac
//! TIME2      1 sign | 1 unused | 10 hour | 6 minute | 6 second | frac
//! TIMESTAMP2 32 unix seconds | frac
//! ```
//!
//! The fractional field takes `(fsp + 1) / 2` bytes: hundredths of a second
//! for fsp 1-2, ten-thousandths for 3-4, microseconds for 5-6.

use std::fmt::Display;

use time::{OffsetDateTime, PrimitiveDateTime, Time};

use crate::primitives::bytes::be;
use crate::schema::{ColumnDescriptor, ColumnType};
use crate::types::{Result, RowpackError};

use super::numeric::out_of_range;
use super::temporal::{check_year, corrupt, make_date, make_time};
use super::Value;

/// Largest fractional-second precision.
pub const MAX_FSP: u8 = 6;

const DATETIME2_INT_BYTES: usize = 5;
const TIME2_INT_BYTES: usize = 3;
const TIMESTAMP2_INT_BYTES: usize = 4;
const DATETIME2_SIGN: u64 = 0x80_0000_0000;
const TIME2_SIGN: u64 = 0x80_0000;
const NANOS_PER_MICRO: u32 = 1_000;

/// Bytes of the fractional field for precision `fsp`.
pub const fn frac_bytes(fsp: u8) -> usize {
    (fsp as usize + 1) / 2
}

/// Total encoded size of a v2 temporal column.
pub fn packed_len(ty: ColumnType, fsp: u8) -> usize {
    let int_bytes = match ty {
        ColumnType::Datetime2 => DATETIME2_INT_BYTES,
        ColumnType::Timestamp2 => TIMESTAMP2_INT_BYTES,
        _ => TIME2_INT_BYTES,
    };
    int_bytes + frac_bytes(fsp)
}

/// Rejects sub-second digits beyond `fsp`.
pub(crate) fn check_fraction(column: &ColumnDescriptor, nanos: u32, fsp: u8, value: &dyn Display) -> Result<()> {
    let unit = 10u32.pow(9 - fsp.min(MAX_FSP) as u32);
    if nanos % unit != 0 {
        return Err(RowpackError::PrecisionLoss {
            column: column.name().to_string(),
            precision: fsp,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Scaled fractional field value for the column precision.
fn frac_value(fsp: u8, nanos: u32) -> u64 {
    let micros = (nanos / NANOS_PER_MICRO) as u64;
    match frac_bytes(fsp) {
        0 => 0,
        1 => micros / 10_000,
        2 => micros / 100,
        _ => micros,
    }
}

fn frac_micros(fsp: u8, raw: u64) -> u32 {
    let micros = match frac_bytes(fsp) {
        0 => 0,
        1 => raw * 10_000,
        2 => raw * 100,
        _ => raw,
    };
    micros as u32
}

fn write_frac(fsp: u8, nanos: u32, dst: &mut [u8]) {
    let width = frac_bytes(fsp);
    be::put_uint(dst, frac_value(fsp, nanos), width);
}

fn read_frac(column: &ColumnDescriptor, src: &[u8]) -> Result<u32> {
    let fsp = column.precision();
    let raw = be::get_uint(src, frac_bytes(fsp));
    let micros = frac_micros(fsp, raw);
    if micros >= 1_000_000 {
        return Err(corrupt(column, format!("fraction {raw} exceeds one second")));
    }
    Ok(micros)
}

fn hms(time: Time) -> u64 {
    (time.hour() as u64) << 12 | (time.minute() as u64) << 6 | time.second() as u64
}

fn split_hms(packed: u64) -> (u8, u8, u8) {
    (
        ((packed >> 12) & 0x3FF) as u8,
        ((packed >> 6) & 0x3F) as u8,
        (packed & 0x3F) as u8,
    )
}

pub fn pack_datetime2(column: &ColumnDescriptor, value: PrimitiveDateTime, dst: &mut [u8]) -> Result<()> {
    let fsp = column.precision();
    check_year(column, value.date())?;
    check_fraction(column, value.nanosecond(), fsp, &value)?;
    let year_month = value.year() as u64 * 13 + u8::from(value.month()) as u64;
    let ymd = year_month << 5 | value.day() as u64;
    let packed = (ymd << 17 | hms(value.time())) + DATETIME2_SIGN;
    be::put_uint(dst, packed, DATETIME2_INT_BYTES);
    write_frac(fsp, value.nanosecond(), &mut dst[DATETIME2_INT_BYTES..]);
    Ok(())
}

pub fn unpack_datetime2(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let packed = be::get_uint(src, DATETIME2_INT_BYTES);
    if packed & DATETIME2_SIGN == 0 {
        return Err(corrupt(column, "negative datetime2 value".into()));
    }
    let int_part = packed - DATETIME2_SIGN;
    let ymd = int_part >> 17;
    let year_month = ymd >> 5;
    let (hour, minute, second) = split_hms(int_part & 0x1FFFF);
    let micros = read_frac(column, &src[DATETIME2_INT_BYTES..])?;
    let date = make_date(
        column,
        (year_month / 13) as i32,
        (year_month % 13) as u8,
        (ymd & 0x1F) as u8,
    )?;
    let time = make_time(column, hour, minute, second, micros)?;
    Ok(Value::DateTime(PrimitiveDateTime::new(date, time)))
}

pub fn pack_time2(column: &ColumnDescriptor, value: Time, dst: &mut [u8]) -> Result<()> {
    let fsp = column.precision();
    check_fraction(column, value.nanosecond(), fsp, &value)?;
    be::put_uint(dst, hms(value) + TIME2_SIGN, TIME2_INT_BYTES);
    write_frac(fsp, value.nanosecond(), &mut dst[TIME2_INT_BYTES..]);
    Ok(())
}

pub fn unpack_time2(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let packed = be::get_uint(src, TIME2_INT_BYTES);
    if packed & TIME2_SIGN == 0 {
        return Err(corrupt(column, "negative time2 value".into()));
    }
    let (hour, minute, second) = split_hms(packed - TIME2_SIGN);
    if hour > 23 {
        return Err(corrupt(column, format!("time2 hour {hour} exceeds one day")));
    }
    let micros = read_frac(column, &src[TIME2_INT_BYTES..])?;
    Ok(Value::Time(make_time(column, hour, minute, second, micros)?))
}

pub fn pack_timestamp2(column: &ColumnDescriptor, value: OffsetDateTime, dst: &mut [u8]) -> Result<()> {
    let fsp = column.precision();
    check_fraction(column, value.nanosecond(), fsp, &value)?;
    let secs = value.unix_timestamp();
    if !(0..=u32::MAX as i64).contains(&secs) {
        return Err(out_of_range(column, value, 0, u32::MAX));
    }
    be::put_uint(dst, secs as u64, TIMESTAMP2_INT_BYTES);
    write_frac(fsp, value.nanosecond(), &mut dst[TIMESTAMP2_INT_BYTES..]);
    Ok(())
}

pub fn unpack_timestamp2(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let secs = be::get_uint(src, TIMESTAMP2_INT_BYTES) as i128;
    let micros = read_frac(column, &src[TIMESTAMP2_INT_BYTES..])? as i128;
    let nanos = secs * 1_000_000_000 + micros * NANOS_PER_MICRO as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map(Value::Timestamp)
        .map_err(|err| corrupt(column, format!("bad timestamp2 {secs}: {err}")))
}
