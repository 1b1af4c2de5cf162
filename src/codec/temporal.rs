//! v1 temporal columns: native-order packed calendar fields.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

use crate::primitives::bytes::ne;
use crate::schema::ColumnDescriptor;
use crate::types::{Result, RowpackError};

use super::numeric::out_of_range;
use super::temporal2::check_fraction;
use super::Value;

const MAX_YEAR: i32 = 9999;
const YEAR_BASE: i64 = 1900;
const YEAR_MIN: i64 = 1901;
const YEAR_MAX: i64 = 2155;

pub(crate) fn corrupt(column: &ColumnDescriptor, reason: String) -> RowpackError {
    tracing::error!(column = column.name(), %reason, "temporal.corruption");
    RowpackError::Corruption {
        column: column.name().to_string(),
        reason,
    }
}

pub(crate) fn check_year(column: &ColumnDescriptor, date: Date) -> Result<()> {
    if !(0..=MAX_YEAR).contains(&date.year()) {
        return Err(out_of_range(column, date, "0000-01-01", "9999-12-31"));
    }
    Ok(())
}

pub(crate) fn make_date(column: &ColumnDescriptor, year: i32, month: u8, day: u8) -> Result<Date> {
    Month::try_from(month)
        .and_then(|m| Date::from_calendar_date(year, m, day))
        .map_err(|err| corrupt(column, format!("bad date {year}-{month}-{day}: {err}")))
}

pub(crate) fn make_time(column: &ColumnDescriptor, hour: u8, minute: u8, second: u8, micros: u32) -> Result<Time> {
    Time::from_hms_micro(hour, minute, second, micros).map_err(|err| {
        corrupt(
            column,
            format!("bad time {hour}:{minute}:{second}.{micros}: {err}"),
        )
    })
}

/// `year * 512 + month * 32 + day`, 3 bytes.
pub fn pack_date(column: &ColumnDescriptor, date: Date, dst: &mut [u8]) -> Result<()> {
    check_year(column, date)?;
    let packed = date.year() as u32 * 512 + u8::from(date.month()) as u32 * 32 + date.day() as u32;
    ne::put_u24(dst, packed);
    Ok(())
}

pub fn unpack_date(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let packed = ne::get_u24(src);
    let date = make_date(
        column,
        (packed >> 9) as i32,
        ((packed >> 5) & 0x0F) as u8,
        (packed & 0x1F) as u8,
    )?;
    Ok(Value::Date(date))
}

/// `hour * 10000 + minute * 100 + second`, signed 3 bytes.
pub fn pack_time(column: &ColumnDescriptor, time: Time, dst: &mut [u8]) -> Result<()> {
    check_fraction(column, time.nanosecond(), 0, &time)?;
    let packed = time.hour() as i32 * 10_000 + time.minute() as i32 * 100 + time.second() as i32;
    ne::put_u24(dst, packed as u32 & 0x00FF_FFFF);
    Ok(())
}

pub fn unpack_time(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let packed = ne::get_i24(src);
    if packed < 0 {
        return Err(corrupt(column, format!("negative time {packed}")));
    }
    let hour = packed / 10_000;
    let minute = packed / 100 % 100;
    let second = packed % 100;
    if hour > 23 {
        return Err(corrupt(column, format!("time {packed} exceeds one day")));
    }
    Ok(Value::Time(make_time(
        column,
        hour as u8,
        minute as u8,
        second as u8,
        0,
    )?))
}

/// `year*1e10 + month*1e8 + day*1e6 + hour*1e4 + minute*100 + second`, 8 bytes.
pub fn pack_datetime(column: &ColumnDescriptor, value: PrimitiveDateTime, dst: &mut [u8]) -> Result<()> {
    check_year(column, value.date())?;
    check_fraction(column, value.nanosecond(), 0, &value)?;
    let packed = value.year() as u64 * 10_000_000_000
        + u8::from(value.month()) as u64 * 100_000_000
        + value.day() as u64 * 1_000_000
        + value.hour() as u64 * 10_000
        + value.minute() as u64 * 100
        + value.second() as u64;
    ne::put_u64(dst, packed);
    Ok(())
}

pub fn unpack_datetime(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let packed = ne::get_u64(src);
    let date_part = packed / 1_000_000;
    let time_part = packed % 1_000_000;
    let year = date_part / 10_000;
    if year > MAX_YEAR as u64 {
        return Err(corrupt(column, format!("datetime {packed} out of range")));
    }
    let date = make_date(
        column,
        year as i32,
        (date_part / 100 % 100) as u8,
        (date_part % 100) as u8,
    )?;
    let time = make_time(
        column,
        (time_part / 10_000) as u8,
        (time_part / 100 % 100) as u8,
        (time_part % 100) as u8,
        0,
    )?;
    Ok(Value::DateTime(PrimitiveDateTime::new(date, time)))
}

/// Unsigned 32-bit Unix seconds.
pub fn pack_timestamp(column: &ColumnDescriptor, value: OffsetDateTime, dst: &mut [u8]) -> Result<()> {
    check_fraction(column, value.nanosecond(), 0, &value)?;
    let secs = value.unix_timestamp();
    if !(0..=u32::MAX as i64).contains(&secs) {
        return Err(out_of_range(column, value, 0, u32::MAX));
    }
    ne::put_u32(dst, secs as u32);
    Ok(())
}

pub fn unpack_timestamp(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    let secs = ne::get_u32(src) as i64;
    OffsetDateTime::from_unix_timestamp(secs)
        .map(Value::Timestamp)
        .map_err(|err| corrupt(column, format!("bad timestamp {secs}: {err}")))
}

/// One byte holding `year - 1900`; zero stands for the zero year.
pub fn pack_year(column: &ColumnDescriptor, year: i128, dst: &mut [u8]) -> Result<()> {
    let byte = match year {
        0 => 0,
        y if (YEAR_MIN as i128..=YEAR_MAX as i128).contains(&y) => (y - YEAR_BASE as i128) as u8,
        y => return Err(out_of_range(column, y, YEAR_MIN, YEAR_MAX)),
    };
    dst[0] = byte;
    Ok(())
}

pub fn unpack_year(src: &[u8]) -> Value {
    match src[0] {
        0 => Value::Int(0),
        b => Value::Int(YEAR_BASE + b as i64),
    }
}
