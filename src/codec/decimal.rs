//! MySQL packed binary decimal.
//!
//! Digits are grouped in nines from the decimal point outwards. Full groups
//! take four big-endian bytes; a partial group of `n` digits takes
//! `DIG2BYTES[n]` bytes. The leading integer group is the partial one, the
//! trailing fraction group is the partial one. Negative numbers invert every
//! byte, and the sign bit of the first byte is flipped so that the encoding
//! sorts bytewise.

use smallvec::SmallVec;

use crate::primitives::bytes::be;
use crate::schema::{ColumnDescriptor, ColumnType};
use crate::types::{Result, RowpackError};

use super::numeric::out_of_range;

/// Largest supported precision.
pub const MAX_PRECISION: u8 = 65;
/// Largest supported scale.
pub const MAX_SCALE: u8 = 30;

const DIGITS_PER_GROUP: usize = 9;
const GROUP_BYTES: usize = 4;
const DIG2BYTES: [usize; DIGITS_PER_GROUP + 1] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];
const POW10: [u32; DIGITS_PER_GROUP + 1] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

fn digits_len(digits: usize) -> usize {
    digits / DIGITS_PER_GROUP * GROUP_BYTES + DIG2BYTES[digits % DIGITS_PER_GROUP]
}

/// Encoded size of a decimal with `precision` total and `scale` fractional digits.
pub fn packed_len(precision: u8, scale: u8) -> usize {
    let intg = precision.saturating_sub(scale) as usize;
    digits_len(intg) + digits_len(scale as usize)
}

struct Parsed<'a> {
    negative: bool,
    int_digits: &'a str,
    frac_digits: &'a str,
}

fn invalid(column: &ColumnDescriptor, text: &str, reason: &'static str) -> RowpackError {
    RowpackError::InvalidValue {
        column: column.name().to_string(),
        value: text.to_string(),
        reason,
    }
}

fn parse<'a>(column: &ColumnDescriptor, text: &'a str) -> Result<Parsed<'a>> {
    let trimmed = text.trim();
    let (negative, body) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid(column, text, "missing digits"));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(column, text, "malformed decimal literal"));
    }
    Ok(Parsed {
        negative,
        int_digits: int_part.trim_start_matches('0'),
        frac_digits: frac_part,
    })
}

fn bounds(column: &ColumnDescriptor) -> (String, String) {
    let intg = (column.precision() - column.scale()) as usize;
    let scale = column.scale() as usize;
    let mut max = if intg == 0 { "0".to_string() } else { "9".repeat(intg) };
    if scale > 0 {
        max.push('.');
        max.push_str(&"9".repeat(scale));
    }
    let min = if column.column_type() == ColumnType::Decimalunsigned
        || column.column_type() == ColumnType::Olddecimalunsigned
    {
        "0".to_string()
    } else {
        format!("-{max}")
    };
    (min, max)
}

fn is_unsigned(column: &ColumnDescriptor) -> bool {
    matches!(
        column.column_type(),
        ColumnType::Decimalunsigned | ColumnType::Olddecimalunsigned
    )
}

/// Parses `text` and writes its packed form into `dst` (exactly `packed_len` bytes).
pub fn pack(column: &ColumnDescriptor, text: &str, dst: &mut [u8]) -> Result<()> {
    let intg = (column.precision() - column.scale()) as usize;
    let scale = column.scale() as usize;
    let parsed = parse(column, text)?;

    if parsed.int_digits.len() > intg {
        let (min, max) = bounds(column);
        return Err(out_of_range(column, text.trim(), min, max));
    }
    let frac_digits = if parsed.frac_digits.len() > scale {
        let (kept, dropped) = parsed.frac_digits.split_at(scale);
        if dropped.bytes().any(|b| b != b'0') {
            return Err(invalid(column, text, "more fractional digits than the column scale"));
        }
        kept
    } else {
        parsed.frac_digits
    };
    let is_zero = parsed.int_digits.is_empty() && frac_digits.bytes().all(|b| b == b'0');
    let negative = parsed.negative && !is_zero;
    if negative && is_unsigned(column) {
        let (min, max) = bounds(column);
        return Err(out_of_range(column, text.trim(), min, max));
    }

    // Left-pad the integer digits to `intg` and right-pad the fraction to `scale`.
    let mut digits: SmallVec<[u8; 96]> = SmallVec::with_capacity(intg + scale);
    digits.extend(std::iter::repeat(0).take(intg - parsed.int_digits.len()));
    digits.extend(parsed.int_digits.bytes().map(|b| b - b'0'));
    digits.extend(frac_digits.bytes().map(|b| b - b'0'));
    digits.extend(std::iter::repeat(0).take(scale - frac_digits.len()));

    let expected = packed_len(column.precision(), column.scale());
    if dst.len() != expected {
        return Err(RowpackError::BufferSizeMismatch {
            expected,
            actual: dst.len(),
        });
    }

    let mut pos = 0;
    let mut write_group = |group: &[u8], width: usize, pos: &mut usize| {
        let value = group.iter().fold(0u64, |acc, d| acc * 10 + *d as u64);
        be::put_uint(&mut dst[*pos..*pos + width], value, width);
        *pos += width;
    };
    let (int_digits, frac) = digits.split_at(intg);
    let lead = intg % DIGITS_PER_GROUP;
    write_group(&int_digits[..lead], DIG2BYTES[lead], &mut pos);
    for group in int_digits[lead..].chunks_exact(DIGITS_PER_GROUP) {
        write_group(group, GROUP_BYTES, &mut pos);
    }
    let full = scale / DIGITS_PER_GROUP * DIGITS_PER_GROUP;
    for group in frac[..full].chunks_exact(DIGITS_PER_GROUP) {
        write_group(group, GROUP_BYTES, &mut pos);
    }
    let tail = &frac[full..];
    write_group(tail, DIG2BYTES[tail.len()], &mut pos);

    if negative {
        for b in dst.iter_mut() {
            *b = !*b;
        }
    }
    dst[0] ^= 0x80;
    Ok(())
}

fn corrupt(column: &ColumnDescriptor, reason: String) -> RowpackError {
    tracing::error!(column = column.name(), %reason, "decimal.corruption");
    RowpackError::Corruption {
        column: column.name().to_string(),
        reason,
    }
}

/// Decodes a packed decimal into text with exactly `scale` fractional digits.
pub fn unpack(column: &ColumnDescriptor, src: &[u8]) -> Result<String> {
    let intg = (column.precision() - column.scale()) as usize;
    let scale = column.scale() as usize;
    let expected = packed_len(column.precision(), column.scale());
    if src.len() != expected || src.is_empty() {
        return Err(corrupt(
            column,
            format!("expected {expected} packed bytes, found {}", src.len()),
        ));
    }
    let mut bytes: SmallVec<[u8; 32]> = SmallVec::from_slice(src);
    bytes[0] ^= 0x80;
    let negative = bytes[0] & 0x80 != 0;
    if negative {
        for b in bytes.iter_mut() {
            *b = !*b;
        }
    }

    let mut pos = 0;
    let mut read_group = |digits: usize, width: usize, pos: &mut usize| -> Result<String> {
        let value = be::get_uint(&bytes[*pos..*pos + width], width);
        *pos += width;
        if digits == 0 {
            return Ok(String::new());
        }
        if value >= POW10[digits] as u64 {
            return Err(corrupt(
                column,
                format!("digit group {value} exceeds {digits} digits"),
            ));
        }
        Ok(format!("{value:0digits$}"))
    };

    let mut int_text = String::with_capacity(intg);
    let lead = intg % DIGITS_PER_GROUP;
    int_text.push_str(&read_group(lead, DIG2BYTES[lead], &mut pos)?);
    for _ in 0..intg / DIGITS_PER_GROUP {
        int_text.push_str(&read_group(DIGITS_PER_GROUP, GROUP_BYTES, &mut pos)?);
    }
    let mut frac_text = String::with_capacity(scale);
    for _ in 0..scale / DIGITS_PER_GROUP {
        frac_text.push_str(&read_group(DIGITS_PER_GROUP, GROUP_BYTES, &mut pos)?);
    }
    let tail = scale % DIGITS_PER_GROUP;
    frac_text.push_str(&read_group(tail, DIG2BYTES[tail], &mut pos)?);

    let int_text = match int_text.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let is_zero = int_text == "0" && frac_text.bytes().all(|b| b == b'0');
    let mut out = String::with_capacity(int_text.len() + scale + 2);
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(int_text);
    if scale > 0 {
        out.push('.');
        out.push_str(&frac_text);
    }
    Ok(out)
}
