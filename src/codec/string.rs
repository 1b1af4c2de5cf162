//! Fixed and length-prefixed character and byte strings.

use crate::schema::ColumnDescriptor;
use crate::types::{Result, RowpackError};

use super::charset::CharsetRegistry;
use super::temporal::corrupt;
use super::Value;

/// Largest supported length prefix.
pub const MAX_PREFIX_WIDTH: usize = 2;

fn too_long(column: &ColumnDescriptor, length: usize, max: usize) -> RowpackError {
    RowpackError::ValueTooLong {
        column: column.name().to_string(),
        length,
        max,
    }
}

/// Writes `payload` behind a `width`-byte length prefix (little-endian when
/// two bytes wide) and zeroes the unused tail of `dst`.
///
/// `max` caps the payload length below the space available in `dst`.
pub fn write_prefixed(column: &ColumnDescriptor, dst: &mut [u8], width: usize, payload: &[u8], max: usize) -> Result<()> {
    if width > MAX_PREFIX_WIDTH {
        return Err(RowpackError::InvalidPrefixWidth {
            column: column.name().to_string(),
            width,
        });
    }
    let prefix_max = match width {
        0 => usize::MAX,
        1 => u8::MAX as usize,
        _ => u16::MAX as usize,
    };
    let max = max.min(dst.len() - width).min(prefix_max);
    if payload.len() > max {
        return Err(too_long(column, payload.len(), max));
    }
    match width {
        0 => {}
        1 => dst[0] = payload.len() as u8,
        _ => dst[..2].copy_from_slice(&(payload.len() as u16).to_le_bytes()),
    }
    let (body, tail) = dst[width..].split_at_mut(payload.len());
    body.copy_from_slice(payload);
    tail.fill(0);
    Ok(())
}

/// Reads the payload written by [`write_prefixed`].
pub fn read_prefixed<'a>(column: &ColumnDescriptor, src: &'a [u8], width: usize) -> Result<&'a [u8]> {
    let len = match width {
        0 => return Ok(src),
        1 => src[0] as usize,
        2 => u16::from_le_bytes([src[0], src[1]]) as usize,
        _ => {
            return Err(RowpackError::InvalidPrefixWidth {
                column: column.name().to_string(),
                width,
            })
        }
    };
    src.get(width..width + len).ok_or_else(|| {
        corrupt(
            column,
            format!("length prefix {len} exceeds {} bytes", src.len() - width),
        )
    })
}

/// Encodes text through the column's charset. Fixed-width columns are padded
/// with the charset's space.
pub fn pack_text(column: &ColumnDescriptor, text: &str, dst: &mut [u8], charsets: &CharsetRegistry) -> Result<()> {
    let conv = charsets.for_column(column)?;
    let encoded = conv.encode(text, charsets.pool())?;
    let width = column.prefix_len();
    if width > 0 {
        write_prefixed(column, dst, width, encoded.as_bytes(), column.length())?;
        return encoded.release();
    }
    let bytes = encoded.as_bytes();
    if bytes.len() > dst.len() {
        return Err(too_long(column, bytes.len(), dst.len()));
    }
    let (body, pad) = dst.split_at_mut(bytes.len());
    body.copy_from_slice(bytes);
    let space = conv.space();
    let mut chunks = pad.chunks_exact_mut(space.len());
    for unit in &mut chunks {
        unit.copy_from_slice(space);
    }
    chunks.into_remainder().fill(0);
    encoded.release()
}

/// Decodes text; fixed-width values lose their trailing padding.
pub fn unpack_text(column: &ColumnDescriptor, src: &[u8], charsets: &CharsetRegistry) -> Result<Value> {
    let conv = charsets.for_column(column)?;
    let width = column.prefix_len();
    let payload = if width > 0 {
        read_prefixed(column, src, width)?
    } else {
        let space = conv.space();
        let mut end = src.len() - src.len() % space.len();
        while end >= space.len() && &src[end - space.len()..end] == space {
            end -= space.len();
        }
        &src[..end]
    };
    Ok(Value::Str(conv.decode(payload, charsets.pool())?))
}

/// Copies raw bytes. Fixed-width columns are zero padded.
pub fn pack_bytes(column: &ColumnDescriptor, bytes: &[u8], dst: &mut [u8]) -> Result<()> {
    let width = column.prefix_len();
    let max = if width > 0 { column.length() } else { dst.len() };
    write_prefixed(column, dst, width, bytes, max)
}

/// Fixed-width values come back at their full declared width.
pub fn unpack_bytes(column: &ColumnDescriptor, src: &[u8]) -> Result<Value> {
    Ok(Value::Bytes(read_prefixed(column, src, column.prefix_len())?.to_vec()))
}
