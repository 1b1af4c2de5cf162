use std::sync::Arc;

use tracing::trace;

use crate::pool::{PooledBuffer, TieredBufferPool};
use crate::types::{Result, RowpackError};

use super::{CharsetConverter, Encoded};

const HOST_NAME: &str = "utf8";
const REPLACEMENT: char = '?';
const MAX_UTF8_LEN: usize = 4;

/// Byte encodings understood by [`recode`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Encoding {
    /// Host strings.
    Utf8,
    /// UTF-8 restricted to the BMP.
    Utf8mb3,
    /// Full UTF-8.
    Utf8mb4,
    /// Two bytes per character, big-endian, BMP only.
    Ucs2,
    /// UTF-16 big-endian.
    Utf16,
    /// UTF-16 little-endian.
    Utf16Le,
    /// UTF-32 big-endian.
    Utf32,
}

impl Encoding {
    fn max_char_len(self) -> usize {
        match self {
            Encoding::Utf8 | Encoding::Utf8mb4 | Encoding::Utf16 | Encoding::Utf16Le | Encoding::Utf32 => 4,
            Encoding::Utf8mb3 => 3,
            Encoding::Ucs2 => 2,
        }
    }

    fn space(self) -> &'static [u8] {
        match self {
            Encoding::Utf8 | Encoding::Utf8mb3 | Encoding::Utf8mb4 => b" ",
            Encoding::Ucs2 | Encoding::Utf16 => &[0x00, 0x20],
            Encoding::Utf16Le => &[0x20, 0x00],
            Encoding::Utf32 => &[0x00, 0x00, 0x00, 0x20],
        }
    }
}

/// Outcome of a [`recode`] call.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecodeStatus {
    /// All input converted; the payload is the number of bytes written.
    Complete(usize),
    /// `dst` filled up before the input was consumed.
    DestinationTooSmall,
    /// Undecodable input at the given source offset.
    BadSource(usize),
}

fn decode_char(enc: Encoding, src: &[u8]) -> Option<(char, usize)> {
    match enc {
        Encoding::Utf8 | Encoding::Utf8mb3 | Encoding::Utf8mb4 => {
            let width = match src[0] {
                0x00..=0x7F => 1,
                0xC2..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF4 if enc != Encoding::Utf8mb3 => 4,
                _ => return None,
            };
            let chunk = src.get(..width)?;
            let ch = std::str::from_utf8(chunk).ok()?.chars().next()?;
            Some((ch, width))
        }
        Encoding::Ucs2 => {
            let unit = u16::from_be_bytes([*src.first()?, *src.get(1)?]);
            char::from_u32(unit as u32).map(|ch| (ch, 2))
        }
        Encoding::Utf16 | Encoding::Utf16Le => {
            let read = |at: usize| -> Option<u16> {
                let pair = [*src.get(at)?, *src.get(at + 1)?];
                Some(if enc == Encoding::Utf16 {
                    u16::from_be_bytes(pair)
                } else {
                    u16::from_le_bytes(pair)
                })
            };
            let first = read(0)?;
            if (0xD800..0xDC00).contains(&first) {
                let second = read(2)?;
                let ch = char::decode_utf16([first, second]).next()?.ok()?;
                Some((ch, 4))
            } else {
                let ch = char::decode_utf16([first]).next()?.ok()?;
                Some((ch, 2))
            }
        }
        Encoding::Utf32 => {
            let quad: [u8; 4] = src.get(..4)?.try_into().ok()?;
            char::from_u32(u32::from_be_bytes(quad)).map(|ch| (ch, 4))
        }
    }
}

fn encode_char(enc: Encoding, ch: char, dst: &mut [u8]) -> Option<usize> {
    let ch = match enc {
        Encoding::Utf8mb3 | Encoding::Ucs2 if ch as u32 > 0xFFFF => REPLACEMENT,
        _ => ch,
    };
    match enc {
        Encoding::Utf8 | Encoding::Utf8mb3 | Encoding::Utf8mb4 => {
            let width = ch.len_utf8();
            let slot = dst.get_mut(..width)?;
            ch.encode_utf8(slot);
            Some(width)
        }
        Encoding::Ucs2 | Encoding::Utf16 | Encoding::Utf16Le => {
            let mut units = [0u16; 2];
            let units = ch.encode_utf16(&mut units);
            let width = units.len() * 2;
            let slot = dst.get_mut(..width)?;
            for (unit, out) in units.iter().zip(slot.chunks_exact_mut(2)) {
                let bytes = if enc == Encoding::Utf16Le {
                    unit.to_le_bytes()
                } else {
                    unit.to_be_bytes()
                };
                out.copy_from_slice(&bytes);
            }
            Some(width)
        }
        Encoding::Utf32 => {
            let slot = dst.get_mut(..4)?;
            slot.copy_from_slice(&(ch as u32).to_be_bytes());
            Some(4)
        }
    }
}

/// Converts `src` from one encoding to another into `dst`.
pub fn recode(src: &[u8], from: Encoding, to: Encoding, dst: &mut [u8]) -> RecodeStatus {
    let mut read = 0;
    let mut written = 0;
    while read < src.len() {
        let Some((ch, width)) = decode_char(from, &src[read..]) else {
            return RecodeStatus::BadSource(read);
        };
        match encode_char(to, ch, &mut dst[written..]) {
            Some(n) => written += n,
            None => return RecodeStatus::DestinationTooSmall,
        }
        read += width;
    }
    RecodeStatus::Complete(written)
}

/// Converter for variable-width charsets, built on [`recode`].
pub struct MultiByteConverter {
    name: &'static str,
    encoding: Encoding,
}

impl MultiByteConverter {
    /// Creates a converter for `encoding`, reported as `name`.
    pub fn new(name: &'static str, encoding: Encoding) -> Self {
        Self { name, encoding }
    }

    /// Borrows scratch sized by `estimate`, and on overflow retries once with
    /// the worst case for the input.
    fn convert(
        &self,
        src: &[u8],
        from: Encoding,
        to: Encoding,
        estimate: usize,
        worst_case: usize,
        pool: &Arc<TieredBufferPool>,
    ) -> Result<Encoded> {
        let (from_name, to_name) = if from == Encoding::Utf8 {
            (HOST_NAME, self.name)
        } else {
            (self.name, HOST_NAME)
        };
        let mut size = estimate;
        loop {
            let mut scratch = PooledBuffer::borrow(pool, size);
            match recode(src, from, to, scratch.as_mut_slice()) {
                RecodeStatus::Complete(len) => return Ok(Encoded::new(scratch, len)),
                RecodeStatus::DestinationTooSmall if size < worst_case => {
                    trace!(charset = self.name, size, worst_case, "charset.recode_retry");
                    scratch.release()?;
                    size = worst_case;
                }
                RecodeStatus::DestinationTooSmall => {
                    tracing::error!(charset = self.name, size, "charset.recode_overflow");
                    return Err(RowpackError::Recode {
                        from: from_name,
                        to: to_name,
                        reason: format!("destination of {size} bytes too small"),
                    });
                }
                RecodeStatus::BadSource(offset) => {
                    tracing::error!(charset = self.name, offset, "charset.bad_source");
                    return Err(RowpackError::Recode {
                        from: from_name,
                        to: to_name,
                        reason: format!("undecodable input at byte {offset}"),
                    });
                }
            }
        }
    }
}

impl CharsetConverter for MultiByteConverter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn space(&self) -> &'static [u8] {
        self.encoding.space()
    }

    fn max_bytes_per_char(&self) -> usize {
        self.encoding.max_char_len()
    }

    fn encode(&self, text: &str, pool: &Arc<TieredBufferPool>) -> Result<Encoded> {
        let worst_case = text.chars().count() * self.encoding.max_char_len();
        self.convert(
            text.as_bytes(),
            Encoding::Utf8,
            self.encoding,
            text.len(),
            worst_case,
            pool,
        )
    }

    fn decode(&self, bytes: &[u8], pool: &Arc<TieredBufferPool>) -> Result<String> {
        let worst_case = bytes.len() * MAX_UTF8_LEN;
        let decoded = self.convert(
            bytes,
            self.encoding,
            Encoding::Utf8,
            bytes.len(),
            worst_case,
            pool,
        )?;
        let text = String::from_utf8_lossy(decoded.as_bytes()).into_owned();
        decoded.release()?;
        Ok(text)
    }
}
