use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::pool::{PooledBuffer, TieredBufferPool};
use crate::types::Result;

use super::{CharsetConverter, Encoded};

const REPLACEMENT: u8 = b'?';

/// MySQL's latin1 is cp1252 with the five undefined positions passed through.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{0081}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{008D}', '\u{017D}', '\u{008F}',
    '\u{0090}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{009D}', '\u{017E}', '\u{0178}',
];

/// Table-driven converter for charsets with one byte per character.
///
/// Characters absent from the table encode as `?`.
pub struct SingleByteConverter {
    name: &'static str,
    decode: [char; 256],
    encode: FxHashMap<char, u8>,
}

impl SingleByteConverter {
    /// Builds a converter from its 256-entry decode table. Entries equal to
    /// U+FFFD do not round-trip and are left out of the encode map.
    pub fn from_table(name: &'static str, decode: [char; 256]) -> Self {
        let mut encode = FxHashMap::default();
        for (byte, ch) in decode.iter().enumerate() {
            if *ch != char::REPLACEMENT_CHARACTER {
                encode.entry(*ch).or_insert(byte as u8);
            }
        }
        Self {
            name,
            decode,
            encode,
        }
    }

    /// `latin1`.
    pub fn latin1() -> Self {
        let mut table = identity_table();
        table[0x80..0xA0].copy_from_slice(&CP1252_HIGH);
        Self::from_table("latin1", table)
    }

    /// `ascii`: bytes above 0x7F decode to U+FFFD.
    pub fn ascii() -> Self {
        let mut table = identity_table();
        for slot in &mut table[0x80..] {
            *slot = char::REPLACEMENT_CHARACTER;
        }
        Self::from_table("ascii", table)
    }

    /// `binary`: bytes map to U+0000..=U+00FF.
    pub fn binary() -> Self {
        Self::from_table("binary", identity_table())
    }
}

fn identity_table() -> [char; 256] {
    let mut table = ['\0'; 256];
    for (byte, slot) in table.iter_mut().enumerate() {
        *slot = char::from(byte as u8);
    }
    table
}

impl CharsetConverter for SingleByteConverter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn space(&self) -> &'static [u8] {
        b" "
    }

    fn max_bytes_per_char(&self) -> usize {
        1
    }

    fn encode(&self, text: &str, pool: &Arc<TieredBufferPool>) -> Result<Encoded> {
        let mut buf = PooledBuffer::borrow(pool, text.len());
        let dst = buf.as_mut_slice();
        let mut len = 0;
        for ch in text.chars() {
            dst[len] = self.encode.get(&ch).copied().unwrap_or(REPLACEMENT);
            len += 1;
        }
        Ok(Encoded::new(buf, len))
    }

    fn decode(&self, bytes: &[u8], _pool: &Arc<TieredBufferPool>) -> Result<String> {
        Ok(bytes.iter().map(|b| self.decode[*b as usize]).collect())
    }
}
