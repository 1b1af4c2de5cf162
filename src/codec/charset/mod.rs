//! Charset conversion between host strings and column byte encodings.
//!
//! Converters are resolved per collation id and cached. Collations of the
//! same charset share one converter instance.

mod multi_byte;
mod single_byte;

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, error};

use crate::pool::{PooledBuffer, TieredBufferPool};
use crate::schema::ColumnDescriptor;
use crate::types::{CollationId, Result, RowpackError};

pub use multi_byte::{recode, Encoding, MultiByteConverter, RecodeStatus};
pub use single_byte::SingleByteConverter;

/// Encodes host strings into a charset and back.
pub trait CharsetConverter: Send + Sync {
    /// Charset name, e.g. `latin1`.
    fn name(&self) -> &'static str;
    /// Encoded space character used to pad fixed-width columns.
    fn space(&self) -> &'static [u8];
    /// Upper bound on encoded bytes per character.
    fn max_bytes_per_char(&self) -> usize;
    /// Encodes `text` into pooled scratch memory.
    fn encode(&self, text: &str, pool: &Arc<TieredBufferPool>) -> Result<Encoded>;
    /// Decodes `bytes` into a host string.
    fn decode(&self, bytes: &[u8], pool: &Arc<TieredBufferPool>) -> Result<String>;
}

/// Encoded bytes living in a pooled scratch buffer.
#[derive(Debug)]
pub struct Encoded {
    buf: PooledBuffer,
    len: usize,
}

impl Encoded {
    pub(crate) fn new(buf: PooledBuffer, len: usize) -> Self {
        debug_assert!(len <= buf.len());
        Self { buf, len }
    }

    /// The encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.as_slice()[..self.len]
    }

    /// Number of encoded bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing was encoded.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the scratch buffer to its pool.
    pub fn release(self) -> Result<()> {
        self.buf.release()
    }
}

/// Charset name of a MySQL collation id.
pub fn charset_of(collation: CollationId) -> Option<&'static str> {
    let name = match collation.0 {
        5 | 8 | 15 | 31 | 47 | 48 | 49 | 94 => "latin1",
        11 | 65 => "ascii",
        63 => "binary",
        33 | 83 | 192 => "utf8mb3",
        45 | 46 | 224 | 255 => "utf8mb4",
        35 | 90 => "ucs2",
        54 | 55 => "utf16",
        56 | 62 => "utf16le",
        60 | 61 => "utf32",
        _ => return None,
    };
    Some(name)
}

fn build_converter(charset: &'static str) -> Arc<dyn CharsetConverter> {
    match charset {
        "latin1" => Arc::new(SingleByteConverter::latin1()),
        "ascii" => Arc::new(SingleByteConverter::ascii()),
        "binary" => Arc::new(SingleByteConverter::binary()),
        "utf8mb3" => Arc::new(MultiByteConverter::new(charset, Encoding::Utf8mb3)),
        "ucs2" => Arc::new(MultiByteConverter::new(charset, Encoding::Ucs2)),
        "utf16" => Arc::new(MultiByteConverter::new(charset, Encoding::Utf16)),
        "utf16le" => Arc::new(MultiByteConverter::new(charset, Encoding::Utf16Le)),
        "utf32" => Arc::new(MultiByteConverter::new(charset, Encoding::Utf32)),
        _ => Arc::new(MultiByteConverter::new(charset, Encoding::Utf8mb4)),
    }
}

/// Collation-to-converter cache.
pub struct CharsetRegistry {
    pool: Arc<TieredBufferPool>,
    default_collation: CollationId,
    by_collation: RwLock<FxHashMap<CollationId, Arc<dyn CharsetConverter>>>,
    by_charset: RwLock<FxHashMap<&'static str, Arc<dyn CharsetConverter>>>,
}

impl CharsetRegistry {
    /// Creates an empty registry whose converters borrow scratch from `pool`.
    pub fn new(pool: Arc<TieredBufferPool>, default_collation: CollationId) -> Self {
        Self {
            pool,
            default_collation,
            by_collation: RwLock::new(FxHashMap::default()),
            by_charset: RwLock::new(FxHashMap::default()),
        }
    }

    /// Scratch pool shared by every converter.
    pub fn pool(&self) -> &Arc<TieredBufferPool> {
        &self.pool
    }

    /// Collation used for columns that do not declare one.
    pub fn default_collation(&self) -> CollationId {
        self.default_collation
    }

    /// Resolves the converter for `collation`.
    pub fn converter(&self, collation: CollationId) -> Result<Arc<dyn CharsetConverter>> {
        if let Some(conv) = self.by_collation.read().get(&collation) {
            return Ok(Arc::clone(conv));
        }
        let Some(charset) = charset_of(collation) else {
            error!(collation = collation.0, "charset.unknown_collation");
            return Err(RowpackError::UnknownCollation(collation));
        };
        let conv = {
            let mut peers = self.by_charset.write();
            Arc::clone(peers.entry(charset).or_insert_with(|| {
                debug!(charset, collation = collation.0, "charset.converter_built");
                build_converter(charset)
            }))
        };
        self.by_collation
            .write()
            .entry(collation)
            .or_insert_with(|| Arc::clone(&conv));
        Ok(conv)
    }

    /// Converter for a character column, falling back to the default collation.
    pub fn for_column(&self, column: &ColumnDescriptor) -> Result<Arc<dyn CharsetConverter>> {
        self.converter(column.collation().unwrap_or(self.default_collation))
    }

    /// Number of collations resolved so far.
    pub fn cached_collations(&self) -> usize {
        self.by_collation.read().len()
    }

    /// Number of distinct converters built so far.
    pub fn cached_charsets(&self) -> usize {
        self.by_charset.read().len()
    }
}

impl std::fmt::Debug for CharsetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharsetRegistry")
            .field("default_collation", &self.default_collation)
            .field("collations", &self.cached_collations())
            .field("charsets", &self.cached_charsets())
            .finish()
    }
}
