#![forbid(unsafe_code)]
//! Identifiers and the error taxonomy shared by every rowpack module.

use std::fmt;

/// Ordinal identifier of a column within its table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ColumnId(pub u32);

/// MySQL collation identifier (e.g. 8 = `latin1_swedish_ci`).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct CollationId(pub u32);

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CollationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ColumnId {
    fn from(value: u32) -> Self {
        ColumnId(value)
    }
}

impl From<ColumnId> for u32 {
    fn from(value: ColumnId) -> Self {
        value.0
    }
}

impl From<u32> for CollationId {
    fn from(value: u32) -> Self {
        CollationId(value)
    }
}

/// Broad classification of a [`RowpackError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Schema and codec disagree, or a caller broke the buffer discipline.
    /// Never retried.
    Fatal,
    /// The supplied value does not fit the column; the caller may correct it.
    UserInput,
    /// A temporal value carries sub-second digits the column cannot store.
    Truncation,
    /// Options could not be read or are invalid.
    Config,
}

/// Errors raised by layout construction, the value codec and the buffer pools.
#[derive(thiserror::Error, Debug)]
pub enum RowpackError {
    /// I/O failure while loading options.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    /// Options could not be parsed or failed validation.
    #[error("config: {0}")]
    Config(String),

    /// A numeric type code from schema metadata has no codec.
    #[error("unknown column type code {code} for column `{column}`")]
    UnknownColumnType {
        /// Column name.
        column: String,
        /// Raw dictionary type code.
        code: u8,
    },
    /// Column metadata is self-inconsistent (bad precision, length, ...).
    #[error("invalid column `{column}`: {reason}")]
    InvalidColumn {
        /// Column name.
        column: String,
        /// Description of the inconsistency.
        reason: String,
    },
    /// A column id was used with a layout that does not contain it.
    #[error("column {id} is not part of this layout")]
    ColumnNotInLayout {
        /// Offending column id.
        id: ColumnId,
    },
    /// A bound skipped or repeated a key column on one side of a range.
    #[error("bound on column {id} at key position {position}, expected position {expected}")]
    BoundOutOfOrder {
        /// Column the bound was applied to.
        id: ColumnId,
        /// Key position of that column.
        position: usize,
        /// Next key position on the written side.
        expected: usize,
    },
    /// A layout was requested for an index the table does not declare.
    #[error("table `{table}` has no index `{index}`")]
    UnknownIndex {
        /// Table name.
        table: String,
        /// Requested index name.
        index: String,
    },
    /// A value of the wrong variant was supplied for a column.
    #[error("column `{column}` of type {column_type} cannot hold a {value_type} value")]
    TypeMismatch {
        /// Column name.
        column: String,
        /// Column type name.
        column_type: &'static str,
        /// Value variant name.
        value_type: &'static str,
    },
    /// The operation is not available for this column type.
    #[error("unsupported for column `{column}`: {reason}")]
    Unsupported {
        /// Column name.
        column: String,
        /// Why the operation is unavailable.
        reason: &'static str,
    },
    /// No charset is registered for a collation id.
    #[error("unknown collation id {0}")]
    UnknownCollation(CollationId),
    /// The charset converter could not transcode a value.
    #[error("recode {from} -> {to} failed: {reason}")]
    Recode {
        /// Source charset name.
        from: &'static str,
        /// Destination charset name.
        to: &'static str,
        /// Failure detail.
        reason: String,
    },
    /// A buffer was returned to a pool tier of a different size.
    #[error("buffer of capacity {actual} returned to pool of size {expected}")]
    BufferSizeMismatch {
        /// Capacity the pool hands out.
        expected: usize,
        /// Capacity of the returned buffer.
        actual: usize,
    },
    /// Guard bytes past the usable region were overwritten.
    #[error("guard bytes corrupted at offset {offset} of buffer with capacity {capacity}")]
    GuardCorrupted {
        /// Usable capacity of the buffer.
        capacity: usize,
        /// First corrupted byte, relative to the start of the buffer.
        offset: usize,
    },
    /// Stored bytes cannot be decoded as the column's type.
    #[error("corruption in column `{column}`: {reason}")]
    Corruption {
        /// Column name.
        column: String,
        /// Description of the bad encoding.
        reason: String,
    },

    /// Numeric value outside the column's representable range.
    #[error("value {value} out of range for column `{column}` (allowed {min}..={max})")]
    ValueOutOfRange {
        /// Column name.
        column: String,
        /// Offending value, rendered as text.
        value: String,
        /// Smallest allowed value.
        min: String,
        /// Largest allowed value.
        max: String,
    },
    /// Encoded string or byte value exceeds the column capacity.
    #[error("value of {length} bytes too long for column `{column}` (max {max})")]
    ValueTooLong {
        /// Column name.
        column: String,
        /// Encoded length of the offending value.
        length: usize,
        /// Column capacity in bytes.
        max: usize,
    },
    /// Length-prefix width other than 0, 1 or 2.
    #[error("invalid length prefix width {width} for column `{column}` (allowed 0..=2)")]
    InvalidPrefixWidth {
        /// Column name.
        column: String,
        /// Requested width.
        width: usize,
    },
    /// Null written to a non-nullable column.
    #[error("column `{column}` is not nullable")]
    NullNotAllowed {
        /// Column name.
        column: String,
    },
    /// Malformed value text (e.g. a decimal literal).
    #[error("invalid value `{value}` for column `{column}`: {reason}")]
    InvalidValue {
        /// Column name.
        column: String,
        /// Offending input.
        value: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Temporal value has sub-second digits beyond the column precision.
    #[error("value {value} for column `{column}` needs more than {precision} fractional digits")]
    PrecisionLoss {
        /// Column name.
        column: String,
        /// Fractional-second precision of the column.
        precision: u8,
        /// Offending value, rendered as text.
        value: String,
    },
}

impl RowpackError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RowpackError::Io(_) | RowpackError::Config(_) => ErrorKind::Config,
            RowpackError::UnknownColumnType { .. }
            | RowpackError::InvalidColumn { .. }
            | RowpackError::ColumnNotInLayout { .. }
            | RowpackError::UnknownIndex { .. }
            | RowpackError::BoundOutOfOrder { .. }
            | RowpackError::TypeMismatch { .. }
            | RowpackError::Unsupported { .. }
            | RowpackError::UnknownCollation(_)
            | RowpackError::Recode { .. }
            | RowpackError::BufferSizeMismatch { .. }
            | RowpackError::GuardCorrupted { .. }
            | RowpackError::Corruption { .. } => ErrorKind::Fatal,
            RowpackError::ValueOutOfRange { .. }
            | RowpackError::ValueTooLong { .. }
            | RowpackError::InvalidPrefixWidth { .. }
            | RowpackError::NullNotAllowed { .. }
            | RowpackError::InvalidValue { .. } => ErrorKind::UserInput,
            RowpackError::PrecisionLoss { .. } => ErrorKind::Truncation,
        }
    }

    /// Whether the error signals a defect rather than bad input.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RowpackError>;
