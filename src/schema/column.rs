use std::fmt;

use crate::codec::{decimal, temporal2};
use crate::primitives::bytes::align;
use crate::types::{CollationId, ColumnId, Result, RowpackError};

/// Logical column types, numbered as in the storage engine's dictionary.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ColumnType {
    /// 8-bit signed integer.
    Tinyint = 1,
    /// 8-bit unsigned integer.
    Tinyunsigned = 2,
    /// 16-bit signed integer.
    Smallint = 3,
    /// 16-bit unsigned integer.
    Smallunsigned = 4,
    /// 24-bit signed integer.
    Mediumint = 5,
    /// 24-bit unsigned integer.
    Mediumunsigned = 6,
    /// 32-bit signed integer.
    Int = 7,
    /// 32-bit unsigned integer.
    Unsigned = 8,
    /// 64-bit signed integer.
    Bigint = 9,
    /// 64-bit unsigned integer.
    Bigunsigned = 10,
    /// IEEE single precision.
    Float = 11,
    /// IEEE double precision.
    Double = 12,
    /// Pre-5.0 signed decimal.
    Olddecimal = 13,
    /// Fixed-length character string.
    Char = 14,
    /// Variable-length character string, 1-byte length prefix.
    Varchar = 15,
    /// Fixed-length byte string.
    Binary = 16,
    /// Variable-length byte string, 1-byte length prefix.
    Varbinary = 17,
    /// v1 datetime (packed base-100 calendar fields).
    Datetime = 18,
    /// Date (3 bytes).
    Date = 19,
    /// Binary large object, stored out of line.
    Blob = 20,
    /// Character large object, stored out of line.
    Text = 21,
    /// Bit field.
    Bit = 22,
    /// Variable-length character string, 2-byte length prefix.
    Longvarchar = 23,
    /// Variable-length byte string, 2-byte length prefix.
    Longvarbinary = 24,
    /// v1 time of day.
    Time = 25,
    /// Year (1 byte, offset from 1900).
    Year = 26,
    /// v1 timestamp (Unix seconds).
    Timestamp = 27,
    /// Pre-5.0 unsigned decimal.
    Olddecimalunsigned = 28,
    /// Packed binary decimal.
    Decimal = 29,
    /// Packed binary decimal, non-negative.
    Decimalunsigned = 30,
    /// v2 time with fractional seconds.
    Time2 = 31,
    /// v2 datetime with fractional seconds.
    Datetime2 = 32,
    /// v2 timestamp with fractional seconds.
    Timestamp2 = 33,
}

/// Alignment bucket a column is placed in.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Alignment {
    /// Placed first.
    Eight,
    /// Placed after the 8-byte bucket.
    Four,
    /// Placed after the 4-byte bucket.
    Two,
    /// Placed last.
    One,
}

impl Alignment {
    /// Placement order of the buckets.
    pub const ORDER: [Alignment; 4] = [
        Alignment::Eight,
        Alignment::Four,
        Alignment::Two,
        Alignment::One,
    ];
}

impl ColumnType {
    /// Maps a dictionary type code to a column type.
    pub fn from_code(code: u8, column: &str) -> Result<Self> {
        use ColumnType::*;
        let ty = match code {
            1 => Tinyint,
            2 => Tinyunsigned,
            3 => Smallint,
            4 => Smallunsigned,
            5 => Mediumint,
            6 => Mediumunsigned,
            7 => Int,
            8 => Unsigned,
            9 => Bigint,
            10 => Bigunsigned,
            11 => Float,
            12 => Double,
            13 => Olddecimal,
            14 => Char,
            15 => Varchar,
            16 => Binary,
            17 => Varbinary,
            18 => Datetime,
            19 => Date,
            20 => Blob,
            21 => Text,
            22 => Bit,
            23 => Longvarchar,
            24 => Longvarbinary,
            25 => Time,
            26 => Year,
            27 => Timestamp,
            28 => Olddecimalunsigned,
            29 => Decimal,
            30 => Decimalunsigned,
            31 => Time2,
            32 => Datetime2,
            33 => Timestamp2,
            other => {
                tracing::error!(column, code = other, "schema.unknown_column_type");
                return Err(RowpackError::UnknownColumnType {
                    column: column.to_string(),
                    code: other,
                });
            }
        };
        Ok(ty)
    }

    /// Dictionary type code.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Display name used in error messages.
    pub const fn name(self) -> &'static str {
        use ColumnType::*;
        match self {
            Tinyint => "tinyint",
            Tinyunsigned => "tinyint unsigned",
            Smallint => "smallint",
            Smallunsigned => "smallint unsigned",
            Mediumint => "mediumint",
            Mediumunsigned => "mediumint unsigned",
            Int => "int",
            Unsigned => "int unsigned",
            Bigint => "bigint",
            Bigunsigned => "bigint unsigned",
            Float => "float",
            Double => "double",
            Olddecimal => "olddecimal",
            Olddecimalunsigned => "olddecimal unsigned",
            Decimal => "decimal",
            Decimalunsigned => "decimal unsigned",
            Char => "char",
            Varchar => "varchar",
            Longvarchar => "longvarchar",
            Binary => "binary",
            Varbinary => "varbinary",
            Longvarbinary => "longvarbinary",
            Datetime => "datetime",
            Date => "date",
            Time => "time",
            Timestamp => "timestamp",
            Year => "year",
            Blob => "blob",
            Text => "text",
            Bit => "bit",
            Time2 => "time2",
            Datetime2 => "datetime2",
            Timestamp2 => "timestamp2",
        }
    }

    /// Bucket used by the layout builder.
    pub const fn alignment(self) -> Alignment {
        use ColumnType::*;
        match self {
            Bigint | Bigunsigned | Double | Blob | Text | Bit | Date | Datetime | Time
            | Timestamp | Time2 | Datetime2 | Timestamp2 => Alignment::Eight,
            Int | Unsigned | Float | Mediumint | Mediumunsigned => Alignment::Four,
            Smallint | Smallunsigned | Year => Alignment::Two,
            Tinyint | Tinyunsigned | Char | Binary | Varchar | Varbinary | Longvarchar
            | Longvarbinary | Decimal | Decimalunsigned | Olddecimal | Olddecimalunsigned => {
                Alignment::One
            }
        }
    }

    /// Whether values are text subject to charset conversion.
    pub const fn is_character(self) -> bool {
        matches!(
            self,
            ColumnType::Char | ColumnType::Varchar | ColumnType::Longvarchar
        )
    }

    /// Whether values are raw bytes.
    pub const fn is_binary(self) -> bool {
        matches!(
            self,
            ColumnType::Binary | ColumnType::Varbinary | ColumnType::Longvarbinary
        )
    }

    /// Whether the type is a packed decimal.
    pub const fn is_decimal(self) -> bool {
        matches!(
            self,
            ColumnType::Decimal
                | ColumnType::Decimalunsigned
                | ColumnType::Olddecimal
                | ColumnType::Olddecimalunsigned
        )
    }

    /// Whether the payload lives outside the row.
    pub const fn is_out_of_line(self) -> bool {
        matches!(self, ColumnType::Blob | ColumnType::Text)
    }

    /// Whether the type carries a fractional-second precision.
    pub const fn is_temporal_v2(self) -> bool {
        matches!(
            self,
            ColumnType::Time2 | ColumnType::Datetime2 | ColumnType::Timestamp2
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable metadata for one column, with its derived storage footprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDescriptor {
    id: ColumnId,
    name: String,
    column_type: ColumnType,
    nullable: bool,
    length: usize,
    precision: u8,
    scale: u8,
    collation: Option<CollationId>,
    prefix_len: usize,
    footprint: usize,
}

impl ColumnDescriptor {
    /// Starts describing a column.
    pub fn builder(id: u32, name: impl Into<String>, ty: ColumnType) -> ColumnBuilder {
        ColumnBuilder {
            id: ColumnId(id),
            name: name.into(),
            column_type: ty,
            nullable: false,
            length: 0,
            precision: 0,
            scale: 0,
            collation: None,
        }
    }

    /// Column id.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical type.
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Whether the column has a null bit.
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Declared length: bytes for string types, bits for `Bit`.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Decimal precision, or fractional-second precision for v2 temporals.
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Decimal scale.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Declared collation, if any.
    pub fn collation(&self) -> Option<CollationId> {
        self.collation
    }

    /// Width of the length prefix: 0 for fixed types, 1 or 2 for variable ones.
    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Bytes occupied in the row buffer, including any length prefix.
    pub fn footprint(&self) -> usize {
        self.footprint
    }
}

/// Builder for [`ColumnDescriptor`]; `build` validates and derives the footprint.
#[derive(Clone, Debug)]
pub struct ColumnBuilder {
    id: ColumnId,
    name: String,
    column_type: ColumnType,
    nullable: bool,
    length: usize,
    precision: u8,
    scale: u8,
    collation: Option<CollationId>,
}

impl ColumnBuilder {
    /// Starts from a raw dictionary type code.
    pub fn from_code(id: u32, name: impl Into<String>, code: u8) -> Result<Self> {
        let name = name.into();
        let ty = ColumnType::from_code(code, &name)?;
        Ok(ColumnDescriptor::builder(id, name, ty))
    }

    /// Marks the column nullable.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Sets the declared length (bytes, or bits for `Bit`).
    pub fn length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Sets decimal precision and scale.
    pub fn decimal(mut self, precision: u8, scale: u8) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    /// Sets the fractional-second precision of a v2 temporal column.
    pub fn fsp(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    /// Sets the collation of a character column.
    pub fn collation(mut self, id: u32) -> Self {
        self.collation = Some(CollationId(id));
        self
    }

    fn invalid(&self, reason: String) -> RowpackError {
        RowpackError::InvalidColumn {
            column: self.name.clone(),
            reason,
        }
    }

    /// Validates the metadata and derives the storage footprint.
    pub fn build(self) -> Result<ColumnDescriptor> {
        use ColumnType::*;
        let mut prefix_len = 0;
        let footprint = match self.column_type {
            Tinyint | Tinyunsigned | Year => 1,
            Smallint | Smallunsigned => 2,
            Mediumint | Mediumunsigned | Date | Time => 3,
            Int | Unsigned | Float | Timestamp => 4,
            Bigint | Bigunsigned | Double | Datetime => 8,
            Blob | Text => 8,
            Bit => {
                if self.length == 0 || self.length > 64 {
                    return Err(self.invalid(format!(
                        "bit length {} outside 1..=64",
                        self.length
                    )));
                }
                self.length.div_ceil(32) * 4
            }
            Char | Binary => {
                if self.length == 0 {
                    return Err(self.invalid("fixed-length column needs a length".into()));
                }
                self.length
            }
            Varchar | Varbinary | Longvarchar | Longvarbinary => {
                if self.length > u16::MAX as usize {
                    return Err(self.invalid(format!(
                        "length {} exceeds {}",
                        self.length,
                        u16::MAX
                    )));
                }
                let long = matches!(self.column_type, Longvarchar | Longvarbinary);
                prefix_len = if !long && self.length <= 255 { 1 } else { 2 };
                align::up4(self.length + prefix_len)
            }
            Decimal | Decimalunsigned | Olddecimal | Olddecimalunsigned => {
                if self.precision == 0 || self.precision > decimal::MAX_PRECISION {
                    return Err(self.invalid(format!(
                        "precision {} outside 1..={}",
                        self.precision,
                        decimal::MAX_PRECISION
                    )));
                }
                if self.scale > decimal::MAX_SCALE || self.scale > self.precision {
                    return Err(self.invalid(format!(
                        "scale {} invalid for precision {}",
                        self.scale, self.precision
                    )));
                }
                decimal::packed_len(self.precision, self.scale)
            }
            Time2 | Datetime2 | Timestamp2 => {
                if self.precision > temporal2::MAX_FSP {
                    return Err(self.invalid(format!(
                        "fractional precision {} exceeds {}",
                        self.precision,
                        temporal2::MAX_FSP
                    )));
                }
                temporal2::packed_len(self.column_type, self.precision)
            }
        };
        Ok(ColumnDescriptor {
            id: self.id,
            name: self.name,
            column_type: self.column_type,
            nullable: self.nullable,
            length: self.length,
            precision: self.precision,
            scale: self.scale,
            collation: self.collation,
            prefix_len,
            footprint,
        })
    }
}
