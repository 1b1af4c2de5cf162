#![forbid(unsafe_code)]

//! Column descriptors as supplied by the dictionary layer.

mod column;
mod table;

pub use column::{Alignment, ColumnBuilder, ColumnDescriptor, ColumnType};
pub use table::{IndexDef, TableDef};
