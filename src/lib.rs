//! Rowpack encodes typed column values into fixed-layout binary rows.
//!
//! A [`layout::RowLayout`] places a null bitmap and every column at a fixed,
//! aligned offset. The [`codec`] module packs each column type into its exact
//! on-row representation. Rows, key bounds and charset scratch space come from
//! a [`pool::TieredBufferPool`], and [`CodecContext`] ties the pieces together:
//!
//! ```no_run
//! use rowpack::{CodecContext, ColumnDescriptor, ColumnId, ColumnType, RowpackOptions, TableDef};
//!
//! # fn main() -> rowpack::Result<()> {
//! let ctx = CodecContext::new(RowpackOptions::default())?;
//! let table = TableDef::new(
//!     "users",
//!     vec![
//!         ColumnDescriptor::builder(0, "id", ColumnType::Bigunsigned).build()?,
//!         ColumnDescriptor::builder(1, "name", ColumnType::Varchar).length(32).build()?,
//!     ],
//! )?;
//! let layout = ctx.table_layout(&table)?;
//! let mut row = ctx.new_row(&layout);
//! row.set_u64(ColumnId(0), 1)?;
//! row.set_str(ColumnId(1), "ada".into())?;
//! row.release()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bound;
pub mod codec;
mod context;
pub mod layout;
pub mod options;
pub mod pool;
pub mod primitives;
pub mod schema;
pub mod types;

pub use bound::{BoundType, IndexBound, IndexBoundBuilder, IndexBounds};
pub use codec::{CharsetRegistry, Value};
pub use context::CodecContext;
pub use layout::{build_layout, LayoutCache, RowBuffer, RowLayout};
pub use options::{CodecOptions, PoolOptions, RowpackOptions};
pub use pool::{PooledBuffer, TieredBufferPool};
pub use schema::{ColumnDescriptor, ColumnType, IndexDef, TableDef};
pub use types::{CollationId, ColumnId, ErrorKind, Result, RowpackError};
