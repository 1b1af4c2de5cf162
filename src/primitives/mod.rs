//! Low-level primitives for the row codec.

/// Byte-level utilities.
///
/// Fixed-width native and big-endian integer encoders plus alignment helpers.
pub mod bytes;
