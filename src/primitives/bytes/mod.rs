#![forbid(unsafe_code)]
//! Fixed-width integer encoders and alignment helpers shared by the codec.

pub mod ne {
    //! Native byte order encoders used by v1 numeric and temporal columns.

    use core::convert::TryInto;

    /// Writes a u16 in native byte order.
    #[inline]
    pub fn put_u16(dst: &mut [u8], v: u16) {
        dst[..2].copy_from_slice(&v.to_ne_bytes());
    }

    /// Reads a u16 in native byte order.
    #[inline]
    pub fn get_u16(src: &[u8]) -> u16 {
        u16::from_ne_bytes(src[..2].try_into().expect("slice has exactly 2 bytes"))
    }

    /// Writes a u32 in native byte order.
    #[inline]
    pub fn put_u32(dst: &mut [u8], v: u32) {
        dst[..4].copy_from_slice(&v.to_ne_bytes());
    }

    /// Reads a u32 in native byte order.
    #[inline]
    pub fn get_u32(src: &[u8]) -> u32 {
        u32::from_ne_bytes(src[..4].try_into().expect("slice has exactly 4 bytes"))
    }

    /// Writes a u64 in native byte order.
    #[inline]
    pub fn put_u64(dst: &mut [u8], v: u64) {
        dst[..8].copy_from_slice(&v.to_ne_bytes());
    }

    /// Reads a u64 in native byte order.
    #[inline]
    pub fn get_u64(src: &[u8]) -> u64 {
        u64::from_ne_bytes(src[..8].try_into().expect("slice has exactly 8 bytes"))
    }

    /// Writes the three least-significant bytes of `v` in native order.
    ///
    /// On little-endian hosts these are bytes 0..3 of the native u32, on
    /// big-endian hosts bytes 1..4.
    #[inline]
    pub fn put_u24(dst: &mut [u8], v: u32) {
        let bytes = v.to_ne_bytes();
        if cfg!(target_endian = "little") {
            dst[..3].copy_from_slice(&bytes[..3]);
        } else {
            dst[..3].copy_from_slice(&bytes[1..]);
        }
    }

    /// Reads a zero-extended 24-bit value written by [`put_u24`].
    #[inline]
    pub fn get_u24(src: &[u8]) -> u32 {
        let mut bytes = [0u8; 4];
        if cfg!(target_endian = "little") {
            bytes[..3].copy_from_slice(&src[..3]);
        } else {
            bytes[1..].copy_from_slice(&src[..3]);
        }
        u32::from_ne_bytes(bytes)
    }

    /// Reads a sign-extended 24-bit value written by [`put_u24`].
    #[inline]
    pub fn get_i24(src: &[u8]) -> i32 {
        let raw = get_u24(src);
        ((raw << 8) as i32) >> 8
    }
}

pub mod be {
    //! Big-endian encoders of arbitrary width (1..=8 bytes).

    /// Writes the low `width` bytes of `v` most-significant byte first.
    #[inline]
    pub fn put_uint(dst: &mut [u8], v: u64, width: usize) {
        assert!(width <= 8, "big-endian width {} exceeds 8 bytes", width);
        let bytes = v.to_be_bytes();
        dst[..width].copy_from_slice(&bytes[8 - width..]);
    }

    /// Reads `width` bytes most-significant byte first, zero-extended.
    #[inline]
    pub fn get_uint(src: &[u8], width: usize) -> u64 {
        assert!(width <= 8, "big-endian width {} exceeds 8 bytes", width);
        let mut bytes = [0u8; 8];
        bytes[8 - width..].copy_from_slice(&src[..width]);
        u64::from_be_bytes(bytes)
    }
}

pub mod align {
    //! Offset rounding.

    /// Rounds `n` up to the next multiple of `to` (a power of two).
    #[inline]
    pub const fn up(n: usize, to: usize) -> usize {
        (n + to - 1) & !(to - 1)
    }

    /// Rounds `n` up to a multiple of 4.
    #[inline]
    pub const fn up4(n: usize) -> usize {
        up(n, 4)
    }

    /// Rounds `n` up to a multiple of 8.
    #[inline]
    pub const fn up8(n: usize) -> usize {
        up(n, 8)
    }
}
