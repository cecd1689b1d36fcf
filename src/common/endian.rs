//! Bulk endian swapping over 4-byte-aligned regions.
//!
//! The DATAFILE format is little-endian on disk. Every field this crate
//! decodes itself — the header, the metadata tables, item fields, MAP
//! item fields — goes through [`byteorder`]'s `LE` adapter, which already
//! normalizes the value regardless of host endianness, so none of that
//! needs manual swapping.
//!
//! [`swap_in_place`] exists for the one case that bypasses per-field
//! decoding: [`DataFile::get_data_swapped`](crate::codec::DataFile::get_data_swapped)
//! and [`Writer::add_data_swapped`](crate::codec::Writer::add_data_swapped)
//! hand a caller (or accept from one) a blob's raw bytes reinterpreted
//! directly as host-endian integers, for code that casts a buffer instead
//! of decoding it field by field. On little-endian hosts this is a no-op
//! and the optimizer is expected to remove it entirely.

/// Reverses the bytes of each 4-byte element of `buf` in place.
///
/// `buf.len()` need not be a multiple of 4; any trailing partial element is
/// left untouched, matching the reference implementation's `swap_endian`,
/// which operates in units of `sizeof(int)`.
///
/// On little-endian hosts this function is a no-op; it exists so call
/// sites can be endian-agnostic instead of guarding every call with
/// `cfg(target_endian = "big")`.
pub fn swap_in_place(buf: &mut [u8]) {
    #[cfg(target_endian = "big")]
    {
        for chunk in buf.chunks_exact_mut(4) {
            chunk.swap(0, 3);
            chunk.swap(1, 2);
        }
    }
    #[cfg(target_endian = "little")]
    {
        let _ = buf;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_in_place_leaves_little_endian_hosts_untouched() {
        let mut buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_in_place(&mut buf);
        #[cfg(target_endian = "little")]
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);
        #[cfg(target_endian = "big")]
        assert_eq!(buf, [4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn swap_in_place_ignores_trailing_partial_element() {
        let mut buf = [1u8, 2, 3, 4, 5, 6];
        swap_in_place(&mut buf);
        #[cfg(target_endian = "little")]
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
        #[cfg(target_endian = "big")]
        assert_eq!(buf, [4, 3, 2, 1, 5, 6]);
    }
}
