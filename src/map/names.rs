//! Packs and unpacks the scrambled `int[]` name fields carried by several
//! MAP items (group, layer and envelope names).
//!
//! Each character is stored XOR 0x80 across 4 bytes per `i32`, most
//! significant byte first. The scramble exists purely so that a name
//! buffer full of zero bytes (the common case for an unset name) doesn't
//! read back as all-NUL and get mistaken for "absent": a genuine empty
//! slot decodes to `0x80` bytes, and a real, unset-but-zeroed field still
//! round-trips to an empty string because `0x80 XOR 0x80 == 0`.

/// XOR scramble applied to every name byte.
const SCRAMBLE: u8 = 0x80;

/// Packs `name` into `num_ints` big-endian-packed `i32`s, truncating if
/// the name is longer than `num_ints * 4` bytes and zero-padding if it is
/// shorter.
///
/// The last byte of the last int is always forced to the scramble value
/// so that decoding it always yields an explicit NUL, even when `name`
/// exactly fills the available capacity.
#[must_use]
pub fn pack_name(name: &str, num_ints: usize) -> Vec<i32> {
    let capacity = num_ints * 4;
    let mut bytes = name.as_bytes().to_vec();
    bytes.resize(capacity, 0);

    let mut ints = Vec::with_capacity(num_ints);
    for chunk in bytes.chunks_exact(4) {
        let packed = (u32::from(chunk[0] ^ SCRAMBLE) << 24)
            | (u32::from(chunk[1] ^ SCRAMBLE) << 16)
            | (u32::from(chunk[2] ^ SCRAMBLE) << 8)
            | u32::from(chunk[3] ^ SCRAMBLE);
        ints.push(packed as i32);
    }

    if let Some(last) = ints.last_mut() {
        *last &= 0xFFFF_FF00_u32 as i32;
    }
    ints
}

/// Unpacks `ints` into a name, stopping at the first NUL byte.
///
/// Invalid UTF-8 (possible if the backing bytes were corrupted) is
/// replaced with `U+FFFD` rather than failing, matching the lenient
/// handling the rest of the MAP schema gives malformed item fields.
#[must_use]
pub fn unpack_name(ints: &[i32]) -> String {
    let mut bytes = Vec::with_capacity(ints.len() * 4);
    for &packed in ints {
        let packed = packed as u32;
        bytes.push(((packed >> 24) & 0xFF) as u8 ^ SCRAMBLE);
        bytes.push(((packed >> 16) & 0xFF) as u8 ^ SCRAMBLE);
        bytes.push(((packed >> 8) & 0xFF) as u8 ^ SCRAMBLE);
        bytes.push((packed & 0xFF) as u8 ^ SCRAMBLE);
    }

    // The last byte of the last int only carries a genuine NUL when pack_name
    // wrote one; a maximal-length name's forced-scramble last byte decodes to
    // 0x80, not 0, so truncation has to be forced rather than found.
    if let Some(last) = bytes.last_mut() {
        *last = 0;
    }
    if let Some(end) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(end);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_short_name() {
        let ints = pack_name("air", 3);
        assert_eq!(unpack_name(&ints), "air");
    }

    #[test]
    fn empty_name_round_trips_to_empty_string() {
        let ints = pack_name("", 2);
        assert_eq!(unpack_name(&ints), "");
    }

    #[test]
    fn exact_capacity_name_drops_its_last_character_for_the_forced_nul() {
        // The final byte of a maximal-length name is always overwritten
        // with the scramble constant on pack, and unpack forces it to a
        // real NUL, so the last character of a name that exactly fills
        // its capacity never round-trips.
        let ints = pack_name("abcdefgh", 2);
        assert_eq!(unpack_name(&ints), "abcdefg");
    }
}
