//! Whole-file integrity hashing.
//!
//! A DATAFILE is hashed in a single streaming pass at open time: CRC-32
//! (the zlib/IEEE 802.3 polynomial, via [`crc32fast`]) and SHA-256 (via
//! [`sha2`]) are both accumulated over every byte of the file, header
//! included. Neither hash is stored inside the container; callers compare
//! against a value carried out-of-band (a map list, a server's expected
//! checksum).

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::Result;

/// Sentinel returned by [`crate::codec::DataFile::crc32`] when no file is open.
pub const NO_CRC32: u32 = 0xFFFF_FFFF;

/// Sentinel returned by [`crate::codec::DataFile::sha256`] when no file is open.
pub const NO_SHA256: [u8; 32] = [0u8; 32];

/// Size of the read buffer used while streaming a file through both
/// hashers.
const CHUNK_SIZE: usize = 64 * 1024;

/// CRC-32 and SHA-256 digests of a byte stream, computed together in one
/// pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Digests {
    /// CRC-32 (zlib/IEEE 802.3 polynomial) of the stream.
    pub crc32: u32,
    /// SHA-256 (FIPS 180-4) digest of the stream.
    pub sha256: [u8; 32],
}

/// Hashes every byte produced by `reader`.
///
/// # Errors
/// - If reading from `reader` fails: [`crate::Error::Io`]
pub fn hash_reader<R: Read>(mut reader: R) -> Result<Digests> {
    let mut crc = crc32fast::Hasher::new();
    let mut sha = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        crc.update(&buf[..read]);
        sha.update(&buf[..read]);
    }

    Ok(Digests {
        crc32: crc.finalize(),
        sha256: sha.finalize().into(),
    })
}

/// Hashes the file at `path` and compares its SHA-256 digest against
/// `expected`.
///
/// This does not require a [`crate::codec::DataFile`] to be open; it is a
/// standalone convenience for callers that only need to verify a file's
/// integrity before deciding whether to load it at all.
///
/// # Errors
/// - If `path` cannot be opened or read: [`crate::Error::Io`]
pub fn verify_sha256(path: impl AsRef<Path>, expected: &[u8; 32]) -> Result<bool> {
    let file = File::open(path)?;
    let digests = hash_reader(BufReader::new(file))?;
    Ok(&digests.sha256 == expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_stream_matches_known_digests() {
        let digests = hash_reader(Cursor::new(&[])).unwrap();
        assert_eq!(digests.crc32, 0);
        assert_eq!(
            digests.sha256,
            [
                0xe3, 0xb0, 0xc4, 0x42, 0x98, 0xfc, 0x1c, 0x14, 0x9a, 0xfb, 0xf4, 0xc8, 0x99, 0x6f,
                0xb9, 0x24, 0x27, 0xae, 0x41, 0xe4, 0x64, 0x9b, 0x93, 0x4c, 0xa4, 0x95, 0x99, 0x1b,
                0x78, 0x52, 0xb8, 0x55,
            ]
        );
    }

    #[test]
    fn same_bytes_hash_identically_across_calls() {
        let data = b"datafile-rs".repeat(1000);
        let a = hash_reader(Cursor::new(&data)).unwrap();
        let b = hash_reader(Cursor::new(&data)).unwrap();
        assert_eq!(a, b);
    }
}
