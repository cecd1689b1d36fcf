//! Reads a DATAFILE container: the fixed tables are parsed eagerly at
//! open time, compressed data blobs are inflated lazily and cached on
//! first access.

use byteorder::{ReadBytesExt, LE};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use super::hash::{self, NO_CRC32, NO_SHA256};
use super::header::{Header, Version};
use crate::common::endian::swap_in_place;
use crate::common::errors::{CompressionError, DatafileError};
use crate::Result;

/// One entry of the `ItemTypes` table: the contiguous run of items
/// belonging to a single item type.
#[derive(Debug, Default, Clone, Copy)]
struct ItemTypeEntry {
    type_id: i32,
    /// Index of the first item of this type in the item payload region.
    start: i32,
    /// Number of items of this type.
    num: i32,
}

/// Size in bytes of one `ItemTypes` table entry.
const ITEM_TYPE_ENTRY_SIZE: usize = 12;

/// A single item's fixed two-word prefix: `(type << 16) | id`, followed by
/// the item's payload size in bytes.
const ITEM_HEADER_SIZE: usize = 8;

#[derive(Default, Debug)]
/// An open DATAFILE container.
///
/// Item metadata (the `ItemTypes`, `ItemOffsets`, `DataOffsets` tables and
/// the `ItemPayload` region itself) is read into memory at open time.
/// Compressed blobs in the `DataRegion` are left on disk and loaded only
/// when first requested through [`get_data`](DataFile::get_data), after
/// which they're cached for the lifetime of the [`DataFile`].
pub struct DataFile {
    header: Header,
    item_types: Vec<ItemTypeEntry>,
    item_offsets: Vec<i32>,
    data_offsets: Vec<i32>,
    /// Per-blob decompressed size. Only present (non-empty) for version 4
    /// files; version 3 files have no uncompressed size table and their
    /// compressed size doubles as the decompression buffer size.
    uncompressed_sizes: Vec<i32>,
    item_payload: Vec<u8>,
    data_cache: Vec<Option<Vec<u8>>>,
    file_handle: Option<BufReader<File>>,
    /// Absolute byte offset of the `DataRegion` in the underlying file.
    data_region_offset: u64,
    crc32: u32,
    sha256: [u8; 32],
}

impl DataFile {
    /// Opens and parses the DATAFILE at `path`.
    ///
    /// # Errors
    /// - If the file cannot be opened or read: [`crate::Error::Io`]
    /// - If the header is malformed: [`DatafileError`]
    /// - If any table is truncated: [`DatafileError::TruncatedFile`]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut datafile = Self::default();
        datafile.read(path)?;
        Ok(datafile)
    }

    fn read<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let digests = hash::hash_reader(BufReader::new(File::open(&path)?))?;
        self.crc32 = digests.crc32;
        self.sha256 = digests.sha256;

        let mut reader = BufReader::new(File::open(&path)?);
        self.header = Header::read(&mut reader)?;
        if self.header.has_negative_count() {
            return Err(DatafileError::InvalidSize.into());
        }

        let num_item_types = self.header.num_item_types as usize;
        let num_items = self.header.num_items as usize;
        let num_raw_data = self.header.num_raw_data as usize;
        let item_size = self.header.item_size as usize;

        let uncompressed_sizes_count = if self.header.version == Version::V4 {
            num_raw_data
        } else {
            0
        };
        let metadata_region_size = num_item_types * ITEM_TYPE_ENTRY_SIZE
            + num_items * 4
            + num_raw_data * 4
            + uncompressed_sizes_count * 4
            + item_size;
        if metadata_region_size > 1 << 31 {
            return Err(DatafileError::InvalidSize.into());
        }

        self.item_types = (0..num_item_types)
            .map(|_| -> Result<ItemTypeEntry> {
                Ok(ItemTypeEntry {
                    type_id: reader.read_i32::<LE>()?,
                    start: reader.read_i32::<LE>()?,
                    num: reader.read_i32::<LE>()?,
                })
            })
            .collect::<Result<_>>()?;

        self.item_offsets = (0..num_items)
            .map(|_| Ok(reader.read_i32::<LE>()?))
            .collect::<Result<_>>()?;

        self.data_offsets = (0..num_raw_data)
            .map(|_| Ok(reader.read_i32::<LE>()?))
            .collect::<Result<_>>()?;

        self.uncompressed_sizes = if self.header.version == Version::V4 {
            (0..num_raw_data)
                .map(|_| Ok(reader.read_i32::<LE>()?))
                .collect::<Result<_>>()?
        } else {
            Vec::new()
        };

        let mut item_payload = vec![0u8; item_size];
        reader.read_exact(&mut item_payload).map_err(|_| {
            DatafileError::TruncatedFile {
                expected: item_size,
                got: 0,
            }
        })?;
        self.item_payload = item_payload;

        self.data_region_offset = reader.stream_position()?;
        self.data_cache = vec![None; num_raw_data];
        self.file_handle = Some(reader);
        Ok(())
    }

    /// Number of items of all types in the container.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.item_offsets.len()
    }

    /// Number of compressed data blobs in the container.
    #[must_use]
    pub fn num_data(&self) -> usize {
        self.data_offsets.len()
    }

    /// Number of distinct item type groups in the `ItemTypes` table.
    #[must_use]
    pub fn num_item_types(&self) -> usize {
        self.item_types.len()
    }

    /// The `(type, id)` pair and payload of the item at `index`.
    ///
    /// The payload does not include the item's own two-word header.
    ///
    /// # Errors
    /// - If `index` is out of range or the item payload is truncated:
    ///   [`DatafileError::TruncatedFile`]
    pub fn get_item(&self, index: usize) -> Result<(i32, i32, &[u8])> {
        let offset = *self
            .item_offsets
            .get(index)
            .ok_or(DatafileError::TruncatedFile {
                expected: index + 1,
                got: self.item_offsets.len(),
            })? as usize;

        let header = self
            .item_payload
            .get(offset..offset + ITEM_HEADER_SIZE)
            .ok_or(DatafileError::TruncatedFile {
                expected: offset + ITEM_HEADER_SIZE,
                got: self.item_payload.len(),
            })?;
        let type_and_id = i32::from_le_bytes(header[0..4].try_into().unwrap());
        let size = i32::from_le_bytes(header[4..8].try_into().unwrap());
        let item_type = type_and_id >> 16;
        let item_id = type_and_id & 0xFFFF;

        let payload_start = offset + ITEM_HEADER_SIZE;
        let payload = self
            .item_payload
            .get(payload_start..payload_start + size as usize)
            .ok_or(DatafileError::TruncatedFile {
                expected: payload_start + size as usize,
                got: self.item_payload.len(),
            })?;

        Ok((item_type, item_id, payload))
    }

    /// Size in bytes of the item at `index`, excluding its header.
    ///
    /// # Errors
    /// See [`get_item`](DataFile::get_item).
    pub fn get_item_size(&self, index: usize) -> Result<usize> {
        Ok(self.get_item(index)?.2.len())
    }

    /// Indices of every item whose type matches `item_type`.
    #[must_use]
    pub fn get_type(&self, item_type: i32) -> Vec<usize> {
        self.item_types
            .iter()
            .find(|entry| entry.type_id == item_type)
            .map(|entry| {
                let start = entry.start as usize;
                let num = entry.num as usize;
                (start..start + num).collect()
            })
            .unwrap_or_default()
    }

    /// Finds the index of the item with the given `(item_type, id)`, if any.
    #[must_use]
    pub fn find_item(&self, item_type: i32, id: i32) -> Option<usize> {
        self.get_type(item_type)
            .into_iter()
            .find(|&index| matches!(self.get_item(index), Ok((_, item_id, _)) if item_id == id))
    }

    /// Reads and decompresses data blob `index`, caching the result.
    ///
    /// # Errors
    /// - If `index` is out of range: [`DatafileError::TruncatedFile`]
    /// - If the blob cannot be read from disk: [`crate::Error::Io`]
    /// - If decompression fails or yields fewer bytes than declared:
    ///   [`CompressionError::Inflate`]
    pub fn get_data(&mut self, index: usize) -> Result<&[u8]> {
        self.load_data(index)?;
        Ok(self.data_cache[index].as_deref().unwrap())
    }

    /// Same as [`get_data`](DataFile::get_data), but returns the blob with
    /// every 4-byte group byte-swapped on big-endian hosts.
    ///
    /// Intended for callers that reinterpret a blob's bytes directly as an
    /// array of host-endian integers (for instance tile or envelope point
    /// data) instead of decoding fields one at a time.
    ///
    /// # Errors
    /// See [`get_data`](DataFile::get_data).
    pub fn get_data_swapped(&mut self, index: usize) -> Result<Vec<u8>> {
        let data = self.get_data(index)?.to_vec();
        let mut data = data;
        swap_in_place(&mut data);
        Ok(data)
    }

    /// The decompressed size in bytes of data blob `index`.
    ///
    /// If the blob has already been loaded, unloaded-then-reloaded, or
    /// [`replace`](DataFile::replace)d, this returns the actually
    /// materialized buffer's length rather than the header-declared size,
    /// so it stays accurate across a `replace` that changes a blob's
    /// size (as the MAP overlay's tile-layer RLE expansion does).
    ///
    /// # Errors
    /// - If `index` is out of range: [`DatafileError::TruncatedFile`]
    pub fn get_data_size(&self, index: usize) -> Result<usize> {
        if index >= self.data_offsets.len() {
            return Err(DatafileError::TruncatedFile {
                expected: index + 1,
                got: self.data_offsets.len(),
            }
            .into());
        }
        if let Some(Some(loaded)) = self.data_cache.get(index) {
            return Ok(loaded.len());
        }
        if let Some(size) = self.uncompressed_sizes.get(index) {
            return Ok(*size as usize);
        }
        Ok(self.compressed_size(index))
    }

    /// Drops the cached copy of data blob `index`, if loaded. It will be
    /// re-read from disk on its next access.
    pub fn unload(&mut self, index: usize) {
        if let Some(slot) = self.data_cache.get_mut(index) {
            *slot = None;
        }
    }

    /// Replaces the cached copy of data blob `index` with `data`, without
    /// touching the file on disk. A later call to
    /// [`get_data`](DataFile::get_data) returns `data` until
    /// [`unload`](DataFile::unload) is called.
    pub fn replace(&mut self, index: usize, data: Vec<u8>) {
        if let Some(slot) = self.data_cache.get_mut(index) {
            *slot = Some(data);
        }
    }

    /// Closes the underlying file handle. Cached blobs and the item
    /// payload remain readable; uncached blobs become unreachable.
    pub fn close(&mut self) {
        self.file_handle = None;
    }

    /// CRC-32 (zlib/IEEE 802.3) of the whole file, computed at open time.
    /// Returns [`NO_CRC32`] if no file is open.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        if self.file_handle.is_none() && self.item_payload.is_empty() {
            NO_CRC32
        } else {
            self.crc32
        }
    }

    /// SHA-256 of the whole file, computed at open time. Returns
    /// [`NO_SHA256`] if no file is open.
    #[must_use]
    pub fn sha256(&self) -> [u8; 32] {
        if self.file_handle.is_none() && self.item_payload.is_empty() {
            NO_SHA256
        } else {
            self.sha256
        }
    }

    /// Verifies this container's SHA-256 digest against `expected`.
    #[must_use]
    pub fn verify_sha256(&self, expected: &[u8; 32]) -> bool {
        &self.sha256() == expected
    }

    fn compressed_size(&self, index: usize) -> usize {
        let start = self.data_offsets[index];
        let end = self
            .data_offsets
            .get(index + 1)
            .copied()
            .unwrap_or(self.header.data_size);
        (end - start).max(0) as usize
    }

    fn load_data(&mut self, index: usize) -> Result<()> {
        if index >= self.data_cache.len() {
            return Err(DatafileError::TruncatedFile {
                expected: index + 1,
                got: self.data_cache.len(),
            }
            .into());
        }
        if self.data_cache[index].is_some() {
            return Ok(());
        }

        let compressed_size = self.compressed_size(index);
        let offset = self.data_region_offset + self.data_offsets[index] as u64;
        let reader = self
            .file_handle
            .as_mut()
            .ok_or(DatafileError::TruncatedFile {
                expected: compressed_size,
                got: 0,
            })?;
        reader.seek(SeekFrom::Start(offset))?;
        let mut compressed = vec![0u8; compressed_size];
        reader.read_exact(&mut compressed)?;

        let data = match self.header.version {
            Version::V3 => compressed,
            Version::V4 => {
                let uncompressed_size = self.uncompressed_sizes[index] as usize;
                inflate(&compressed, uncompressed_size)?
            }
        };

        self.data_cache[index] = Some(data);
        Ok(())
    }
}

/// Inflates `compressed` into a buffer of exactly `uncompressed_size`
/// bytes.
fn inflate(compressed: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    use flate2::bufread::ZlibDecoder;

    let mut decoder = ZlibDecoder::new(Cursor::new(compressed));
    let mut out = Vec::with_capacity(uncompressed_size);
    decoder
        .read_to_end(&mut out)
        .map_err(CompressionError::Inflate)?;
    if out.len() != uncompressed_size {
        return Err(CompressionError::Inflate(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!(
                "expected {uncompressed_size} decompressed bytes, got {}",
                out.len()
            ),
        ))
        .into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_datafile_reports_sentinel_hashes() {
        let datafile = DataFile::default();
        assert_eq!(datafile.crc32(), NO_CRC32);
        assert_eq!(datafile.sha256(), NO_SHA256);
    }

    #[test]
    fn get_type_returns_empty_for_unknown_type() {
        let datafile = DataFile::default();
        assert!(datafile.get_type(42).is_empty());
    }
}
