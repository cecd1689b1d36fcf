//! Writes a DATAFILE container.
//!
//! Items and data blobs are accumulated in memory as they're added, then
//! emitted in one deterministic pass by [`finish`](Writer::finish).
//! Compression happens eagerly in [`add_data`](Writer::add_data) rather
//! than being deferred to `finish`, so a caller that wants the compressed
//! size of a blob before finishing can call
//! [`Writer::num_data`] bookkeeping immediately after adding it.

use byteorder::{WriteBytesExt, LE};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::header::{Header, Version, MAGIC};
use crate::common::errors::{CompressionError, WriterError};
use crate::Result;

/// Largest value a packed `(type << 16) | id` item type may take.
const MAX_ITEM_TYPE: i32 = 0xFFFF;

struct PendingItem {
    item_type: i32,
    id: i32,
    payload: Vec<u8>,
}

struct PendingData {
    compressed: Vec<u8>,
    uncompressed_size: i32,
}

#[derive(Default)]
/// Accumulates items and data blobs, then emits a complete DATAFILE
/// container in one deterministic pass.
pub struct Writer {
    items: Vec<PendingItem>,
    data: Vec<PendingData>,
    open: bool,
}

impl Writer {
    /// Creates a new, empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the writer as open for adding items and data. Mirrors the
    /// reference implementation's explicit open/close lifecycle; calling
    /// [`add_item`](Writer::add_item) or [`add_data`](Writer::add_data)
    /// before `open` or after [`finish`](Writer::finish) fails with
    /// [`WriterError::FileNotOpen`].
    ///
    /// # Errors
    /// - If the writer already has a file open: [`WriterError::FileAlreadyOpen`]
    pub fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(WriterError::FileAlreadyOpen.into());
        }
        self.items.clear();
        self.data.clear();
        self.open = true;
        Ok(())
    }

    /// Adds an item of the given `item_type` and `id`, copying `payload`.
    ///
    /// `item_type` must be representable in 16 bits, and `payload.len()`
    /// must be a multiple of 4 (the on-disk item payload region is an
    /// int-aligned byte run).
    ///
    /// # Errors
    /// - If no file is open: [`WriterError::FileNotOpen`]
    /// - If `item_type` is out of range: [`WriterError::TypeOutOfRange`]
    /// - If `payload.len()` is not a multiple of 4: [`WriterError::MisalignedSize`]
    pub fn add_item(&mut self, item_type: i32, id: i32, payload: &[u8]) -> Result<usize> {
        if !self.open {
            return Err(WriterError::FileNotOpen.into());
        }
        if !(0..=MAX_ITEM_TYPE).contains(&item_type) {
            return Err(WriterError::TypeOutOfRange(item_type).into());
        }
        if payload.len() % 4 != 0 {
            return Err(WriterError::MisalignedSize(payload.len() as i32).into());
        }

        self.items.push(PendingItem {
            item_type,
            id,
            payload: payload.to_vec(),
        });
        Ok(self.items.len() - 1)
    }

    /// Compresses `data` and adds it as a new data blob, returning its
    /// index.
    ///
    /// # Errors
    /// - If no file is open: [`WriterError::FileNotOpen`]
    /// - If compression fails: [`CompressionError::Deflate`]
    pub fn add_data(&mut self, data: &[u8]) -> Result<usize> {
        if !self.open {
            return Err(WriterError::FileNotOpen.into());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).map_err(CompressionError::Deflate)?;
        let compressed = encoder.finish().map_err(CompressionError::Deflate)?;

        self.data.push(PendingData {
            compressed,
            uncompressed_size: data.len() as i32,
        });
        Ok(self.data.len() - 1)
    }

    /// Adds `data` as a new data blob with every 4-byte group
    /// byte-swapped on big-endian hosts before compression, the inverse
    /// of [`crate::codec::DataFile::get_data_swapped`].
    ///
    /// # Errors
    /// See [`add_data`](Writer::add_data).
    pub fn add_data_swapped(&mut self, data: &[u8]) -> Result<usize> {
        let mut data = data.to_vec();
        crate::common::endian::swap_in_place(&mut data);
        self.add_data(&data)
    }

    /// Number of items added so far.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Number of data blobs added so far.
    #[must_use]
    pub fn num_data(&self) -> usize {
        self.data.len()
    }

    /// Emits the complete container to `path` and closes the writer.
    ///
    /// Items are grouped by type, in order of each type's first
    /// appearance, and within a type in the order they were added; this
    /// matches [`DataFile::get_type`](crate::codec::DataFile::get_type)'s
    /// contract that a type's items form one contiguous run.
    ///
    /// Emission order:
    /// 1. header
    /// 2. `ItemTypes` table
    /// 3. `ItemOffsets` table
    /// 4. `DataOffsets` table
    /// 5. `DataUncompressedSizes` table
    /// 6. `ItemPayload` region
    /// 7. `DataRegion`
    ///
    /// # Errors
    /// - If no file is open: [`WriterError::FileNotOpen`]
    /// - If `path` cannot be created or written: [`crate::Error::Io`]
    pub fn finish<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if !self.open {
            return Err(WriterError::FileNotOpen.into());
        }

        let order = self.stable_type_order();

        let mut item_types = Vec::new();
        let mut item_offsets = Vec::with_capacity(self.items.len());
        let mut item_payload = Vec::new();
        for &item_type in &order {
            let start = item_offsets.len() as i32;
            let mut num = 0i32;
            for (index, item) in self.items.iter().enumerate() {
                if item.item_type != item_type {
                    continue;
                }
                item_offsets.push(item_payload.len() as i32);
                item_payload.write_i32::<LE>((item.item_type << 16) | (item.id & 0xFFFF))?;
                item_payload.write_i32::<LE>(item.payload.len() as i32)?;
                item_payload.extend_from_slice(&item.payload);
                num += 1;
                let _ = index;
            }
            item_types.push((item_type, start, num));
        }

        let mut data_offsets = Vec::with_capacity(self.data.len());
        let mut data_region = Vec::new();
        let mut uncompressed_sizes = Vec::with_capacity(self.data.len());
        for blob in &self.data {
            data_offsets.push(data_region.len() as i32);
            data_region.extend_from_slice(&blob.compressed);
            uncompressed_sizes.push(blob.uncompressed_size);
        }

        let header = Header {
            version: Version::V4,
            size: 0, // filled in below once the metadata size is known
            swaplen: 0,
            num_item_types: item_types.len() as i32,
            num_items: item_offsets.len() as i32,
            num_raw_data: data_offsets.len() as i32,
            item_size: item_payload.len() as i32,
            data_size: data_region.len() as i32,
        };

        let metadata_size = item_types.len() * 12
            + item_offsets.len() * 4
            + data_offsets.len() * 4
            + uncompressed_sizes.len() * 4
            + item_payload.len();
        let header = Header {
            size: (20 + metadata_size + data_region.len()) as i32,
            swaplen: (20 + metadata_size) as i32,
            ..header
        };

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        header.write(&mut writer)?;
        for (type_id, start, num) in item_types {
            writer.write_i32::<LE>(type_id)?;
            writer.write_i32::<LE>(start)?;
            writer.write_i32::<LE>(num)?;
        }
        for offset in item_offsets {
            writer.write_i32::<LE>(offset)?;
        }
        for offset in data_offsets {
            writer.write_i32::<LE>(offset)?;
        }
        for size in uncompressed_sizes {
            writer.write_i32::<LE>(size)?;
        }
        writer.write_all(&item_payload)?;
        writer.write_all(&data_region)?;
        writer.flush()?;

        self.items.clear();
        self.data.clear();
        self.open = false;
        Ok(())
    }

    /// Distinct item types present among the added items, in ascending
    /// numeric order. Items within a type keep their original insertion
    /// order; only the grouping of types themselves is sorted.
    fn stable_type_order(&self) -> Vec<i32> {
        let mut order = Vec::new();
        for item in &self.items {
            if !order.contains(&item.item_type) {
                order.push(item.item_type);
            }
        }
        order.sort_unstable();
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DataFile;
    use std::io::Read;

    #[test]
    fn rejects_operations_before_open() {
        let mut writer = Writer::new();
        assert!(matches!(
            writer.add_item(0, 0, &[]),
            Err(crate::Error::Writer(WriterError::FileNotOpen))
        ));
    }

    #[test]
    fn rejects_item_type_out_of_range() {
        let mut writer = Writer::new();
        writer.open().unwrap();
        assert!(matches!(
            writer.add_item(0x1_0000, 0, &[]),
            Err(crate::Error::Writer(WriterError::TypeOutOfRange(_)))
        ));
    }

    #[test]
    fn rejects_misaligned_item_payload() {
        let mut writer = Writer::new();
        writer.open().unwrap();
        assert!(matches!(
            writer.add_item(0, 0, &[1, 2, 3]),
            Err(crate::Error::Writer(WriterError::MisalignedSize(3)))
        ));
    }

    #[test]
    fn finished_file_round_trips_through_datafile_reader() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "datafile-rs-writer-test-{:?}.datafile",
            std::thread::current().id()
        ));

        let mut writer = Writer::new();
        writer.open().unwrap();
        writer.add_item(1, 0, &[1, 2, 3, 4]).unwrap();
        let data_index = writer.add_data(b"hello world").unwrap();
        assert_eq!(data_index, 0);
        writer.finish(&path).unwrap();

        let mut datafile = DataFile::open(&path).unwrap();
        assert_eq!(datafile.num_items(), 1);
        assert_eq!(datafile.num_data(), 1);
        let (item_type, id, payload) = datafile.get_item(0).unwrap();
        assert_eq!(item_type, 1);
        assert_eq!(id, 0);
        assert_eq!(payload, &[1, 2, 3, 4]);
        assert_eq!(datafile.get_data(0).unwrap(), b"hello world");

        let mut file = File::open(&path).unwrap();
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).unwrap();
        assert_eq!(magic, MAGIC);

        let _ = std::fs::remove_file(&path);
    }
}
