//! DATAFILE header: the fixed 36-byte prefix describing the layout of the
//! rest of the file.

use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use num_enum::TryFromPrimitive;
use std::io::{Read, Write};

use crate::common::errors::DatafileError;
use crate::Result;

/// Canonical magic bytes written by this crate.
pub const MAGIC: [u8; 4] = *b"DATA";
/// Legacy byte-reversed magic accepted for backwards compatibility.
pub const MAGIC_LEGACY: [u8; 4] = *b"ATAD";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
/// Revision of the DATAFILE container layout.
pub enum Version {
    /// No per-blob uncompressed size table; the on-disk compressed byte
    /// count doubles as the decompression buffer size.
    V3 = 3,
    #[default]
    /// Carries a `DataUncompressedSizes` table, one `i32` per blob.
    V4 = 4,
}

#[derive(Debug, Default, Clone, Copy)]
/// The 36-byte DATAFILE header.
pub struct Header {
    /// Revision of the container layout.
    pub version: Version,
    /// Total file size minus the first 16 header bytes.
    pub size: i32,
    /// Number of leading bytes (past the fixed 16-byte prefix) that form
    /// a pure int-aligned region and must be endian-swapped on
    /// big-endian hosts. Never extends into the compressed data region.
    pub swaplen: i32,
    /// Number of entries in the `ItemTypes` table.
    pub num_item_types: i32,
    /// Number of items in the `ItemPayload` region.
    pub num_items: i32,
    /// Number of compressed blobs in the `DataRegion`.
    pub num_raw_data: i32,
    /// Total bytes of the `ItemPayload` region.
    pub item_size: i32,
    /// Total bytes of the `DataRegion`.
    pub data_size: i32,
}

/// Size in bytes of the on-disk header.
pub const HEADER_SIZE: usize = 36;

impl Header {
    /// Reads and validates a header from `reader`.
    ///
    /// # Errors
    /// - If the magic is neither `DATA` nor `ATAD`: [`DatafileError::IncorrectMagic`]
    /// - If the version is neither 3 nor 4: [`DatafileError::UnsupportedVersion`]
    /// - If the reader fails to produce the exact number of bytes: [`crate::Error::Io`]
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC && magic != MAGIC_LEGACY {
            return Err(DatafileError::IncorrectMagic(magic).into());
        }

        let raw_version = reader.read_i32::<LE>()?;
        let version = Version::try_from_primitive(raw_version)
            .map_err(|_| DatafileError::UnsupportedVersion(raw_version))?;

        Ok(Self {
            version,
            size: reader.read_i32::<LE>()?,
            swaplen: reader.read_i32::<LE>()?,
            num_item_types: reader.read_i32::<LE>()?,
            num_items: reader.read_i32::<LE>()?,
            num_raw_data: reader.read_i32::<LE>()?,
            item_size: reader.read_i32::<LE>()?,
            data_size: reader.read_i32::<LE>()?,
        })
    }

    /// Writes the header in canonical form (magic `DATA`).
    ///
    /// Every field is written through [`byteorder`]'s `LE` adapter, so
    /// the on-disk bytes are correct little-endian regardless of host
    /// endianness; no separate bulk swap is needed here (contrast
    /// [`crate::codec::DataFile::get_data_swapped`], which works on raw
    /// blob bytes that bypass per-field decoding).
    ///
    /// # Errors
    /// - If the writer fails: [`crate::Error::Io`]
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut buf = [0u8; HEADER_SIZE];
        {
            let mut cursor = &mut buf[..];
            cursor.write_all(&MAGIC)?;
            cursor.write_i32::<LE>(self.version as i32)?;
            cursor.write_i32::<LE>(self.size)?;
            cursor.write_i32::<LE>(self.swaplen)?;
            cursor.write_i32::<LE>(self.num_item_types)?;
            cursor.write_i32::<LE>(self.num_items)?;
            cursor.write_i32::<LE>(self.num_raw_data)?;
            cursor.write_i32::<LE>(self.item_size)?;
            cursor.write_i32::<LE>(self.data_size)?;
        }
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Whether any of the header-declared counts are negative.
    pub(crate) fn has_negative_count(&self) -> bool {
        self.num_item_types < 0 || self.num_items < 0 || self.num_raw_data < 0 || self.item_size < 0
    }
}
