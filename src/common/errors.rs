//! Common errors used throughout `datafile-rs`.

use std::io::Error as StdIoError;
use std::num::TryFromIntError;
use std::result::Result as StdResult;
use thiserror::Error;

#[derive(Error, Debug)]
/// Errors that can occur when opening or reading a DATAFILE container.
pub enum DatafileError {
    /// Magic bytes were neither `DATA` nor the legacy byte-reversed `ATAD`.
    #[error("incorrect datafile signature: {0:?}")]
    IncorrectMagic([u8; 4]),
    /// Version field was not 3 or 4.
    #[error("unsupported datafile version: {0}")]
    UnsupportedVersion(i32),
    /// A header-declared count was negative, or the metadata region would
    /// exceed the 2^31 safety cap.
    #[error("invalid size while reading datafile header")]
    InvalidSize,
    /// The metadata region could not be read in full.
    #[error("truncated datafile: expected {expected} bytes, got {got}")]
    TruncatedFile {
        /// Number of bytes the header promised.
        expected: usize,
        /// Number of bytes actually read.
        got: usize,
    },
}

#[derive(Error, Debug)]
/// Errors that can occur when interpreting MAP-schema items on top of a
/// DATAFILE container.
pub enum MapError {
    /// The version item (type 0, id 0) was missing.
    #[error("map is missing its version item")]
    MissingVersionItem,
    /// The version item declared an unsupported version.
    #[error("unsupported map version: {0}")]
    UnsupportedMapVersion(i32),
    /// `width * height` (or that times the tile size) overflowed `i32`.
    #[error("tile layer {width}x{height} causes an integer overflow")]
    TileCountOverflow {
        /// Declared layer width.
        width: i32,
        /// Declared layer height.
        height: i32,
    },
}

#[derive(Error, Debug)]
/// Errors that can occur during DEFLATE (de)compression of data blobs.
pub enum CompressionError {
    /// Compression of a blob failed.
    #[error("failed to deflate blob")]
    Deflate(#[source] StdIoError),
    /// Decompression of a blob failed, or produced fewer bytes than
    /// declared.
    #[error("failed to inflate blob")]
    Inflate(#[source] StdIoError),
}

#[derive(Error, Debug)]
/// Programming-error conditions raised by [`crate::codec::writer::Writer`].
///
/// These correspond to the reference implementation's fatal assertions;
/// here they are recoverable errors instead of process aborts.
pub enum WriterError {
    /// `add_item` was called with a type outside `[0, 0x10000)`.
    #[error("item type {0} out of range (must be < 0x10000)")]
    TypeOutOfRange(i32),
    /// `add_item` was called with a payload size not a multiple of 4.
    #[error("item payload size {0} is not a multiple of 4")]
    MisalignedSize(i32),
    /// `open` was called on a writer that already has a file open.
    #[error("writer already has a file open")]
    FileAlreadyOpen,
    /// An operation requiring an open file was called before `open`.
    #[error("writer has no file open")]
    FileNotOpen,
}

#[derive(Error, Debug)]
/// Standard error type used throughout `datafile-rs`.
pub enum Error {
    /// IO error from [`std::io`] operations.
    #[error("i/o error")]
    Io(#[from] StdIoError),
    /// Integer conversion failed, usually while narrowing a header-declared
    /// count to a platform `usize`.
    #[error("integer conversion failed")]
    TryFromInt(#[from] TryFromIntError),
    /// Error while opening or reading the DATAFILE container itself.
    #[error("datafile error")]
    Datafile(#[from] DatafileError),
    /// Error while interpreting MAP-schema items.
    #[error("map error")]
    Map(#[from] MapError),
    /// Error while (de)compressing a blob.
    #[error("compression error")]
    Compression(#[from] CompressionError),
    /// Writer precondition violation.
    #[error("writer error")]
    Writer(#[from] WriterError),
}

/// Standard result type used throughout `datafile-rs`.
pub type Result<T> = StdResult<T, Error>;
