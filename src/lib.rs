//! Reader and writer for the Teeworlds `DATAFILE` container format, plus
//! a schema overlay for the `MAP` item types built on top of it.
//!
//! # Examples
//!
//! ```no_run
//! use datafile_rs::codec::DataFile;
//!
//! let mut datafile = DataFile::open("dm1.map")?;
//! for index in 0..datafile.num_items() {
//!     let (item_type, id, payload) = datafile.get_item(index)?;
//!     println!("item {index}: type={item_type} id={id} size={}", payload.len());
//! }
//! # Ok::<(), datafile_rs::Error>(())
//! ```

pub mod codec;
pub mod common;
pub mod map;

pub use common::errors::{
    CompressionError, DatafileError, Error, MapError, Result, WriterError,
};
