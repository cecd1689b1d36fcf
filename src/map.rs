//! The Teeworlds MAP schema: known item types layered on top of the
//! DATAFILE container, plus the version check and tile-layer RLE
//! expansion a well-formed map reader performs at open time.

pub mod names;
pub mod reader;
pub mod types;

pub use reader::{MapFile, ITEMTYPE_ENVELOPE, ITEMTYPE_ENVPOINTS, ITEMTYPE_GROUP, ITEMTYPE_IMAGE,
    ITEMTYPE_INFO, ITEMTYPE_LAYER, ITEMTYPE_VERSION};
