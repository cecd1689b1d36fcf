//! The MAP schema layered on top of [`DataFile`]: item type constants,
//! map-version enforcement, and eager RLE expansion of tile layers.

use std::path::Path;

use super::types::{
    read_env_points, read_quads, EnvPoint, ItemEnvelope, ItemGroup, ItemImage, ItemInfo,
    ItemLayer, ItemLayerQuads, ItemLayerTilemap, ItemVersion, Quad, Tile, ITEM_VERSION_CURRENT,
};
use crate::codec::DataFile;
use crate::common::errors::{DatafileError, MapError};
use crate::Result;

/// Item type IDs for the known MAP item kinds.
pub const ITEMTYPE_VERSION: i32 = 0;
pub const ITEMTYPE_INFO: i32 = 1;
pub const ITEMTYPE_IMAGE: i32 = 2;
pub const ITEMTYPE_ENVELOPE: i32 = 3;
pub const ITEMTYPE_GROUP: i32 = 4;
pub const ITEMTYPE_LAYER: i32 = 5;
pub const ITEMTYPE_ENVPOINTS: i32 = 6;

/// An open Teeworlds map.
///
/// Wraps a [`DataFile`] and enforces the MAP schema's extra invariant on
/// top of the raw container: a well-formed map always carries exactly one
/// [`ItemVersion`] item declaring [`ITEM_VERSION_CURRENT`]. Tile layer
/// data blobs are expanded from their on-disk RLE form into flat
/// [`Tile`] arrays eagerly at open time, mirroring the reference reader's
/// behavior of doing this once up front rather than on every access.
pub struct MapFile {
    datafile: DataFile,
}

impl MapFile {
    /// Opens the map at `path`, validating its version item and
    /// expanding every tile layer's data blob in place.
    ///
    /// # Errors
    /// - If the underlying container cannot be opened: see [`DataFile::open`]
    /// - If the version item is missing: [`MapError::MissingVersionItem`]
    /// - If the version item declares an unsupported version:
    ///   [`MapError::UnsupportedMapVersion`]
    /// - If a tile layer's dimensions overflow during expansion:
    ///   [`MapError::TileCountOverflow`]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut datafile = DataFile::open(path)?;

        let version_index = datafile
            .find_item(ITEMTYPE_VERSION, 0)
            .ok_or(MapError::MissingVersionItem)?;
        let (_, _, payload) = datafile.get_item(version_index)?;
        let version = ItemVersion::read(payload);
        if version.version != ITEM_VERSION_CURRENT {
            return Err(MapError::UnsupportedMapVersion(version.version).into());
        }

        let mut map = Self { datafile };
        map.expand_tile_layers()?;
        Ok(map)
    }

    /// The underlying container, for callers that need raw item/data
    /// access the MAP-specific helpers don't cover.
    #[must_use]
    pub fn datafile(&self) -> &DataFile {
        &self.datafile
    }

    /// The underlying container, mutably.
    #[must_use]
    pub fn datafile_mut(&mut self) -> &mut DataFile {
        &mut self.datafile
    }

    /// The map's single [`ItemInfo`], if present.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors if the info item's
    /// payload is malformed.
    pub fn info(&self) -> Result<Option<ItemInfo>> {
        self.single_item(ITEMTYPE_INFO, ItemInfo::read)
    }

    /// Every `ItemImage` in the map, in item order.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors.
    pub fn images(&self) -> Result<Vec<ItemImage>> {
        self.items_of_type(ITEMTYPE_IMAGE, ItemImage::read)
    }

    /// Every `ItemGroup` in the map, in item order.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors.
    pub fn groups(&self) -> Result<Vec<ItemGroup>> {
        self.items_of_type(ITEMTYPE_GROUP, ItemGroup::read)
    }

    /// The raw header of every `ItemLayer` in the map, in item order.
    /// Use [`tile_layer`](MapFile::tile_layer) or
    /// [`quad_layer`](MapFile::quad_layer) to read a specific layer's full
    /// fields once you know its [`LayerType`](super::types::LayerType)
    /// from this header.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors.
    pub fn layers(&self) -> Result<Vec<ItemLayer>> {
        self.items_of_type(ITEMTYPE_LAYER, ItemLayer::read)
    }

    /// Reads the layer at `index` (an index into
    /// [`layers`](MapFile::layers)'s result) as a tile layer.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors.
    pub fn tile_layer(&self, index: usize) -> Result<ItemLayerTilemap> {
        let absolute = self.layer_index(index)?;
        let (_, _, payload) = self.datafile.get_item(absolute)?;
        Ok(ItemLayerTilemap::read(payload))
    }

    /// Reads the layer at `index` (an index into
    /// [`layers`](MapFile::layers)'s result) as a quad layer.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors.
    pub fn quad_layer(&self, index: usize) -> Result<ItemLayerQuads> {
        let absolute = self.layer_index(index)?;
        let (_, _, payload) = self.datafile.get_item(absolute)?;
        Ok(ItemLayerQuads::read(payload))
    }

    /// Decodes a quad layer's data blob into its [`Quad`]s.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_data`] errors.
    pub fn quads(&mut self, layer: &ItemLayerQuads) -> Result<Vec<Quad>> {
        Ok(read_quads(self.datafile.get_data(layer.data as usize)?))
    }

    /// Every `ItemEnvelope` in the map, in item order.
    ///
    /// # Errors
    /// Propagates [`DataFile::get_item`] errors.
    pub fn envelopes(&self) -> Result<Vec<ItemEnvelope>> {
        self.items_of_type(ITEMTYPE_ENVELOPE, ItemEnvelope::read)
    }

    /// The points belonging to `envelope`, read from the map's single
    /// shared `EnvPoints` data item (type 6, id 0).
    ///
    /// # Errors
    /// - If no `EnvPoints` item exists: [`DataFile::find_item`] returning
    ///   `None` is treated as an empty point list, not an error.
    /// Propagates [`DataFile::get_data`]/[`DataFile::get_item`] errors.
    pub fn env_points(&mut self, envelope: &ItemEnvelope) -> Result<Vec<EnvPoint>> {
        let Some(index) = self.datafile.find_item(ITEMTYPE_ENVPOINTS, 0) else {
            return Ok(Vec::new());
        };
        let (_, _, payload) = self.datafile.get_item(index)?;
        let point_size = if envelope.has_bezier_points() { 22 * 4 } else { 6 * 4 };
        let start = envelope.start_point as usize * point_size;
        let end = start + envelope.num_points as usize * point_size;
        let slice = payload.get(start..end).unwrap_or(&[]);
        Ok(read_env_points(slice, envelope.has_bezier_points()))
    }

    fn layer_index(&self, index: usize) -> Result<usize> {
        let indices = self.datafile.get_type(ITEMTYPE_LAYER);
        indices.get(index).copied().ok_or_else(|| {
            DatafileError::TruncatedFile {
                expected: index + 1,
                got: indices.len(),
            }
            .into()
        })
    }

    fn single_item<T>(&self, item_type: i32, read: impl Fn(&[u8]) -> T) -> Result<Option<T>> {
        let Some(index) = self.datafile.find_item(item_type, 0) else {
            return Ok(None);
        };
        let (_, _, payload) = self.datafile.get_item(index)?;
        Ok(Some(read(payload)))
    }

    fn items_of_type<T>(&self, item_type: i32, read: impl Fn(&[u8]) -> T) -> Result<Vec<T>> {
        self.datafile
            .get_type(item_type)
            .into_iter()
            .map(|index| Ok(read(self.datafile.get_item(index)?.2)))
            .collect()
    }

    /// Expands every tile layer's data blob from its on-disk RLE form
    /// into a flat `Tile` array, and replaces the cached blob with the
    /// expansion so later [`DataFile::get_data`] calls see uncompressed
    /// tiles.
    ///
    /// Only layers with `ItemLayerTilemap::version > 3` carry RLE data;
    /// earlier map versions already store tiles uncompressed.
    fn expand_tile_layers(&mut self) -> Result<()> {
        let layer_start = match self.datafile.get_type(ITEMTYPE_LAYER).first() {
            Some(&start) => start,
            None => return Ok(()),
        };

        for group_index in self.datafile.get_type(ITEMTYPE_GROUP) {
            let (_, _, payload) = self.datafile.get_item(group_index)?;
            let group = ItemGroup::read(payload);

            for l in 0..group.num_layers {
                let absolute = layer_start + (group.start_layer + l) as usize;
                let (_, _, payload) = self.datafile.get_item(absolute)?;
                let header = ItemLayer::read(payload);
                if header.kind() != super::types::LayerType::Tiles {
                    continue;
                }
                let tilemap = ItemLayerTilemap::read(payload);
                if tilemap.version <= 3 {
                    continue;
                }

                let width = tilemap.width;
                let height = tilemap.height;
                let count = width
                    .checked_mul(height)
                    .ok_or(MapError::TileCountOverflow { width, height })?;
                let expanded_size = (count as usize)
                    .checked_mul(Tile::SIZE)
                    .ok_or(MapError::TileCountOverflow { width, height })?;

                let raw = self.datafile.get_data(tilemap.data as usize)?.to_vec();
                let tiles = expand_rle_tiles(&raw, count as usize);

                let mut expanded = Vec::with_capacity(expanded_size);
                for tile in tiles {
                    expanded.push(tile.index);
                    expanded.push(tile.flags);
                    expanded.push(0); // skip is meaningless once expanded
                    expanded.push(tile.reserved);
                }
                self.datafile.replace(tilemap.data as usize, expanded);
            }
        }
        Ok(())
    }
}

/// Decodes a skip-byte run-length-encoded tile array into `count` plain
/// [`Tile`]s.
///
/// Each stored tile repeats itself `skip` additional times before the
/// next stored tile begins; a layer's on-disk blob can therefore hold far
/// fewer than `count` raw 4-byte entries.
fn expand_rle_tiles(raw: &[u8], count: usize) -> Vec<Tile> {
    let saved: Vec<Tile> = raw
        .chunks_exact(Tile::SIZE)
        .map(|chunk| Tile {
            index: chunk[0],
            flags: chunk[1],
            skip: chunk[2],
            reserved: chunk[3],
        })
        .collect();

    let mut out = Vec::with_capacity(count);
    let mut saved_iter = saved.into_iter();
    let mut current = saved_iter.next();

    while out.len() < count {
        let Some(tile) = current else { break };
        let mut counter = 0u16;
        while counter <= u16::from(tile.skip) && out.len() < count {
            out.push(Tile {
                skip: 0,
                ..tile
            });
            counter += 1;
        }
        current = saved_iter.next();
    }
    out
}
