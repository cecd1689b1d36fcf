//! Known MAP item types layered on top of the DATAFILE container, and the
//! flags/enums that describe them.
//!
//! Every item is a flat run of little-endian `i32`s. Newer map versions
//! append fields to the end of an item rather than reordering existing
//! ones, so a reader can always decode the fields it understands and
//! treat anything beyond the end of the payload as simply absent (and
//! default it to zero) rather than erroring.

use bitflags::bitflags;
use byteorder::{ReadBytesExt, LE};
use num_enum::TryFromPrimitive;
use std::io::Cursor;

use super::names::unpack_name;

/// Reads a flat item payload as a sequence of `i32`s, treating anything
/// past the end of the buffer as zero. This lets one `read` implementation
/// serve every version of an item: older (shorter) payloads just leave
/// trailing fields at their default.
struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> FieldReader<'a> {
    fn new(payload: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(payload),
        }
    }

    fn i32(&mut self) -> i32 {
        self.cursor.read_i32::<LE>().unwrap_or(0)
    }

    fn name(&mut self, num_ints: usize) -> String {
        let ints: Vec<i32> = (0..num_ints).map(|_| self.i32()).collect();
        unpack_name(&ints)
    }
}

/// `MAPITEMTYPE_VERSION` (type 0, single item with id 0).
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemVersion {
    pub version: i32,
}

/// Current `ItemVersion::version` a map must declare to be accepted.
pub const ITEM_VERSION_CURRENT: i32 = 1;

impl ItemVersion {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        Self { version: r.i32() }
    }
}

/// `MAPITEMTYPE_INFO` (type 1): author, map version string, credits and
/// license, stored as indices into the `MAPITEMTYPE_IMAGE`-adjacent data
/// blobs rather than inline strings.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemInfo {
    pub version: i32,
    pub author: i32,
    pub map_version: i32,
    pub credits: i32,
    pub license: i32,
}

/// Current `ItemInfo::version`.
pub const ITEM_INFO_CURRENT_VERSION: i32 = 1;

impl ItemInfo {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        Self {
            version: r.i32(),
            author: r.i32(),
            map_version: r.i32(),
            credits: r.i32(),
            license: r.i32(),
        }
    }
}

/// `MAPITEMTYPE_IMAGE` (type 2). Version 1 has no `must_be_1` field;
/// version 2 adds it as a format sanity check.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemImage {
    pub version: i32,
    pub width: i32,
    pub height: i32,
    pub external: i32,
    pub image_name: i32,
    pub image_data: i32,
    /// Present from version 2 onward; always 1 when present.
    pub must_be_1: i32,
}

/// Current `ItemImage::version`.
pub const ITEM_IMAGE_CURRENT_VERSION: i32 = 2;

impl ItemImage {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        Self {
            version: r.i32(),
            width: r.i32(),
            height: r.i32(),
            external: r.i32(),
            image_name: r.i32(),
            image_data: r.i32(),
            must_be_1: r.i32(),
        }
    }

    /// Whether `image_data` names a data blob (an embedded image) rather
    /// than being meaningless because `external != 0`.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.external == 0
    }
}

/// `MAPITEMTYPE_GROUP` (type 4). Versions 1-2 have no clipping rectangle
/// or name; version 3 adds both.
#[derive(Debug, Default, Clone)]
pub struct ItemGroup {
    pub version: i32,
    pub offset_x: i32,
    pub offset_y: i32,
    pub parallax_x: i32,
    pub parallax_y: i32,
    pub start_layer: i32,
    pub num_layers: i32,
    /// Present from version 2 onward.
    pub use_clipping: i32,
    pub clip_x: i32,
    pub clip_y: i32,
    pub clip_w: i32,
    pub clip_h: i32,
    /// Present from version 3 onward.
    pub name: String,
}

/// Current `ItemGroup::version`.
pub const ITEM_GROUP_CURRENT_VERSION: i32 = 3;

impl ItemGroup {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        Self {
            version: r.i32(),
            offset_x: r.i32(),
            offset_y: r.i32(),
            parallax_x: r.i32(),
            parallax_y: r.i32(),
            start_layer: r.i32(),
            num_layers: r.i32(),
            use_clipping: r.i32(),
            clip_x: r.i32(),
            clip_y: r.i32(),
            clip_w: r.i32(),
            clip_h: r.i32(),
            name: r.name(3),
        }
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// `ItemGroup`-level rendering flags.
    pub struct LayerFlags: i32 {
        /// Hint that the layer is decorative and may be skipped for
        /// low-detail rendering.
        const DETAIL = 1;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Flags specific to a tile layer, carried alongside [`LayerFlags`].
    pub struct TilesLayerFlags: i32 {
        /// Marks the layer as the authoritative game collision layer.
        const GAME = 1;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
/// Kind of an `ItemLayer`, determining which concrete layer struct its
/// payload should be reinterpreted as.
pub enum LayerType {
    #[default]
    Invalid = 0,
    Game = 1,
    Tiles = 2,
    Quads = 3,
}

/// Common header shared by every `MAPITEMTYPE_LAYER` item (type 5).
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemLayer {
    pub version: i32,
    pub layer_type: i32,
    pub flags: i32,
}

impl ItemLayer {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        Self {
            version: r.i32(),
            layer_type: r.i32(),
            flags: r.i32(),
        }
    }

    /// Parses [`layer_type`](ItemLayer::layer_type), treating any
    /// unrecognized value as [`LayerType::Invalid`] rather than erroring.
    #[must_use]
    pub fn kind(&self) -> LayerType {
        LayerType::try_from_primitive(self.layer_type).unwrap_or(LayerType::Invalid)
    }

    #[must_use]
    pub fn layer_flags(&self) -> LayerFlags {
        LayerFlags::from_bits_truncate(self.flags)
    }
}

/// A tile layer (`LayerType::Tiles`). `data` is the index of a data blob
/// holding the expanded (RLE-decoded) [`Tile`] array once the map has been
/// through [`crate::map::MapFile::open`].
#[derive(Debug, Default, Clone)]
pub struct ItemLayerTilemap {
    pub layer: ItemLayer,
    pub version: i32,
    pub width: i32,
    pub height: i32,
    pub flags: i32,
    pub color: Color,
    pub color_env: i32,
    pub color_env_offset: i32,
    pub image: i32,
    pub data: i32,
    pub name: String,
}

/// Current `ItemLayerTilemap::version`.
pub const ITEM_LAYER_TILEMAP_CURRENT_VERSION: i32 = 4;

impl ItemLayerTilemap {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        let layer = ItemLayer {
            version: r.i32(),
            layer_type: r.i32(),
            flags: r.i32(),
        };
        Self {
            layer,
            version: r.i32(),
            width: r.i32(),
            height: r.i32(),
            flags: r.i32(),
            color: Color {
                r: r.i32(),
                g: r.i32(),
                b: r.i32(),
                a: r.i32(),
            },
            color_env: r.i32(),
            color_env_offset: r.i32(),
            image: r.i32(),
            data: r.i32(),
            name: r.name(3),
        }
    }

    #[must_use]
    pub fn tiles_flags(&self) -> TilesLayerFlags {
        TilesLayerFlags::from_bits_truncate(self.flags)
    }
}

/// A quad layer (`LayerType::Quads`). `data` is the index of a data blob
/// holding `num_quads` [`Quad`]s.
#[derive(Debug, Default, Clone)]
pub struct ItemLayerQuads {
    pub layer: ItemLayer,
    pub version: i32,
    pub num_quads: i32,
    pub data: i32,
    pub image: i32,
    pub name: String,
}

/// Current `ItemLayerQuads::version`.
pub const ITEM_LAYER_QUADS_CURRENT_VERSION: i32 = 2;

impl ItemLayerQuads {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        let layer = ItemLayer {
            version: r.i32(),
            layer_type: r.i32(),
            flags: r.i32(),
        };
        Self {
            layer,
            version: r.i32(),
            num_quads: r.i32(),
            data: r.i32(),
            image: r.i32(),
            name: r.name(3),
        }
    }
}

/// `MAPITEMTYPE_ENVPOINTS` (type 6): a flat array of points shared by all
/// envelopes in the map, indexed by `ItemEnvelope::start_point`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvPoint {
    /// Time of this point, in milliseconds.
    pub time: i32,
    pub curve_type: i32,
    /// 1-4 channel values (22.10 fixed point), depending on the owning
    /// envelope's channel count.
    pub values: [i32; 4],
    /// Bezier tangent controls; zero unless the owning envelope has
    /// `version >= 3`.
    pub in_tangent_dx: [i32; 4],
    pub in_tangent_dy: [i32; 4],
    pub out_tangent_dx: [i32; 4],
    pub out_tangent_dy: [i32; 4],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(i32)]
/// Interpolation used between consecutive [`EnvPoint`]s.
pub enum CurveType {
    #[default]
    Step = 0,
    Linear = 1,
    Slow = 2,
    Fast = 3,
    Smooth = 4,
    Bezier = 5,
}

impl EnvPoint {
    /// Reads one [`EnvPoint`] from `reader`, which may be positioned in
    /// the middle of a larger `EnvPoints` data blob.
    fn read(r: &mut FieldReader<'_>) -> Self {
        Self {
            time: r.i32(),
            curve_type: r.i32(),
            values: [r.i32(), r.i32(), r.i32(), r.i32()],
            in_tangent_dx: [r.i32(), r.i32(), r.i32(), r.i32()],
            in_tangent_dy: [r.i32(), r.i32(), r.i32(), r.i32()],
            out_tangent_dx: [r.i32(), r.i32(), r.i32(), r.i32()],
            out_tangent_dy: [r.i32(), r.i32(), r.i32(), r.i32()],
        }
    }

    #[must_use]
    pub fn curve(&self) -> CurveType {
        CurveType::try_from_primitive(self.curve_type).unwrap_or(CurveType::Step)
    }
}

/// Decodes a raw `EnvPoints` data blob into individual points.
///
/// Envelopes with `version < 3` only persist the first 6 `i32`s (`time`,
/// `curve_type`, `values`) per point; the four bezier tangent arrays are
/// zero-filled in that case.
#[must_use]
pub fn read_env_points(blob: &[u8], bezier: bool) -> Vec<EnvPoint> {
    let point_size = if bezier { 22 * 4 } else { 6 * 4 };
    blob.chunks_exact(point_size)
        .map(|chunk| EnvPoint::read(&mut FieldReader::new(chunk)))
        .collect()
}

/// `MAPITEMTYPE_ENVELOPE` (type 3). `version < 2` has no `synchronized`
/// field; `version < 3` envelopes' points have no bezier tangents.
#[derive(Debug, Default, Clone)]
pub struct ItemEnvelope {
    pub version: i32,
    pub channels: i32,
    pub start_point: i32,
    pub num_points: i32,
    pub name: String,
    /// Present from version 2 onward.
    pub synchronized: i32,
}

/// Current `ItemEnvelope::version`.
pub const ITEM_ENVELOPE_CURRENT_VERSION: i32 = 3;

impl ItemEnvelope {
    #[must_use]
    pub fn read(payload: &[u8]) -> Self {
        let mut r = FieldReader::new(payload);
        Self {
            version: r.i32(),
            channels: r.i32(),
            start_point: r.i32(),
            num_points: r.i32(),
            name: r.name(8),
            synchronized: r.i32(),
        }
    }

    /// Whether this envelope's points carry bezier tangent data.
    #[must_use]
    pub fn has_bezier_points(&self) -> bool {
        self.version >= 3
    }
}

/// A 22.10 fixed-point 2D point, used for quad corners and texture
/// coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// RGBA color, 0-255 per channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub a: i32,
}

/// A single quad: a 5-point fan (4 corners + a pivot), 4 per-corner
/// colors and texture coordinates, and optional position/color envelope
/// bindings.
#[derive(Debug, Default, Clone, Copy)]
pub struct Quad {
    pub points: [Point; 5],
    pub colors: [Color; 4],
    pub texcoords: [Point; 4],
    pub pos_env: i32,
    pub pos_env_offset: i32,
    pub color_env: i32,
    pub color_env_offset: i32,
}

/// Size in bytes of one [`Quad`] in its raw data blob form.
pub const QUAD_SIZE: usize = (5 * 2 + 4 * 4 + 4 * 2 + 4) * 4;

/// Decodes a raw quad-layer data blob into individual quads.
#[must_use]
pub fn read_quads(blob: &[u8]) -> Vec<Quad> {
    blob.chunks_exact(QUAD_SIZE)
        .map(|chunk| {
            let mut r = FieldReader::new(chunk);
            let points = std::array::from_fn(|_| Point {
                x: r.i32(),
                y: r.i32(),
            });
            let colors = std::array::from_fn(|_| Color {
                r: r.i32(),
                g: r.i32(),
                b: r.i32(),
                a: r.i32(),
            });
            let texcoords = std::array::from_fn(|_| Point {
                x: r.i32(),
                y: r.i32(),
            });
            Quad {
                points,
                colors,
                texcoords,
                pos_env: r.i32(),
                pos_env_offset: r.i32(),
                color_env: r.i32(),
                color_env_offset: r.i32(),
            }
        })
        .collect()
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    /// Per-tile rendering flags.
    pub struct TileFlags: u8 {
        const VFLIP = 1;
        const HFLIP = 2;
        const OPAQUE = 4;
        const ROTATE = 8;
    }
}

/// A single tile in an expanded (non-RLE) tile layer.
///
/// `skip` is always `0` once a tile layer's data blob has been expanded
/// by [`crate::map::MapFile::open`]; it only carries meaning in the
/// compressed on-disk representation, where it counts how many further
/// tiles repeat this one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub index: u8,
    pub flags: u8,
    pub skip: u8,
    pub reserved: u8,
}

impl Tile {
    /// Size in bytes of one [`Tile`], on disk and expanded alike.
    pub const SIZE: usize = 4;

    #[must_use]
    pub fn tile_flags(&self) -> TileFlags {
        TileFlags::from_bits_truncate(self.flags)
    }
}

/// The first entity tile index; entity tile indices below this belong to
/// the ordinary tileset instead.
pub const ENTITY_OFFSET: u8 = 255 - 16 * 4;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
/// Game-layer entity kinds, encoded as `ENTITY_OFFSET + variant` in a
/// game layer's tile indices.
pub enum EntityKind {
    #[default]
    None = 0,
    Spawn = 1,
    SpawnRed = 2,
    SpawnBlue = 3,
    FlagstandRed = 4,
    FlagstandBlue = 5,
    Armor = 6,
    Health = 7,
    WeaponShotgun = 8,
    WeaponGrenade = 9,
    PowerupNinja = 10,
    WeaponLaser = 11,
}

impl EntityKind {
    /// Interprets a game-layer tile index as an [`EntityKind`], returning
    /// [`None`](EntityKind::None) for ordinary (non-entity) tiles and for
    /// entity indices this crate doesn't recognize.
    #[must_use]
    pub fn from_tile_index(index: u8) -> Self {
        index
            .checked_sub(ENTITY_OFFSET)
            .and_then(|offset| EntityKind::try_from_primitive(offset).ok())
            .unwrap_or(EntityKind::None)
    }
}
