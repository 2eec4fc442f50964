//! A collection of strongly typed newtype wrappers for the various coordinate formats within the game's world and related constants.

use std::fmt::{Display, Formatter};
use std::ops::{Add, Deref};

use bytemuck::{Pod, Zeroable};
use glam::{IVec2, IVec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a side of a block in meters.
pub const BLOCK_DIM: f32 = 1.0;

/// Width and depth of a chunk column in blocks. Chunks are not subdivided vertically:
/// a single chunk spans the whole world height.
pub const CHUNK_SIZE: i32 = 16;
/// [`CHUNK_SIZE`] as a `usize`.
pub const CHUNK_SIZEZ: usize = CHUNK_SIZE as usize;
/// Height of the world, and therefore of every chunk column, in blocks.
pub const CHUNK_HEIGHT: i32 = 256;
/// [`CHUNK_HEIGHT`] as a `usize`.
pub const CHUNK_HEIGHTZ: usize = CHUNK_HEIGHT as usize;
/// Number of blocks in a single horizontal layer of a chunk.
pub const CHUNK_LAYER: i32 = CHUNK_SIZE * CHUNK_SIZE;
/// [`CHUNK_LAYER`] as a `usize`.
pub const CHUNK_LAYERZ: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;
/// Number of blocks in the volume of a whole chunk column.
pub const CHUNK_DIM3: i32 = CHUNK_LAYER * CHUNK_HEIGHT;
/// [`CHUNK_DIM3`] as a `usize`.
pub const CHUNK_DIM3Z: usize = (CHUNK_LAYER * CHUNK_HEIGHT) as usize;
/// Maximum block position allowed on a horizontal axis, +-2^30 to have a safe margin against
/// integer overflows.
pub const MAX_BLOCK_POS: i32 = 1 << 30;
/// [`MAX_BLOCK_POS`] converted to the unit of chunks.
pub const MAX_CHUNK_POS: i32 = MAX_BLOCK_POS / CHUNK_SIZE;

/// Identifies one of the independent voxel worlds a server may host (the overworld, a nether-like
/// dimension, ...). Dimensions never share chunks, entities or lighting state with each other.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct Dimension(pub u32);

impl Dimension {
    /// The dimension every new world starts with.
    pub const OVERWORLD: Self = Self(0);

    /// Constructs a dimension id from a raw number.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl Display for Dimension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dimension({})", self.0)
    }
}

/// A dimension-tagged absolute integer block position, as used for block lookups, chunk
/// addressing and anything that must land exactly on a block boundary.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct PositionI {
    pub dimension: Dimension,
    pub pos: AbsBlockPos,
}

impl PositionI {
    /// Constructs a new dimension-tagged integer position.
    #[inline]
    pub const fn new(dimension: Dimension, pos: AbsBlockPos) -> Self {
        Self { dimension, pos }
    }
}

impl Display for PositionI {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.pos, self.dimension)
    }
}

/// A dimension-tagged floating-point world position, used for entities and physics objects that
/// do not sit exactly on block boundaries.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct PositionF {
    pub dimension: Dimension,
    pub pos: glam::DVec3,
}

impl PositionF {
    /// Constructs a new dimension-tagged floating-point position.
    #[inline]
    pub const fn new(dimension: Dimension, pos: glam::DVec3) -> Self {
        Self { dimension, pos }
    }

    /// Rounds down to the block this position currently occupies.
    #[inline]
    pub fn block_position(&self) -> PositionI {
        PositionI::new(
            self.dimension,
            AbsBlockPos::new(
                self.pos.x.floor() as i32,
                self.pos.y.floor() as i32,
                self.pos.z.floor() as i32,
            ),
        )
    }
}

impl Display for PositionF {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})@{}", self.pos.x, self.pos.y, self.pos.z, self.dimension)
    }
}

// xx zz -> xzxz bit pattern
/// Slower reference implementation of [`zpack_2d`], public for benchmark and test purposes.
pub fn zpack_2d_naive(vec: IVec2) -> u64 {
    let vec = vec.as_uvec2();
    let x = vec.x;
    let z = vec.y;
    let mut out = 0u64;
    for bit in 0..32 {
        let bit_mask = 1 << bit;
        let z_set = (z & bit_mask) != 0;
        let x_set = (x & bit_mask) != 0;
        if z_set {
            out |= 1u64 << (2 * bit);
        }
        if x_set {
            out |= 1u64 << (2 * bit + 1);
        }
    }
    out
}

/// Converts a 2d vector of ints to an XZ Z-order curve packed 64-bit integer by interleaving the
/// bits. Provides spatial locality for sorted chunk column coordinates.
/// See [Z-order curves](https://en.wikipedia.org/wiki/Z-order_curve).
#[inline]
pub fn zpack_2d(vec: IVec2) -> u64 {
    fn spread(mut v: u64) -> u64 {
        v &= 0x0000_0000_FFFF_FFFF;
        v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF;
        v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF;
        v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
        v = (v | (v << 2)) & 0x3333_3333_3333_3333;
        v = (v | (v << 1)) & 0x5555_5555_5555_5555;
        v
    }
    let vec = vec.as_uvec2();
    let x = spread(vec.x as u64);
    let z = spread(vec.y as u64);
    (x << 1) | z
}

/// Restores a 2d vector of ints from an XZ Z-order curve packed 64-bit integer. See [`zpack_2d`].
#[inline]
pub fn zunpack_2d(idx: u64) -> IVec2 {
    fn compact(mut v: u64) -> u32 {
        v &= 0x5555_5555_5555_5555;
        v = (v | (v >> 1)) & 0x3333_3333_3333_3333;
        v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
        v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF;
        v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF;
        v = (v | (v >> 16)) & 0x0000_0000_FFFF_FFFF;
        v as u32
    }
    let x = compact(idx >> 1);
    let z = compact(idx);
    IVec2::new(x as i32, z as i32)
}

/// Converts a 3d vector of ints to a XYZ Z-order curve packed 128-bit integer by interleaving the
/// bits. Used for block positions, whose y range (chunk height) is much wider than x/z, so only
/// the block-level packing needs a true 3-way interleave; chunk columns use [`zpack_2d`] instead.
#[inline]
pub fn zpack_3d(vec: IVec3) -> u128 {
    fn spread(mut v: u128) -> u128 {
        v &= 0x3FFF_FFFF;
        v = (v | (v << 32)) & 0x0000_0000_FFFF_0000_0000_FFFF;
        v = (v | (v << 16)) & 0x0000_FFFF_0000_FFFF_0000_FFFF;
        v = (v | (v << 8)) & 0x00FF_00FF_00FF_00FF_00FF_00FF;
        v = (v | (v << 4)) & 0x0F0F_0F0F_0F0F_0F0F_0F0F_0F0F;
        v = (v | (v << 2)) & 0x3333_3333_3333_3333_3333_3333;
        v = (v | (v << 1)) & 0x5555_5555_5555_5555_5555_5555;
        v
    }
    let vec = vec.as_uvec3();
    let x = spread(vec.x as u128);
    let y = spread(vec.y as u128);
    let z = spread(vec.z as u128);
    (x << 2) | (y << 1) | z
}

/// Slower reference implementation of [`zpack_3d`], public for benchmark and test purposes.
pub fn zpack_3d_naive(vec: IVec3) -> u128 {
    let vec = vec.as_uvec3();
    let mut out: u128 = 0;
    for bit in 0..30 {
        out |= (((vec.x >> bit) & 1) as u128) << (3 * bit + 2);
        out |= (((vec.y >> bit) & 1) as u128) << (3 * bit + 1);
        out |= (((vec.z >> bit) & 1) as u128) << (3 * bit);
    }
    out
}

/// Restores a 3d vector of ints from a XYZ Z-order curve packed 128-bit integer. See [`zpack_3d`].
#[inline]
pub fn zunpack_3d(idx: u128) -> IVec3 {
    fn compact(mut v: u128) -> u32 {
        v &= 0x5555_5555_5555_5555_5555_5555;
        v = (v | (v >> 1)) & 0x3333_3333_3333_3333_3333_3333;
        v = (v | (v >> 2)) & 0x0F0F_0F0F_0F0F_0F0F_0F0F_0F0F;
        v = (v | (v >> 4)) & 0x00FF_00FF_00FF_00FF_00FF_00FF;
        v = (v | (v >> 8)) & 0x0000_FFFF_0000_FFFF_0000_FFFF;
        v = (v | (v >> 16)) & 0x0000_0000_FFFF_0000_0000_FFFF;
        v = (v | (v >> 32)) & 0x3FFF_FFFF;
        v as u32
    }
    let x = compact(idx >> 2);
    let y = compact(idx >> 1);
    let z = compact(idx);
    IVec3::new(x as i32, y as i32, z as i32)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("Given coordinates were outside of chunk boundaries: {0}")]
/// Error when the given coordinates are outside of the chunk boundary.
pub struct InChunkVecError(IVec3);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("Given index was outside of chunk boundaries: {0}")]
/// Error when the given block index is outside of the chunk boundary.
pub struct InChunkIndexError(usize);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// A block position inside of a chunk: x/z limited to 0..[`CHUNK_SIZE`], y limited to 0..[`CHUNK_HEIGHT`].
pub struct InChunkPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
/// A range of block positions inside of a chunk (min&max are *inclusive*).
pub struct InChunkRange {
    pub(crate) min: InChunkPos,
    pub(crate) max: InChunkPos,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// An absolute chunk column position (x, z only — chunks span the full world height).
pub struct AbsChunkPos(pub(crate) IVec2);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// A chunk column position relative to another chunk column position.
pub struct RelChunkPos(pub(crate) IVec2);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// An absolute block position in a voxel world.
pub struct AbsBlockPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// A block position relative to another block position.
pub struct RelBlockPos(pub(crate) IVec3);

// === Utils
macro_rules! impl_simple_ivec3_newtype {
    ($T:ident) => {
        impl $T {
            /// (0, 0, 0)
            pub const ZERO: Self = Self(IVec3::ZERO);
            /// (1, 1, 1)
            pub const ONE: Self = Self(IVec3::ONE);
            /// (1, 0, 0)
            pub const X: Self = Self(IVec3::X);
            /// (0, 1, 0)
            pub const Y: Self = Self(IVec3::Y);
            /// (0, 0, 1)
            pub const Z: Self = Self(IVec3::Z);

            /// Const-friendly `from<IVec3>`
            #[inline]
            pub const fn from_ivec3(value: IVec3) -> Self {
                Self(value)
            }

            /// Const-friendly `into<IVec3>`
            #[inline]
            pub const fn into_ivec3(self) -> IVec3 {
                self.0
            }

            /// Constructs a new [`Self`] from the given coordinates.
            #[inline]
            pub const fn new(x: i32, y: i32, z: i32) -> Self {
                Self(IVec3::new(x, y, z))
            }

            /// Constructs a new [`Self`] from a given coordinate copied to all dimensions.
            #[inline]
            pub const fn splat(v: i32) -> Self {
                Self(IVec3::splat(v))
            }
        }

        impl From<IVec3> for $T {
            #[inline]
            fn from(value: IVec3) -> Self {
                Self::from_ivec3(value)
            }
        }
        impl From<$T> for IVec3 {
            #[inline]
            fn from(value: $T) -> IVec3 {
                value.into_ivec3()
            }
        }
        impl std::ops::Deref for $T {
            type Target = IVec3;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! impl_simple_ivec2_newtype {
    ($T:ident) => {
        impl $T {
            /// (0, 0)
            pub const ZERO: Self = Self(IVec2::ZERO);
            /// (1, 1)
            pub const ONE: Self = Self(IVec2::ONE);
            /// (1, 0)
            pub const X: Self = Self(IVec2::X);
            /// (0, 1)
            pub const Z: Self = Self(IVec2::Y);

            /// Const-friendly `from<IVec2>`
            #[inline]
            pub const fn from_ivec2(value: IVec2) -> Self {
                Self(value)
            }

            /// Const-friendly `into<IVec2>`
            #[inline]
            pub const fn into_ivec2(self) -> IVec2 {
                self.0
            }

            /// Constructs a new [`Self`] from the given column coordinates.
            #[inline]
            pub const fn new(x: i32, z: i32) -> Self {
                Self(IVec2::new(x, z))
            }

            /// Constructs a new [`Self`] from a given coordinate copied to both dimensions.
            #[inline]
            pub const fn splat(v: i32) -> Self {
                Self(IVec2::splat(v))
            }
        }

        impl From<IVec2> for $T {
            #[inline]
            fn from(value: IVec2) -> Self {
                Self::from_ivec2(value)
            }
        }
        impl From<$T> for IVec2 {
            #[inline]
            fn from(value: $T) -> IVec2 {
                value.into_ivec2()
            }
        }
        impl std::ops::Deref for $T {
            type Target = IVec2;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! impl_rel_abs_pair {
    ($Rel:ident, $Abs:ident) => {
        impl std::ops::Add<$Rel> for $Rel {
            type Output = $Rel;
            #[inline]
            fn add(self, rhs: Self) -> Self::Output {
                $Rel(self.0 + rhs.0)
            }
        }
        impl std::ops::Add<$Abs> for $Rel {
            type Output = $Abs;
            #[inline]
            fn add(self, rhs: $Abs) -> Self::Output {
                $Abs(self.0 + rhs.0)
            }
        }
        impl std::ops::Add<$Rel> for $Abs {
            type Output = $Abs;
            #[inline]
            fn add(self, rhs: $Rel) -> Self::Output {
                $Abs(self.0 + rhs.0)
            }
        }

        impl std::ops::Sub<$Rel> for $Rel {
            type Output = $Rel;
            #[inline]
            fn sub(self, rhs: Self) -> Self::Output {
                $Rel(self.0 - rhs.0)
            }
        }
        impl std::ops::Sub<$Abs> for $Rel {
            type Output = $Abs;
            #[inline]
            fn sub(self, rhs: $Abs) -> Self::Output {
                $Abs(self.0 - rhs.0)
            }
        }
        impl std::ops::Sub<$Rel> for $Abs {
            type Output = $Abs;
            #[inline]
            fn sub(self, rhs: $Rel) -> Self::Output {
                $Abs(self.0 - rhs.0)
            }
        }
        impl std::ops::Sub<$Abs> for $Abs {
            type Output = $Rel;
            #[inline]
            fn sub(self, rhs: $Abs) -> Self::Output {
                $Rel(self.0 - rhs.0)
            }
        }
    };
}

// === InChunkPos

impl TryFrom<IVec3> for InChunkPos {
    type Error = InChunkVecError;

    #[inline]
    fn try_from(value: IVec3) -> Result<Self, Self::Error> {
        Self::try_from_ivec3(value)
    }
}

impl From<InChunkPos> for IVec3 {
    #[inline]
    fn from(value: InChunkPos) -> IVec3 {
        value.0
    }
}

impl Deref for InChunkPos {
    type Target = IVec3;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl InChunkPos {
    /// (0, 0, 0)
    pub const ZERO: Self = Self(IVec3::ZERO);
    /// (1, 1, 1)
    pub const ONE: Self = Self(IVec3::ONE);
    /// (1, 0, 0)
    pub const X: Self = Self(IVec3::X);
    /// (0, 1, 0)
    pub const Y: Self = Self(IVec3::Y);
    /// (0, 0, 1)
    pub const Z: Self = Self(IVec3::Z);
    /// (15, 255, 15), the highest valid in-chunk position.
    pub const MAX: Self = Self(IVec3::new(CHUNK_SIZE - 1, CHUNK_HEIGHT - 1, CHUNK_SIZE - 1));

    /// Const-friendly `try_from<IVec3>`
    #[inline]
    pub const fn try_from_ivec3(v: IVec3) -> Result<Self, InChunkVecError> {
        let IVec3 { x, y, z } = v;
        if (x < 0) || (x >= CHUNK_SIZE) || (y < 0) || (y >= CHUNK_HEIGHT) || (z < 0) || (z >= CHUNK_SIZE) {
            Err(InChunkVecError(v))
        } else {
            Ok(Self(v))
        }
    }

    /// Constructs a new in-chunk position from the given coordinates, or returns an error if it's
    /// outside of chunk bounds.
    #[inline]
    pub const fn try_new(x: i32, y: i32, z: i32) -> Result<Self, InChunkVecError> {
        Self::try_from_ivec3(IVec3::new(x, y, z))
    }

    /// Convert a XZY-strided index into a chunk storage array into the coordinates.
    #[inline]
    pub const fn try_from_index(idx: usize) -> Result<Self, InChunkIndexError> {
        if idx >= CHUNK_DIM3Z {
            return Err(InChunkIndexError(idx));
        }
        let i: i32 = idx as i32;
        Ok(InChunkPos(IVec3::new(
            i % CHUNK_SIZE,
            i / CHUNK_LAYER,
            (i / CHUNK_SIZE) % CHUNK_SIZE,
        )))
    }

    /// Converts the coordinates into an XZY-strided index into the chunk storage array.
    #[inline]
    pub const fn as_index(self) -> usize {
        (self.0.x + (CHUNK_SIZE * self.0.z) + (CHUNK_LAYER * self.0.y)) as usize
    }
}

impl Add<InChunkPos> for InChunkPos {
    type Output = RelBlockPos;
    #[inline]
    fn add(self, rhs: InChunkPos) -> Self::Output {
        RelBlockPos(self.0 + rhs.0)
    }
}

// === InChunkRange
impl InChunkRange {
    /// One block range containing the block at (0,0,0).
    pub const BLOCK_AT_ZERO: Self = Self::from_corners(InChunkPos::ZERO, InChunkPos::ZERO);
    /// The whole chunk column `[(0, 0, 0), (15, 255, 15)]`.
    pub const WHOLE_CHUNK: Self = Self::from_corners(InChunkPos::ZERO, InChunkPos::MAX);

    /// Constructs a new range from two (inclusive) corner positions.
    pub const fn from_corners(a: InChunkPos, b: InChunkPos) -> Self {
        // Min/max manually implemented to allow for `const` calls
        let (min_x, max_x) = if a.0.x < b.0.x { (a.0.x, b.0.x) } else { (b.0.x, (a.0.x)) };
        let (min_y, max_y) = if a.0.y < b.0.y { (a.0.y, b.0.y) } else { (b.0.y, (a.0.y)) };
        let (min_z, max_z) = if a.0.z < b.0.z { (a.0.z, b.0.z) } else { (b.0.z, (a.0.z)) };
        let min = InChunkPos(IVec3::new(min_x, min_y, min_z));
        let max = InChunkPos(IVec3::new(max_x, max_y, max_z));
        Self { min, max }
    }

    /// Checks if the range covers the entire chunk.
    #[inline]
    pub const fn is_everything(self) -> bool {
        self.min.0.x == 0
            && self.min.0.y == 0
            && self.min.0.z == 0
            && self.max.0.x == InChunkPos::MAX.0.x
            && self.max.0.y == InChunkPos::MAX.0.y
            && self.max.0.z == InChunkPos::MAX.0.z
    }

    /// Returns the corner with the smallest coordinates.
    #[inline]
    pub const fn min(self) -> InChunkPos {
        self.min
    }

    /// Returns the corner with the largest coordinates.
    #[inline]
    pub const fn max(self) -> InChunkPos {
        self.max
    }

    /// Returns an iterator over all the coordinates inside this range, in XZY order.
    pub fn iter_xzy(self) -> impl Iterator<Item = InChunkPos> {
        itertools::iproduct!(self.min.y..=self.max.y, self.min.z..=self.max.z, self.min.x..=self.max.x)
            .map(|(y, z, x)| InChunkPos(IVec3::new(x, y, z)))
    }
}

// === AbsChunkPos
impl_simple_ivec2_newtype!(AbsChunkPos);

impl From<AbsBlockPos> for AbsChunkPos {
    fn from(value: AbsBlockPos) -> Self {
        Self::new(value.x.div_euclid(CHUNK_SIZE), value.z.div_euclid(CHUNK_SIZE))
    }
}

impl AbsChunkPos {
    /// Converts the chunk position to a Z-curve index. See [`zpack_2d`].
    #[inline]
    pub fn as_zpack(self) -> u64 {
        zpack_2d(self.0)
    }

    /// Converts the chunk position from a Z-curve index. See [`zunpack_2d`].
    #[inline]
    pub fn from_zpack(idx: u64) -> Self {
        Self(zunpack_2d(idx))
    }
}

impl Display for AbsChunkPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chunk(x={}, z={})", self.x, self.y)
    }
}

impl PartialOrd for AbsChunkPos {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AbsChunkPos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_zpack().cmp(&other.as_zpack())
    }
}

// === RelChunkPos
impl_simple_ivec2_newtype!(RelChunkPos);
impl_rel_abs_pair!(RelChunkPos, AbsChunkPos);

impl Display for RelChunkPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Chunk Difference(x={}, z={})", self.x, self.y)
    }
}

// === AbsBlockPos
impl_simple_ivec3_newtype!(AbsBlockPos);

impl From<AbsChunkPos> for AbsBlockPos {
    fn from(value: AbsChunkPos) -> Self {
        Self::new(value.x * CHUNK_SIZE, 0, value.y * CHUNK_SIZE)
    }
}

impl AbsBlockPos {
    /// Splits the block position into the coordinate of the chunk column and coordinate of the
    /// block within that column.
    pub fn split_chunk_component(self) -> (AbsChunkPos, InChunkPos) {
        (
            AbsChunkPos::new(self.x.div_euclid(CHUNK_SIZE), self.z.div_euclid(CHUNK_SIZE)),
            InChunkPos(IVec3::new(self.x.rem_euclid(CHUNK_SIZE), self.y, self.z.rem_euclid(CHUNK_SIZE))),
        )
    }

    /// Converts the block position to a Z-curve index. See [`zpack_3d`].
    #[inline]
    pub fn as_zpack(self) -> u128 {
        zpack_3d(self.0)
    }

    /// Converts the block position from a Z-curve index. See [`zunpack_3d`].
    #[inline]
    pub fn from_zpack(idx: u128) -> Self {
        Self(zunpack_3d(idx))
    }
}

impl Display for AbsBlockPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

impl PartialOrd for AbsBlockPos {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AbsBlockPos {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_zpack().cmp(&other.as_zpack())
    }
}

// === RelBlockPos
impl_simple_ivec3_newtype!(RelBlockPos);
impl_rel_abs_pair!(RelBlockPos, AbsBlockPos);

impl From<RelChunkPos> for RelBlockPos {
    fn from(value: RelChunkPos) -> Self {
        Self(IVec3::new(value.x * CHUNK_SIZE, 0, value.y * CHUNK_SIZE))
    }
}

impl Display for RelBlockPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Block Difference(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zpack_2d_matches_naive() {
        let list = [0, 1, 2, 4, 8, 16, 512, 1024, 1 << 30, i32::MAX, -1, -128, 321];
        for x in list {
            for z in list {
                let v = IVec2::new(x, z);
                assert_eq!(zpack_2d_naive(v), zpack_2d(v), "mismatch for {v}");
            }
        }
    }

    #[test]
    fn zpack_2d_roundtrips() {
        for x in [0, 1, 15, 16, 1000, i32::MAX, -1, -1000] {
            for z in [0, 1, 15, 16, 1000, i32::MAX, -1, -1000] {
                let v = IVec2::new(x, z);
                assert_eq!(v.as_uvec2(), zunpack_2d(zpack_2d(v)).as_uvec2());
            }
        }
    }

    #[test]
    fn zpack_3d_matches_naive() {
        let list = [0, 1, 2, 4, 8, 16, 512, 1 << 29, -1, -128, 321];
        for x in list {
            for y in list {
                for z in list {
                    let v = IVec3::new(x, y, z);
                    assert_eq!(zpack_3d_naive(v), zpack_3d(v), "mismatch for {v}");
                }
            }
        }
    }

    #[test]
    fn zpack_3d_roundtrips() {
        for x in [0, 1, 15, 255, 1000, i32::MAX, -1, -1000] {
            for y in [0, 1, 255, 1000] {
                for z in [0, 1, 15, 255, i32::MAX, -1] {
                    let v = IVec3::new(x, y, z);
                    assert_eq!(v.as_uvec3(), zunpack_3d(zpack_3d(v)).as_uvec3());
                }
            }
        }
    }

    #[quickcheck_macros::quickcheck]
    fn zpack_3d_roundtrips_for_any_vector(x: i16, y: i16, z: i16) -> bool {
        let v = IVec3::new(x as i32, y as i32, z as i32);
        v.as_uvec3() == zunpack_3d(zpack_3d(v)).as_uvec3()
    }

    #[test]
    fn in_chunk_pos_index_roundtrip() {
        for idx in [0usize, 1, 15, 16, 255, CHUNK_LAYERZ, CHUNK_DIM3Z - 1] {
            let pos = InChunkPos::try_from_index(idx).unwrap();
            assert_eq!(pos.as_index(), idx);
        }
    }

    #[test]
    fn in_chunk_pos_rejects_out_of_range() {
        assert!(InChunkPos::try_new(-1, 0, 0).is_err());
        assert!(InChunkPos::try_new(CHUNK_SIZE, 0, 0).is_err());
        assert!(InChunkPos::try_new(0, CHUNK_HEIGHT, 0).is_err());
        assert!(InChunkPos::try_new(0, 0, CHUNK_SIZE).is_err());
        assert!(InChunkPos::try_new(CHUNK_SIZE - 1, CHUNK_HEIGHT - 1, CHUNK_SIZE - 1).is_ok());
    }

    #[test]
    fn split_and_rejoin_block_position() {
        let pos = AbsBlockPos::new(-33, 120, 47);
        let (chunk, in_chunk) = pos.split_chunk_component();
        let rejoined = AbsBlockPos::from(chunk) + RelBlockPos::from_ivec3(in_chunk.into_ivec3());
        assert_eq!(rejoined, pos);
    }

    #[test]
    fn chunk_pos_ordering_is_consistent_with_zpack() {
        let a = AbsChunkPos::new(1, 2);
        let b = AbsChunkPos::new(3, 1);
        assert_eq!(a.cmp(&b), a.as_zpack().cmp(&b.as_zpack()));
    }
}
