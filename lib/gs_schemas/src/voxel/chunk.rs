//! Representation of a single full-height chunk column of voxel data.

use std::io::{Read, Write};

use hashbrown::HashMap;

use crate::codec::header::{DescriptorReader, DescriptorWriter};
use crate::codec::{ByteStreamReader, ByteStreamWriter, CodecError, CodecResult};
use crate::coordinates::InChunkPos;
use crate::light::Lighting;
use crate::registry::{Registry, RegistryId};
use crate::voxel::block::{BlockData, BlockDescriptor, BlockExtra};
use crate::voxel::chunk_storage::{ChunkStorage, PaletteStorage};
use crate::GsExtraData;

/// A [`Copy`]able stand-in for [`BlockData`] used as the [`PaletteStorage`] element type.
/// [`BlockData`] itself can't live in a palette because its optional `extra` payload is a
/// reference-counted trait object, not a plain value; the `extra` side data for any cell that
/// carries it lives in [`Chunk::extra_cells`] instead, keyed by in-chunk index, outside the
/// palette-compressed representation entirely.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
struct BlockCell {
    descriptor: Option<RegistryId>,
    idata: i32,
    light: Lighting,
}

impl BlockCell {
    fn from_data(data: &BlockData) -> Self {
        Self {
            descriptor: data.descriptor,
            idata: data.idata,
            light: data.light,
        }
    }

    fn into_data(self, extra: Option<BlockExtra>) -> BlockData {
        BlockData {
            descriptor: self.descriptor,
            idata: self.idata,
            light: self.light,
            extra,
        }
    }
}

/// A full-height (16×256×16) column of voxel data.
#[derive(Clone)]
pub struct Chunk<ExtraData: GsExtraData> {
    cells: PaletteStorage<BlockCell>,
    /// Extra per-cell data, present only for the (rare) cells that carry it. Not part of the
    /// palette so that attaching extra data to one cell never forces every other cell sharing its
    /// descriptor out of the singleton/small-palette fast path.
    extra_cells: HashMap<u16, BlockExtra>,
    /// Any extra per-chunk data needed by the API user.
    pub extra_data: ExtraData::ChunkData,
}

/// Extra-data payloads are reference-counted trait objects with no general equality, so chunk
/// equality (used by tests and change detection) only compares the block grid and chunk-level
/// extra data, mirroring [`BlockData`]'s own equality.
impl<ExtraData: GsExtraData> PartialEq for Chunk<ExtraData>
where
    ExtraData::ChunkData: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.cells == other.cells && self.extra_data == other.extra_data
    }
}

impl<ExtraData: GsExtraData> Eq for Chunk<ExtraData> where ExtraData::ChunkData: Eq {}

/// Error during chunk deserialization.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ChunkDeserializationError {
    /// Low level data encoding error.
    #[error("chunk data encoding error: {0}")]
    Codec(#[from] CodecError),
    /// A descriptor referenced by the stream does not resolve to an object in the block registry
    /// passed to the reader.
    #[error("unknown block descriptor {0:?} referenced by chunk data")]
    UnknownDescriptor(String),
}

impl<ExtraData: GsExtraData> Chunk<ExtraData> {
    /// Creates a new chunk filled with `fill_block` and the given extra data.
    pub fn new(fill_block: BlockData, extra_data: ExtraData::ChunkData) -> Self {
        Self {
            cells: PaletteStorage::new(BlockCell::from_data(&fill_block)),
            extra_cells: HashMap::new(),
            extra_data,
        }
    }

    /// Reads the block at the given in-chunk position.
    pub fn get(&self, position: InChunkPos) -> BlockData {
        let cell = self.cells.get_copy(position);
        let extra = self.extra_cells.get(&(position.as_index() as u16)).cloned();
        cell.into_data(extra)
    }

    /// Writes the block at the given in-chunk position, returning the previous value.
    pub fn put(&mut self, position: InChunkPos, new_value: BlockData) -> BlockData {
        let idx = position.as_index() as u16;
        let old_cell = self.cells.put(position, BlockCell::from_data(&new_value));
        let old_extra = match new_value.extra {
            Some(extra) => self.extra_cells.insert(idx, extra),
            None => self.extra_cells.remove(&idx),
        };
        old_cell.into_data(old_extra)
    }

    /// Writes a full copy of the chunk's block grid, using `descriptors` to intern block names by
    /// first reference rather than re-emitting the full name for every palette entry. The
    /// per-cell `extra` payload is not part of this encoding: it is open-ended content-mod data
    /// outside the core's wire format, and is left for callers that know its concrete type to
    /// serialize alongside this call.
    pub fn write_full(
        &self,
        w: &mut impl Write,
        descriptors: &mut DescriptorWriter,
        registry: &Registry<BlockDescriptor>,
    ) -> CodecResult<()> {
        let palette = self.cells.serialized_palette();
        let data = self.cells.serialized_data();
        w.write_u32(palette.len() as u32)?;
        for cell in palette {
            match cell.descriptor.and_then(|id| registry.lookup_id_to_object(id).map(|obj| (id, obj))) {
                Some((_, obj)) => {
                    w.write_bool(true)?;
                    descriptors.write_ref(w, obj.name.as_str())?;
                }
                None => w.write_bool(false)?,
            }
            w.write_i32(cell.idata)?;
            w.write_u16(cell.light.as_packed())?;
        }
        w.write_u32(data.len() as u32)?;
        for &idx in data {
            w.write_u16(idx)?;
        }
        Ok(())
    }

    /// Reads a fully serialized chunk's block grid, resolving interned block names against
    /// `registry`. The caller is responsible for separately restoring any per-cell `extra`
    /// payloads and attaching them with [`Chunk::put`].
    pub fn read_full(
        r: &mut impl Read,
        descriptors: &mut DescriptorReader,
        registry: &Registry<BlockDescriptor>,
        extra_data: ExtraData::ChunkData,
    ) -> Result<Self, ChunkDeserializationError> {
        let palette_len = r.read_u32()? as usize;
        let mut palette = smallvec::SmallVec::<[BlockCell; 16]>::with_capacity(palette_len);
        for _ in 0..palette_len {
            let descriptor = if r.read_bool()? {
                let name = descriptors.read_ref(r)?.to_owned();
                let (id, _) = registry
                    .lookup_name_to_object(kstring::KStringRef::from_ref(name.as_str()))
                    .ok_or(ChunkDeserializationError::UnknownDescriptor(name))?;
                Some(id)
            } else {
                None
            };
            let idata = r.read_i32()?;
            let light = Lighting::from_packed(r.read_u16()?).unwrap_or_default();
            palette.push(BlockCell {
                descriptor,
                idata,
                light,
            });
        }
        let data_len = r.read_u32()? as usize;
        let mut data = smallvec::SmallVec::<[u16; 1]>::with_capacity(data_len);
        for _ in 0..data_len {
            data.push(r.read_u16()?);
        }

        let cells = PaletteStorage::from_serialized(crate::SmallCowVec::Owned(palette), crate::SmallCowVec::Owned(data))
            .map_err(|e| ChunkDeserializationError::UnknownDescriptor(format!("malformed palette data: {e}")))?;

        Ok(Self {
            cells,
            extra_cells: HashMap::new(),
            extra_data,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::light::LightProperties;

    fn registry_with_stone() -> (Registry<BlockDescriptor>, RegistryId) {
        let mut reg = Registry::new();
        let id = reg
            .push_object(BlockDescriptor::new("core:stone", LightProperties::OPAQUE, true))
            .unwrap();
        (reg, id)
    }

    #[derive(Clone, Debug, Default, Eq, PartialEq)]
    struct NoData;
    impl GsExtraData for NoData {
        type ChunkData = ();
        type GroupData = ();
    }

    #[test]
    fn new_chunk_is_uniformly_filled() {
        let (_reg, id) = registry_with_stone();
        let chunk = Chunk::<NoData>::new(BlockData::new(id), ());
        let pos = InChunkPos::try_from_index(1234).unwrap();
        assert!(chunk.get(pos).good());
        assert_eq!(chunk.get(pos).descriptor, Some(id));
    }

    #[test]
    fn put_then_get_roundtrips() {
        let (_reg, id) = registry_with_stone();
        let mut chunk = Chunk::<NoData>::new(BlockData::default(), ());
        let pos = InChunkPos::try_from_index(42).unwrap();
        let mut block = BlockData::new(id);
        block.idata = 7;
        chunk.put(pos, block);
        let read_back = chunk.get(pos);
        assert_eq!(read_back.descriptor, Some(id));
        assert_eq!(read_back.idata, 7);
    }

    #[test]
    fn write_read_full_roundtrips_descriptors() {
        let (reg, id) = registry_with_stone();
        let mut chunk = Chunk::<NoData>::new(BlockData::default(), ());
        chunk.put(InChunkPos::try_from_index(0).unwrap(), BlockData::new(id));

        let mut buf = Vec::new();
        let mut writer = DescriptorWriter::new();
        chunk.write_full(&mut buf, &mut writer, &reg).unwrap();

        let mut reader = DescriptorReader::new();
        let read_back = Chunk::<NoData>::read_full(&mut &buf[..], &mut reader, &reg, ()).unwrap();
        assert_eq!(read_back.get(InChunkPos::try_from_index(0).unwrap()).descriptor, Some(id));
        assert!(!read_back.get(InChunkPos::try_from_index(1).unwrap()).good());
    }
}
