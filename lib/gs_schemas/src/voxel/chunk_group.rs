//! In-memory representation of a group of loaded chunks

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::codec::header::{DescriptorReader, DescriptorWriter, FileHeader};
use crate::codec::{ByteStreamReader, ByteStreamWriter, CodecResult};
use crate::coordinates::AbsChunkPos;
use crate::mutwatcher::MutWatcher;
use crate::registry::Registry;
use crate::voxel::block::BlockDescriptor;
use crate::voxel::chunk::{Chunk, ChunkDeserializationError};
use crate::voxel::neighborhood::OptionalChunkRefNeighborhood;
use crate::GsExtraData;

/// A group of loaded chunks in memory, for example a planet, or a movable contraption.
#[derive(Clone)]
pub struct ChunkGroup<ExtraData: GsExtraData> {
    /// Chunk storage.
    pub chunks: BTreeMap<AbsChunkPos, MutWatcher<Chunk<ExtraData>>>,
    /// Extra data as needed by the user API
    pub extra_data: ExtraData::GroupData,
}

impl<ED: GsExtraData> Default for ChunkGroup<ED>
where
    <ED as GsExtraData>::GroupData: Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<ED: GsExtraData> ChunkGroup<ED> {
    /// Constructs an empty chunk group.
    pub fn new() -> Self
    where
        ED::GroupData: Default,
    {
        Self::with_data(Default::default())
    }

    /// Constructs an empty chunk group with the given per-group data.
    pub fn with_data(data: ED::GroupData) -> Self {
        Self {
            chunks: BTreeMap::default(),
            extra_data: data,
        }
    }

    /// Provides a convenient accessor for a chunk and all its neighbors.
    pub fn get_neighborhood_around(&self, center: AbsChunkPos) -> OptionalChunkRefNeighborhood<ED> {
        OptionalChunkRefNeighborhood::from_center(center, |coord| self.chunks.get(&coord))
    }

    /// Accesses the chunk at the given position if loaded.
    #[inline]
    pub fn get_chunk(&self, pos: AbsChunkPos) -> Option<&MutWatcher<Chunk<ED>>> {
        self.chunks.get(&pos)
    }

    /// Writes every loaded chunk's block grid to a save file or full-state dump (spec §8's
    /// save-file format): a [`FileHeader`], the chunk count, then each chunk's position followed
    /// by its [`Chunk::write_full`] body, all sharing one [`DescriptorWriter`] table so a
    /// descriptor name referenced by many chunks is only spelled out once per file.
    pub fn write_full(&self, w: &mut impl Write, registry: &Registry<BlockDescriptor>) -> CodecResult<()> {
        FileHeader::CURRENT.write(w)?;
        let mut descriptors = DescriptorWriter::new();
        w.write_u32(self.chunks.len() as u32)?;
        for (&pos, chunk) in &self.chunks {
            w.write_i32(pos.x)?;
            w.write_i32(pos.y)?;
            chunk.read().write_full(w, &mut descriptors, registry)?;
        }
        Ok(())
    }

    /// Reads a [`Self::write_full`] dump back into a fresh chunk group. `group_data` becomes the
    /// new group's own extra data; `chunk_data` is called once per loaded chunk (with that
    /// chunk's position) to mint its per-chunk extra data, since that payload isn't part of the
    /// on-disk format (spec §8 leaves chunk body layout to the implementation; per-chunk `extra`
    /// block data is likewise out of scope, matching [`Chunk::write_full`]'s own contract).
    pub fn read_full(
        r: &mut impl Read,
        registry: &Registry<BlockDescriptor>,
        group_data: ED::GroupData,
        mut chunk_data: impl FnMut(AbsChunkPos) -> ED::ChunkData,
    ) -> Result<Self, ChunkDeserializationError> {
        FileHeader::read_current(r)?;
        let mut descriptors = DescriptorReader::new();
        let count = r.read_u32()?;
        let mut chunks = BTreeMap::new();
        for _ in 0..count {
            let x = r.read_i32()?;
            let y = r.read_i32()?;
            let pos = AbsChunkPos::new(x, y);
            let chunk = Chunk::read_full(r, &mut descriptors, registry, chunk_data(pos))?;
            chunks.insert(pos, MutWatcher::new(chunk));
        }
        Ok(Self {
            chunks,
            extra_data: group_data,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::light::LightProperties;
    use crate::voxel::block::BlockData;

    #[derive(Clone, Debug, Default, Eq, PartialEq)]
    struct NoData;
    impl GsExtraData for NoData {
        type ChunkData = ();
        type GroupData = ();
    }

    fn registry_with_stone() -> (Registry<BlockDescriptor>, crate::registry::RegistryId) {
        let mut reg = Registry::new();
        let id = reg.push_object(BlockDescriptor::new("core:stone", LightProperties::OPAQUE, true)).unwrap();
        (reg, id)
    }

    #[test]
    fn write_read_full_roundtrips_every_chunk_at_its_position() {
        let (reg, id) = registry_with_stone();
        let mut group = ChunkGroup::<NoData>::new();
        for pos in [AbsChunkPos::new(0, 0), AbsChunkPos::new(-1, 3), AbsChunkPos::new(5, -2)] {
            let mut chunk = Chunk::<NoData>::new(BlockData::default(), ());
            chunk.put(crate::coordinates::InChunkPos::try_from_index(0).unwrap(), BlockData::new(id));
            group.chunks.insert(pos, MutWatcher::new(chunk));
        }

        let mut buf = Vec::new();
        group.write_full(&mut buf, &reg).unwrap();

        let read_back = ChunkGroup::<NoData>::read_full(&mut &buf[..], &reg, (), |_| ()).unwrap();
        assert_eq!(read_back.chunks.len(), 3);
        for pos in [AbsChunkPos::new(0, 0), AbsChunkPos::new(-1, 3), AbsChunkPos::new(5, -2)] {
            let chunk = read_back.get_chunk(pos).expect("chunk missing after roundtrip");
            assert_eq!(chunk.read().get(crate::coordinates::InChunkPos::try_from_index(0).unwrap()).descriptor, Some(id));
        }
    }

    #[test]
    fn read_full_rejects_bad_magic() {
        let buf = [0u8; 16];
        let (reg, _) = registry_with_stone();
        assert!(ChunkGroup::<NoData>::read_full(&mut &buf[..], &reg, (), |_| ()).is_err());
    }

    #[test]
    fn read_full_rejects_unknown_descriptor() {
        let (reg, id) = registry_with_stone();
        let mut group = ChunkGroup::<NoData>::new();
        let mut chunk = Chunk::<NoData>::new(BlockData::default(), ());
        chunk.put(crate::coordinates::InChunkPos::try_from_index(0).unwrap(), BlockData::new(id));
        group.chunks.insert(AbsChunkPos::new(0, 0), MutWatcher::new(chunk));

        let mut buf = Vec::new();
        group.write_full(&mut buf, &reg).unwrap();

        let empty_reg = Registry::<BlockDescriptor>::new();
        assert!(ChunkGroup::<NoData>::read_full(&mut &buf[..], &empty_reg, (), |_| ()).is_err());
    }
}
