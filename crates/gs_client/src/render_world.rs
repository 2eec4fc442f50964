//! The client-side mirror of the server's authoritative world (spec §3's `RenderObjectWorld`):
//! the chunk/entity state received over the wire, the per-chunk mesh cache, and the needed-chunks
//! set the writer thread turns into `RequestChunk` messages. Grounded on `gs_common::world::World`
//! for the `ChunkGroup`/`UpdateList` storage idiom and the teacher's own client-side voxel world
//! mirror, re-targeted from a bevy `Resource` onto a plain struct shared (behind a `Mutex`)
//! between this crate's reader and mesh-builder threads.

use gs_common::network::protocol::{RenderBlock, RenderObject};
use gs_common::prelude::*;
use gs_common::world::UpdateList;
use gs_schemas::coordinates::{AbsBlockPos, AbsChunkPos, Dimension, PositionI, RelChunkPos, CHUNK_DIM3Z};
use gs_schemas::mutwatcher::MutWatcher;
use gs_schemas::voxel::block::BlockData;
use gs_schemas::voxel::chunk::Chunk;
use gs_schemas::voxel::chunk_group::ChunkGroup;
use gs_schemas::voxel::entity::RenderObjectEntity;
use gs_schemas::GsExtraData;

use crate::meshgen::MeshData;

/// Per-chunk client-only data: the cached mesh and whether it still reflects this chunk's (and
/// its neighbors') current block data. Wrapped in its own mutex so the reader thread, which
/// invalidates it on every block change, never needs the outer [`RenderObjectWorld`] lock held
/// at the same time as the mesh-builder thread that rebuilds it (spec §5: "the per-session
/// rendering caches... are owned by the client side and mutated only from the mesh-builder
/// task").
#[derive(Debug, Default)]
pub struct MeshCache {
    /// The most recently built mesh for this chunk, if one has been built yet.
    pub mesh: Option<MeshData>,
    /// Whether `mesh` still reflects this chunk's and its neighbors' current block data.
    pub valid: bool,
}

/// [`GsExtraData::ChunkData`] for the client mirror: a shared, lock-guarded mesh cache. Cloning
/// an `Arc` out of the chunk map is cheap, so invalidation never has to block on a mesh rebuild.
#[derive(Clone, Debug, Default)]
pub struct ClientChunkData(pub Arc<Mutex<MeshCache>>);

/// Marker type satisfying [`GsExtraData`] for the client's [`ChunkGroup`], analogous to
/// `gs_common::world::ServerExtraData` but with no per-group data: the client mirror never runs
/// generation, only ingests already-generated content over the wire.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClientExtraData;

impl GsExtraData for ClientExtraData {
    type ChunkData = ClientChunkData;
    type GroupData = ();
}

/// Whether a chunk column that has received `received` distinct block updates should be
/// considered complete, i.e. has every one of its `CHUNK_DIM3Z` cells filled in at least once
/// (spec §4.6: "chunks that are incomplete... are added to a needed-chunks set").
fn is_complete(received: u32) -> bool {
    received as usize >= CHUNK_DIM3Z
}

/// The client-side mirror of every dimension's chunk/entity state, shared between the reader
/// thread (applies incoming updates) and the mesh-builder thread (rebuilds invalidated meshes).
#[derive(Default)]
pub struct RenderObjectWorld {
    groups: HashMap<Dimension, ChunkGroup<ClientExtraData>>,
    received: HashMap<(Dimension, AbsChunkPos), u32>,
    entities: HashMap<u64, RenderObjectEntity>,
    needed_chunks: UpdateList,
    requested: hashbrown::HashSet<PositionI>,
}

impl RenderObjectWorld {
    /// Constructs an empty mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one render-object update received from the server (spec §3, §4.6).
    pub fn apply(&mut self, object: RenderObject) {
        match object {
            RenderObject::Block(block) => self.apply_block(block),
            RenderObject::Entity { entity_id, snapshot } => match snapshot {
                Some(snapshot) => {
                    self.entities.insert(entity_id, snapshot);
                }
                None => {
                    self.entities.remove(&entity_id);
                }
            },
        }
    }

    fn apply_block(&mut self, block: RenderBlock) {
        let dimension = block.position.dimension;
        let (chunk_pos, in_chunk) = block.position.pos.split_chunk_component();

        let group = self.groups.entry(dimension).or_insert_with(ChunkGroup::new);
        let watcher = group
            .chunks
            .entry(chunk_pos)
            .or_insert_with(|| MutWatcher::new(Chunk::new(BlockData::default(), ClientChunkData::default())));

        let data = BlockData {
            descriptor: Some(block.descriptor),
            idata: block.idata,
            light: block.light,
            extra: None,
        };
        let old = watcher.mutate_stored().put(in_chunk, data);
        if !old.good() {
            *self.received.entry((dimension, chunk_pos)).or_insert(0) += 1;
        }

        invalidate_neighborhood(group, chunk_pos);

        if self.chunk_complete(dimension, chunk_pos) {
            let origin = PositionI::new(dimension, AbsBlockPos::from(chunk_pos));
            self.requested.remove(&origin);
            self.needed_chunks.remove(origin);
        }
    }

    /// Whether the chunk column at `pos` has received every one of its cells at least once.
    pub fn chunk_complete(&self, dimension: Dimension, pos: AbsChunkPos) -> bool {
        self.received.get(&(dimension, pos)).copied().is_some_and(is_complete)
    }

    /// Registers interest in the chunk column containing `pos`, queuing it for a `RequestChunk`
    /// unless it is already complete or has already been requested this session (spec §4.6:
    /// "each position sent at most once per session").
    pub fn want_chunk(&mut self, pos: PositionI) {
        let (chunk_pos, _) = pos.pos.split_chunk_component();
        if self.chunk_complete(pos.dimension, chunk_pos) {
            return;
        }
        let origin = PositionI::new(pos.dimension, AbsBlockPos::from(chunk_pos));
        if self.requested.contains(&origin) {
            return;
        }
        self.needed_chunks.add(origin);
    }

    /// Removes and returns up to `cap` queued chunk requests, marking them requested so they are
    /// never queued again this session.
    pub fn drain_needed_chunks(&mut self, cap: usize) -> Vec<PositionI> {
        let mut out = Vec::with_capacity(cap.min(self.needed_chunks.len()));
        while out.len() < cap {
            let Some(pos) = self.needed_chunks.pop_front() else { break };
            self.requested.insert(pos);
            out.push(pos);
        }
        out
    }

    /// The chunk group for `dimension`, if any chunk has ever been received there.
    pub fn group(&self, dimension: Dimension) -> Option<&ChunkGroup<ClientExtraData>> {
        self.groups.get(&dimension)
    }

    /// Every dimension with at least one received chunk, paired with its group.
    pub fn groups(&self) -> impl Iterator<Item = (Dimension, &ChunkGroup<ClientExtraData>)> {
        self.groups.iter().map(|(&d, g)| (d, g))
    }

    /// The current render snapshot for entity `id`, if it has been received and not yet destroyed.
    pub fn entity(&self, id: u64) -> Option<&RenderObjectEntity> {
        self.entities.get(&id)
    }

    /// Every currently live entity snapshot, by id.
    pub fn entities(&self) -> impl Iterator<Item = (u64, &RenderObjectEntity)> {
        self.entities.iter().map(|(&id, e)| (id, e))
    }
}

/// Marks the mesh caches of `center` and its full 3×3 neighborhood dirty (spec §3: "invalidated
/// whenever any of the 3×3 neighborhood changes"), for whichever of those chunks are already
/// present in `group`. Chunks not yet received don't have a cache to invalidate; they start out
/// invalid by construction and will mesh from fresh data once they arrive.
fn invalidate_neighborhood(group: &ChunkGroup<ClientExtraData>, center: AbsChunkPos) {
    for dz in -1..=1 {
        for dx in -1..=1 {
            let pos = center + RelChunkPos::new(dx, dz);
            if let Some(chunk) = group.get_chunk(pos) {
                chunk.read().extra_data.0.lock().unwrap().valid = false;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::num::NonZeroU32;

    use gs_schemas::coordinates::InChunkPos;
    use gs_schemas::light::Lighting;
    use gs_schemas::registry::RegistryId;

    use super::*;

    fn block(dimension: Dimension, pos: AbsBlockPos) -> RenderObject {
        RenderObject::Block(RenderBlock {
            position: PositionI::new(dimension, pos),
            descriptor: RegistryId::new(NonZeroU32::new(1).unwrap()),
            idata: 0,
            light: Lighting::default(),
        })
    }

    #[test]
    fn single_block_update_creates_an_incomplete_chunk() {
        let mut world = RenderObjectWorld::new();
        world.apply(block(Dimension::OVERWORLD, AbsBlockPos::new(0, 0, 0)));

        assert!(world.group(Dimension::OVERWORLD).unwrap().get_chunk(AbsChunkPos::new(0, 0)).is_some());
        assert!(!world.chunk_complete(Dimension::OVERWORLD, AbsChunkPos::new(0, 0)));
    }

    #[test]
    fn want_chunk_is_only_queued_once_per_session() {
        let mut world = RenderObjectWorld::new();
        let pos = PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(5, 5, 5));
        world.want_chunk(pos);
        world.want_chunk(pos);

        let drained = world.drain_needed_chunks(10);
        assert_eq!(drained.len(), 1);
        assert!(world.drain_needed_chunks(10).is_empty());

        // Asking again after it was already marked requested must not re-queue it.
        world.want_chunk(pos);
        assert!(world.drain_needed_chunks(10).is_empty());
    }

    #[test]
    fn completing_a_chunk_clears_it_from_the_needed_set() {
        let mut world = RenderObjectWorld::new();
        let dimension = Dimension::OVERWORLD;
        world.want_chunk(PositionI::new(dimension, AbsBlockPos::new(0, 0, 0)));
        assert_eq!(world.drain_needed_chunks(10).len(), 1);

        for idx in 0..CHUNK_DIM3Z {
            let in_chunk = InChunkPos::try_from_index(idx).unwrap();
            let pos = AbsBlockPos::ZERO + gs_schemas::coordinates::RelBlockPos::from_ivec3(glam::IVec3::from(in_chunk));
            world.apply(block(dimension, pos));
        }

        assert!(world.chunk_complete(dimension, AbsChunkPos::new(0, 0)));
        world.want_chunk(PositionI::new(dimension, AbsBlockPos::new(0, 0, 0)));
        assert!(world.drain_needed_chunks(10).is_empty());
    }

    #[test]
    fn neighbor_block_update_invalidates_the_center_chunks_mesh_cache() {
        let mut world = RenderObjectWorld::new();
        let dimension = Dimension::OVERWORLD;
        world.apply(block(dimension, AbsBlockPos::new(0, 0, 0)));
        {
            let group = world.group(dimension).unwrap();
            let cache = group.get_chunk(AbsChunkPos::new(0, 0)).unwrap().read().extra_data.0.clone();
            cache.lock().unwrap().valid = true;
        }

        world.apply(block(dimension, AbsBlockPos::new(20, 0, 0))); // chunk (1, 0)

        let group = world.group(dimension).unwrap();
        let cache = group.get_chunk(AbsChunkPos::new(0, 0)).unwrap().read().extra_data.0.clone();
        assert!(!cache.lock().unwrap().valid);
    }
}
