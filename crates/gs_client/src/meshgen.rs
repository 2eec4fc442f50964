//! Builds a renderable triangle mesh for one chunk column from its block grid and its horizontal
//! neighbors, for hidden-face removal and ambient occlusion at chunk boundaries (spec §3, §4.3's
//! `RenderObjectWorld`'s per-layer mesh cache), and runs the mesh-builder task that keeps those
//! meshes in sync with [`RenderObjectWorld`] (spec §4.6). Grounded on the teacher's own
//! (bevy-specific) `voxel::meshgen::mesh_from_chunk` face-culling and ambient-occlusion pattern,
//! re-targeted onto plain position/normal/color buffers and the [`RenderBackend`] trait instead
//! of a bevy `Mesh` asset, since texture/shader content is out of this core's scope (spec §1).

use std::time::Duration;

use gs_common::prelude::*;
use gs_common::registries::GameRegistries;
use gs_schemas::coordinates::{AbsBlockPos, AbsChunkPos, Dimension, InChunkPos, PositionI, CHUNK_HEIGHT, CHUNK_SIZE};
use gs_schemas::light::Lighting;
use gs_schemas::registry::RegistryId;
use gs_schemas::voxel::chunk::Chunk;
use gs_schemas::voxel::chunk_group::ChunkGroup;
use gs_schemas::voxel::neighborhood::ChunkRefNeighborhood;

use crate::render_world::{ClientExtraData, RenderObjectWorld};

/// Dimming factor applied to a vertex's color for each adjacent occluding neighbor, ported
/// unchanged from the teacher's own mesh generator.
const AO_OCCLUSION_FACTOR: f32 = 0.88;

/// How often the mesh-builder thread sweeps the render-object world for invalidated meshes.
const MESH_BUILDER_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One emitted triangle-mesh vertex: interleaved position/normal/color, ready to hand to whatever
/// vertex buffer layout the embedding [`RenderBackend`] expects.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    /// World-space position.
    pub position: [f32; 3],
    /// Face normal.
    pub normal: [f32; 3],
    /// Per-vertex color, already scaled by ambient occlusion and lighting.
    pub color: [f32; 4],
}

/// A built chunk mesh: a flat vertex buffer and a triangle index buffer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Interleaved vertex attributes.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Whether this mesh has no geometry (every block in the chunk is non-solid or absent).
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// One of the six axis-aligned quad directions a cube face can point in, with its four corners
/// wound counter-clockwise as seen from outside the cube.
struct FaceDir {
    normal: [i32; 3],
    corners: [[i32; 3]; 4],
}

const FACES: [FaceDir; 6] = [
    FaceDir { normal: [1, 0, 0], corners: [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]] },
    FaceDir { normal: [-1, 0, 0], corners: [[0, 0, 1], [0, 1, 1], [0, 1, 0], [0, 0, 0]] },
    FaceDir { normal: [0, 1, 0], corners: [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]] },
    FaceDir { normal: [0, -1, 0], corners: [[0, 0, 1], [0, 0, 0], [1, 0, 0], [1, 0, 1]] },
    FaceDir { normal: [0, 0, 1], corners: [[1, 0, 1], [1, 1, 1], [0, 1, 1], [0, 0, 1]] },
    FaceDir { normal: [0, 0, -1], corners: [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]] },
];

/// Builds the mesh for the chunk column at `chunk_pos`, or `None` if it isn't loaded. Hidden-face
/// removal and ambient occlusion consult whichever of the 8 horizontal neighbors are already
/// loaded; a missing neighbor is treated as non-solid, so boundary faces are drawn (and
/// over-drawn geometry quietly disappears once the neighbor arrives and invalidates this mesh,
/// per [`crate::render_world`]'s invalidation rule) rather than leaving a hole into the unknown.
pub fn build_chunk_mesh(registries: &GameRegistries, group: &ChunkGroup<ClientExtraData>, chunk_pos: AbsChunkPos) -> Option<MeshData> {
    let center_watcher = group.get_chunk(chunk_pos)?;
    let center = center_watcher.read();
    let neighborhood = group.get_neighborhood_around(chunk_pos).transpose_option();

    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    let origin = AbsBlockPos::from(chunk_pos);

    for y in 0..CHUNK_HEIGHT {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let Ok(in_chunk) = InChunkPos::try_new(x, y, z) else { continue };
                let data = center.get(in_chunk);
                let Some(descriptor_id) = data.descriptor else { continue };
                let Some(descriptor) = registries.blocks.lookup_id_to_object(descriptor_id) else { continue };
                if !descriptor.solid {
                    continue;
                }

                let world_pos = AbsBlockPos::new(origin.x + x, y, origin.z + z);

                for face in &FACES {
                    let neighbor_pos = AbsBlockPos::new(world_pos.x + face.normal[0], world_pos.y + face.normal[1], world_pos.z + face.normal[2]);
                    if is_solid(neighborhood.as_ref(), &center, chunk_pos, registries, neighbor_pos) {
                        continue;
                    }

                    let base_color = color_for(descriptor_id, data.light);
                    let voff = vertices.len() as u32;
                    for corner in &face.corners {
                        let ao = corner_ao(neighborhood.as_ref(), &center, chunk_pos, registries, world_pos, face.normal, *corner);
                        let position = [world_pos.x as f32 + corner[0] as f32, world_pos.y as f32 + corner[1] as f32, world_pos.z as f32 + corner[2] as f32];
                        let color = [base_color[0] * ao, base_color[1] * ao, base_color[2] * ao, base_color[3]];
                        vertices.push(Vertex {
                            position,
                            normal: [face.normal[0] as f32, face.normal[1] as f32, face.normal[2] as f32],
                            color,
                        });
                    }
                    indices.extend_from_slice(&[voff, voff + 1, voff + 2, voff, voff + 2, voff + 3]);
                }
            }
        }
    }

    Some(MeshData { vertices, indices })
}

/// Looks up whether the block at `world_pos` has a solid collider, treating below-world as solid
/// (matching the server block iterator's synthetic bedrock floor) and above-world or
/// not-yet-loaded positions as non-solid.
fn is_solid(neighborhood: Option<&ChunkRefNeighborhood<'_, ClientExtraData>>, center: &Chunk<ClientExtraData>, center_pos: AbsChunkPos, registries: &GameRegistries, world_pos: AbsBlockPos) -> bool {
    if world_pos.y < 0 {
        return true;
    }
    if world_pos.y >= CHUNK_HEIGHT {
        return false;
    }
    let (chunk_pos, in_chunk) = world_pos.split_chunk_component();
    let data = if chunk_pos == center_pos {
        center.get(in_chunk)
    } else if let Some(neighborhood) = neighborhood {
        match neighborhood.get(chunk_pos) {
            Some(chunk) => chunk.read().get(in_chunk),
            None => return false,
        }
    } else {
        return false;
    };
    let Some(descriptor_id) = data.descriptor else { return false };
    registries.blocks.lookup_id_to_object(descriptor_id).is_some_and(|d| d.solid)
}

/// Ambient occlusion for one corner of one face, using the standard two-sides-plus-diagonal
/// voxel AO rule: if both edge-adjacent cells are solid the corner is fully occluded regardless
/// of the diagonal cell (avoids a visible seam at chunk/shape boundaries).
fn corner_ao(neighborhood: Option<&ChunkRefNeighborhood<'_, ClientExtraData>>, center: &Chunk<ClientExtraData>, center_pos: AbsChunkPos, registries: &GameRegistries, block_pos: AbsBlockPos, normal: [i32; 3], corner: [i32; 3]) -> f32 {
    let tangent_axes: Vec<usize> = (0..3).filter(|&axis| normal[axis] == 0).collect();
    let (ta, tb) = (tangent_axes[0], tangent_axes[1]);
    let sign = |c: i32| if c == 1 { 1 } else { -1 };

    let mut side_a = normal;
    side_a[ta] += sign(corner[ta]);
    let mut side_b = normal;
    side_b[tb] += sign(corner[tb]);
    let mut diagonal = normal;
    diagonal[ta] += sign(corner[ta]);
    diagonal[tb] += sign(corner[tb]);

    let side_a_solid = is_solid(neighborhood, center, center_pos, registries, offset(block_pos, side_a));
    let side_b_solid = is_solid(neighborhood, center, center_pos, registries, offset(block_pos, side_b));
    let diagonal_solid = side_a_solid && side_b_solid || is_solid(neighborhood, center, center_pos, registries, offset(block_pos, diagonal));

    let occluders = side_a_solid as i32 + side_b_solid as i32 + diagonal_solid as i32;
    AO_OCCLUSION_FACTOR.powi(occluders)
}

fn offset(pos: AbsBlockPos, by: [i32; 3]) -> AbsBlockPos {
    AbsBlockPos::new(pos.x + by[0], pos.y + by[1], pos.z + by[2])
}

/// A placeholder, deterministic per-block-kind tint scaled by the block's own lighting. Block
/// textures are out of this core's scope (spec §1); this gives the mesh-builder something to
/// hand a [`RenderBackend`] without inventing a texture atlas format.
fn color_for(descriptor_id: RegistryId, light: Lighting) -> [f32; 4] {
    let hash = descriptor_id.as_u32().wrapping_mul(2654435761);
    let r = ((hash >> 16) & 0xFF) as f32 / 255.0;
    let g = ((hash >> 8) & 0xFF) as f32 / 255.0;
    let b = (hash & 0xFF) as f32 / 255.0;
    let brightness = light.artificial.max(light.scattered_natural).max(light.direct_natural) as f32 / Lighting::MAX as f32;
    let brightness = 0.2 + 0.8 * brightness;
    [r * brightness, g * brightness, b * brightness, 1.0]
}

/// External rendering collaborator (spec §1: "out of core scope... assumed to expose
/// `submit_mesh`, `load_texture`, `begin_frame`, `present`"). The mesh-builder thread only ever
/// calls [`RenderBackend::submit_mesh`]; the other three methods are this core's contract with
/// whatever embeds it; nothing in this crate calls them.
pub trait RenderBackend: Send + Sync {
    /// Replaces the currently displayed mesh for chunk column `chunk_pos` in `dimension`.
    fn submit_mesh(&self, dimension: Dimension, chunk_pos: AbsChunkPos, mesh: &MeshData);
    /// Loads a texture asset by name, for use by block/entity meshes.
    fn load_texture(&self, name: &str) -> Result<()>;
    /// Starts a new render frame.
    fn begin_frame(&self);
    /// Presents the frame built since the last `begin_frame`.
    fn present(&self);
}

/// A no-op [`RenderBackend`], used by the headless CLI entry point: every call is logged and
/// otherwise discarded.
#[derive(Default)]
pub struct NullRenderBackend;

impl RenderBackend for NullRenderBackend {
    fn submit_mesh(&self, dimension: Dimension, chunk_pos: AbsChunkPos, mesh: &MeshData) {
        trace!(%dimension, ?chunk_pos, vertices = mesh.vertices.len(), triangles = mesh.indices.len() / 3, "mesh submitted");
    }

    fn load_texture(&self, name: &str) -> Result<()> {
        trace!(name, "texture load requested");
        Ok(())
    }

    fn begin_frame(&self) {}

    fn present(&self) {}
}

/// Runs the mesh-builder task (spec §4.6's third client task): repeatedly sweeps every loaded
/// chunk whose cached mesh is invalid, rebuilds and submits it to `backend` once complete, or
/// registers it as wanted (so the writer thread requests it) while still incomplete.
pub fn mesh_builder_thread(registries: Arc<GameRegistries>, world: Arc<Mutex<RenderObjectWorld>>, backend: Arc<dyn RenderBackend>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(AtomicOrdering::Relaxed) {
        sweep(&registries, &world, &*backend);
        std::thread::sleep(MESH_BUILDER_POLL_INTERVAL);
    }
}

fn sweep(registries: &GameRegistries, world: &Arc<Mutex<RenderObjectWorld>>, backend: &dyn RenderBackend) {
    let dirty: Vec<(Dimension, AbsChunkPos)> = {
        let world = world.lock().unwrap();
        let mut dirty = Vec::new();
        for (dimension, group) in world.groups() {
            for (&pos, chunk) in &group.chunks {
                if !chunk.read().extra_data.0.lock().unwrap().valid {
                    dirty.push((dimension, pos));
                }
            }
        }
        dirty
    };

    for (dimension, pos) in dirty {
        let built = {
            let mut world = world.lock().unwrap();
            if !world.chunk_complete(dimension, pos) {
                world.want_chunk(PositionI::new(dimension, AbsBlockPos::from(pos)));
                continue;
            }
            let Some(group) = world.group(dimension) else { continue };
            let Some(mesh) = build_chunk_mesh(registries, group, pos) else { continue };
            let mesh_cache = group.get_chunk(pos).unwrap().read().extra_data.0.clone();
            (mesh_cache, mesh)
        };
        let (mesh_cache, mesh) = built;

        backend.submit_mesh(dimension, pos, &mesh);
        let mut cache = mesh_cache.lock().unwrap();
        cache.mesh = Some(mesh);
        cache.valid = true;
    }
}

#[cfg(test)]
mod test {
    use gs_common::network::protocol::{RenderBlock, RenderObject};
    use gs_schemas::light::Lighting;

    use super::*;

    fn registries_with_one_solid_block() -> (Arc<GameRegistries>, RegistryId) {
        let registries = GameRegistries::builtin();
        let id = registries.core_blocks.stone;
        (Arc::new(registries), id)
    }

    #[test]
    fn single_isolated_block_produces_six_quads() {
        let (registries, stone) = registries_with_one_solid_block();
        let mut world = RenderObjectWorld::new();
        world.apply(RenderObject::Block(RenderBlock {
            position: PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(0, 64, 0)),
            descriptor: stone,
            idata: 0,
            light: Lighting::sky(),
        }));

        let group = world.group(Dimension::OVERWORLD).unwrap();
        let mesh = build_chunk_mesh(&registries, group, AbsChunkPos::new(0, 0)).unwrap();
        assert_eq!(mesh.indices.len(), 6 * 6);
        assert_eq!(mesh.vertices.len(), 6 * 4);
    }

    #[test]
    fn fully_buried_block_has_no_visible_faces() {
        let (registries, stone) = registries_with_one_solid_block();
        let mut world = RenderObjectWorld::new();
        let center = AbsBlockPos::new(5, 64, 5);
        world.apply(RenderObject::Block(RenderBlock {
            position: PositionI::new(Dimension::OVERWORLD, center),
            descriptor: stone,
            idata: 0,
            light: Lighting::sky(),
        }));
        for face_normal in [[1, 0, 0], [-1, 0, 0], [0, 1, 0], [0, -1, 0], [0, 0, 1], [0, 0, -1]] {
            let pos = offset(center, face_normal);
            world.apply(RenderObject::Block(RenderBlock {
                position: PositionI::new(Dimension::OVERWORLD, pos),
                descriptor: stone,
                idata: 0,
                light: Lighting::sky(),
            }));
        }

        let group = world.group(Dimension::OVERWORLD).unwrap();
        let mesh = build_chunk_mesh(&registries, group, AbsChunkPos::new(0, 0)).unwrap();
        // The 6 outer blocks still expose outward faces, but the center block is fully buried.
        let center_faces = mesh
            .vertices
            .iter()
            .filter(|v| (v.position[0] - center.x as f32 - 0.5).abs() < 0.6 && (v.position[1] - center.y as f32 - 0.5).abs() < 0.6 && (v.position[2] - center.z as f32 - 0.5).abs() < 0.6)
            .count();
        assert_eq!(center_faces, 0);
    }

    #[test]
    fn air_block_is_not_meshed() {
        let (registries, air) = {
            let registries = GameRegistries::builtin();
            let id = registries.core_blocks.air;
            (Arc::new(registries), id)
        };
        let mut world = RenderObjectWorld::new();
        world.apply(RenderObject::Block(RenderBlock {
            position: PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(0, 64, 0)),
            descriptor: air,
            idata: 0,
            light: Lighting::sky(),
        }));

        let group = world.group(Dimension::OVERWORLD).unwrap();
        let mesh = build_chunk_mesh(&registries, group, AbsChunkPos::new(0, 0)).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn missing_chunk_builds_nothing() {
        let registries = GameRegistries::builtin();
        let world = RenderObjectWorld::new();
        assert!(world.group(Dimension::OVERWORLD).is_none());
        let group = ChunkGroup::<ClientExtraData>::new();
        assert!(build_chunk_mesh(&registries, &group, AbsChunkPos::new(0, 0)).is_none());
    }
}
