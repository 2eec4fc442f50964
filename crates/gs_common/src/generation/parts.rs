//! The default `WorldGeneratorPart`s: land, cover and basic light, in that precedence order
//! (spec §4.4).

use std::cell::RefCell;
use std::sync::Arc;

use glam::DVec2;
use gs_schemas::coordinates::{InChunkPos, CHUNK_HEIGHT, CHUNK_SIZE};
use gs_schemas::light::Lighting;
use gs_schemas::voxel::biome::BiomeProbabilities;
use gs_schemas::voxel::block::BlockData;
use thread_local::ThreadLocal;

use crate::generation::GenerationContext;
use crate::registries::GameRegistries;

/// Average ground height (in blocks) before per-biome `block_value` is added, per spec §4.4's Land
/// generator.
pub const AVERAGE_GROUND_HEIGHT: i32 = 64;

/// One stage of the generation pipeline, applied in ascending [`Self::precedence`] order by
/// [`crate::generation::WorldGenerator`]. `run` mutates the scratch chunk in `ctx` directly; it
/// never sees any other chunk, matching the "private copy of the world scoped to the chunk being
/// generated" contract in spec §4.4.
pub trait WorldGeneratorPart: Send + Sync {
    /// This part's position in the pipeline; lower runs first.
    fn precedence(&self) -> f64;

    /// Generates (or refines) the chunk in `ctx`.
    fn run(&self, ctx: &mut GenerationContext);
}

/// Computes a column's dominant biome and blended probabilities. Shared by [`LandGenerator`] and
/// [`CoverGenerator`], both of which call this once per column (256 times per chunk): `scratch`
/// is each part's per-worker-thread scores buffer, reused across calls on the same thread instead
/// of reallocating a fresh `Vec` every column.
fn biome_probabilities(
    ctx: &GenerationContext,
    scratch: &ThreadLocal<RefCell<Vec<f32>>>,
    x: i32,
    z: i32,
    temperature_class: u32,
    humidity_class: u32,
) -> BiomeProbabilities {
    let abs_x = (ctx.chunk_origin.x * CHUNK_SIZE + x) as f64;
    let abs_z = (ctx.chunk_origin.y * CHUNK_SIZE + z) as f64;
    let column = DVec2::new(abs_x, abs_z);

    let temperature = (ctx.random.fbm_2d(column, 0.003, 3, temperature_class) * 0.5 + 0.5) as f32;
    let humidity = (ctx.random.fbm_2d(column, 0.004, 3, humidity_class) * 0.5 + 0.5) as f32;

    let pos = gs_schemas::coordinates::PositionI::new(
        ctx.dimension,
        gs_schemas::coordinates::AbsBlockPos::new(abs_x as i32, 0, abs_z as i32),
    );

    let mut scores = scratch.get_or(|| RefCell::new(Vec::new())).borrow_mut();
    scores.clear();
    for (_, biome) in ctx.registries.biomes.iter() {
        scores.push(biome.match_score(pos, temperature, humidity));
    }
    let mut probabilities = BiomeProbabilities::new(scores.clone());
    probabilities.normalize();
    probabilities.sharpen();
    probabilities
}

/// Fills `y < AVERAGE_GROUND_HEIGHT + block_value` with stone and everything above with air, per
/// column, where `block_value` is the biome-probability-weighted sum of every registered biome's
/// `block_value` sample (spec §4.4's Land generator, precedence 0).
pub struct LandGenerator {
    registries: Arc<GameRegistries>,
    temperature_class: u32,
    humidity_class: u32,
    ground_class: u32,
    scores_scratch: ThreadLocal<RefCell<Vec<f32>>>,
}

impl LandGenerator {
    /// Allocates this part's dedicated random classes and binds it to `registries`.
    pub fn new(registries: Arc<GameRegistries>) -> Self {
        Self {
            registries,
            temperature_class: crate::generation::WorldRandom::new_random_class(),
            humidity_class: crate::generation::WorldRandom::new_random_class(),
            ground_class: crate::generation::WorldRandom::new_random_class(),
            scores_scratch: ThreadLocal::new(),
        }
    }
}

impl WorldGeneratorPart for LandGenerator {
    fn precedence(&self) -> f64 {
        0.0
    }

    fn run(&self, ctx: &mut GenerationContext) {
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let probabilities = biome_probabilities(ctx, &self.scores_scratch, x, z, self.temperature_class, self.humidity_class);

                let abs_x = (ctx.chunk_origin.x * CHUNK_SIZE + x) as f64;
                let abs_z = (ctx.chunk_origin.y * CHUNK_SIZE + z) as f64;
                let pos = gs_schemas::coordinates::PositionI::new(
                    ctx.dimension,
                    gs_schemas::coordinates::AbsBlockPos::new(abs_x as i32, 0, abs_z as i32),
                );
                let block_value = crate::registries::blended_block_value(
                    &self.registries.biomes,
                    &probabilities,
                    pos,
                    ctx.random,
                    &[self.ground_class; 32],
                );
                let height = AVERAGE_GROUND_HEIGHT + block_value.round() as i32;

                for y in 0..CHUNK_HEIGHT {
                    let block = if y < height {
                        BlockData::new(self.registries.core_blocks.stone)
                    } else {
                        BlockData::new(self.registries.core_blocks.air)
                    };
                    let Ok(in_chunk) = InChunkPos::try_new(x, y, z) else { continue };
                    ctx.chunk.put(in_chunk, block);
                }
            }
        }
    }
}

/// Walks each column top-to-bottom replacing the top few blocks of each continuous stone run with
/// the dominant biome's `cover` blocks, per spec §4.4's Cover generator (precedence 1).
pub struct CoverGenerator {
    registries: Arc<GameRegistries>,
    temperature_class: u32,
    humidity_class: u32,
    scores_scratch: ThreadLocal<RefCell<Vec<f32>>>,
}

impl CoverGenerator {
    /// Allocates this part's dedicated random classes and binds it to `registries`.
    pub fn new(registries: Arc<GameRegistries>) -> Self {
        Self {
            registries,
            temperature_class: crate::generation::WorldRandom::new_random_class(),
            humidity_class: crate::generation::WorldRandom::new_random_class(),
            scores_scratch: ThreadLocal::new(),
        }
    }
}

impl WorldGeneratorPart for CoverGenerator {
    fn precedence(&self) -> f64 {
        1.0
    }

    fn run(&self, ctx: &mut GenerationContext) {
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let probabilities = biome_probabilities(ctx, &self.scores_scratch, x, z, self.temperature_class, self.humidity_class);
                let Some(dominant) = probabilities.dominant() else { continue };
                let Some((_, biome)) = self.registries.biomes.iter().nth(dominant) else {
                    continue;
                };

                let mut depth = 0u32;
                for y in (0..CHUNK_HEIGHT).rev() {
                    let Ok(in_chunk) = InChunkPos::try_new(x, y, z) else { continue };
                    let current = ctx.chunk.get(in_chunk);
                    let is_stone = current.descriptor == Some(self.registries.core_blocks.stone);
                    if !is_stone {
                        depth = 0;
                        continue;
                    }
                    let abs_x = ctx.chunk_origin.x * CHUNK_SIZE + x;
                    let abs_z = ctx.chunk_origin.y * CHUNK_SIZE + z;
                    let pos = gs_schemas::coordinates::PositionI::new(
                        ctx.dimension,
                        gs_schemas::coordinates::AbsBlockPos::new(abs_x, y, abs_z),
                    );
                    if let Some(replacement) = biome.cover(pos, depth) {
                        ctx.chunk.put(in_chunk, BlockData::new(replacement));
                    }
                    depth += 1;
                }
            }
        }
    }
}

/// Propagates sky lighting straight down each column, attenuated by each block's
/// `LightProperties`, as the initial lighting pass before any block updates trigger a full
/// neighbor-aware recompute (spec §4.4's Basic-light generator, precedence `1e10` — last).
pub struct BasicLightGenerator {
    registries: Arc<GameRegistries>,
}

impl BasicLightGenerator {
    /// Binds this part to `registries` (needed to look up each block's `LightProperties`).
    pub fn new(registries: Arc<GameRegistries>) -> Self {
        Self { registries }
    }
}

impl WorldGeneratorPart for BasicLightGenerator {
    fn precedence(&self) -> f64 {
        1e10
    }

    fn run(&self, ctx: &mut GenerationContext) {
        for x in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                let mut above = Lighting::sky();
                for y in (0..CHUNK_HEIGHT).rev() {
                    let Ok(in_chunk) = InChunkPos::try_new(x, y, z) else { continue };
                    let mut block = ctx.chunk.get(in_chunk);
                    let properties = block
                        .descriptor
                        .and_then(|id| self.registries.blocks.lookup_id_to_object(id))
                        .map(|d| d.light_properties)
                        .unwrap_or_default();

                    let dark = Lighting::dark();
                    let neighbors = [dark, dark, above, dark, dark, dark];
                    let lighting = Lighting::calc(properties, neighbors);
                    block.light = lighting;
                    ctx.chunk.put(in_chunk, block);
                    above = lighting;
                }
            }
        }
    }
}
