//! Deterministic world generation: the seeded noise source (`WorldRandom`), biome selection, the
//! ordered `WorldGeneratorPart` pipeline and its default land/cover/light parts, and the bounded
//! worker pool that drives chunk generation off the world-tick thread. Grounded on the original
//! engine's `world_generator.h`/`biome_server.h`, re-targeted from per-part mutable-world-reference
//! callbacks onto the throwaway-world-then-merge scheme spec §4.4 mandates.

mod parts;
mod random;
mod worker;

pub use parts::{BasicLightGenerator, CoverGenerator, LandGenerator, WorldGeneratorPart};
pub use random::{make_seed, WorldRandom};
pub use worker::GenerationWorkerPool;

use std::sync::Arc;

use gs_schemas::coordinates::{AbsChunkPos, Dimension};

use crate::registries::GameRegistries;

/// An ordered list of [`WorldGeneratorPart`]s, sorted ascending by [`WorldGeneratorPart::precedence`]
/// once at construction. `WorldGenerator::run` applies every part in order to the chunk at
/// `origin`, mutating the scratch chunk the caller set up for it.
pub struct WorldGenerator {
    parts: Vec<Box<dyn WorldGeneratorPart>>,
}

impl WorldGenerator {
    /// Builds a generator from an unordered part list, sorting by precedence.
    pub fn new(mut parts: Vec<Box<dyn WorldGeneratorPart>>) -> Self {
        parts.sort_by(|a, b| a.precedence().partial_cmp(&b.precedence()).unwrap());
        Self { parts }
    }

    /// The default part list, in precedence order: land (0), cover (1), basic light (1e10).
    pub fn default_parts(registries: &Arc<GameRegistries>) -> Vec<Box<dyn WorldGeneratorPart>> {
        vec![
            Box::new(LandGenerator::new(registries.clone())),
            Box::new(CoverGenerator::new(registries.clone())),
            Box::new(BasicLightGenerator::new(registries.clone())),
        ]
    }

    /// Runs every part, in precedence order, against `ctx`.
    pub fn run(&self, ctx: &mut GenerationContext) {
        for part in &self.parts {
            part.run(ctx);
        }
    }
}

/// Everything a [`WorldGeneratorPart`] needs to generate one chunk: the deterministic noise
/// source, the registries, and the scratch chunk being filled in (plumbed in by
/// [`GenerationWorkerPool`] as a single-chunk throwaway [`crate::world::World`]).
pub struct GenerationContext<'w> {
    pub random: &'w WorldRandom,
    pub registries: &'w GameRegistries,
    pub dimension: Dimension,
    pub chunk_origin: AbsChunkPos,
    pub chunk: &'w mut gs_schemas::voxel::chunk::Chunk<crate::world::ServerExtraData>,
}
