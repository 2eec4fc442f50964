//! Construction-time, process-global descriptor registries. Built once by [`GameRegistries::builtin`]
//! before the `World` exists and treated as immutable thereafter (spec §5's "Block descriptors and
//! entity descriptors are registered once at startup... and then treated as immutable"). Grounded
//! on the original engine's global block/entity dictionaries, replaced per the REDESIGN FLAG in
//! spec.md §9 with an explicit registry object rather than a process-global singleton.
//!
//! Block/entity *content* is out of core scope (spec §1); the handful of kinds registered here
//! exist only so the world store, generation pipeline and physics stepper have something concrete
//! to exercise and test against.

use glam::{DVec2, DVec3};
use gs_schemas::coordinates::PositionI;
use gs_schemas::light::LightProperties;
use gs_schemas::physics::Properties;
use gs_schemas::registry::{Registry, RegistryId, RegistryNameRef};
use gs_schemas::voxel::biome::{BiomeDescriptor, BiomeProbabilities, NoiseSource};
use gs_schemas::voxel::block::BlockDescriptor;
use gs_schemas::voxel::entity::EntityDescriptor;
use kstring::KStringRef;

/// The three block kinds the core generation pipeline needs: an open-air default, a solid fill
/// block and the synthetic-bedrock stand-in returned below `y = 0` by the block iterator.
pub struct CoreBlocks {
    pub air: RegistryId,
    pub stone: RegistryId,
    pub dirt: RegistryId,
    pub grass: RegistryId,
    pub bedrock: RegistryId,
}

/// The one entity kind needed to exercise the physics stepper and network protocol end to end.
pub struct CoreEntities {
    pub player: RegistryId,
}

/// All the registries a running `World` needs, bundled together so they can be constructed once
/// and passed down by shared reference.
pub struct GameRegistries {
    pub blocks: Registry<BlockDescriptor>,
    pub entities: Registry<EntityDescriptor>,
    pub biomes: Registry<Box<dyn BiomeDescriptor>>,
    pub core_blocks: CoreBlocks,
    pub core_entities: CoreEntities,
}

impl GameRegistries {
    /// Builds the builtin registries: enough block/entity/biome kinds for the generation pipeline,
    /// physics stepper and wire protocol to be exercised without any content mod loaded.
    pub fn builtin() -> Self {
        let mut blocks = Registry::new();
        let air = blocks.push_object(BlockDescriptor::new("core:air", LightProperties::TRANSPARENT, false)).unwrap();
        let stone = blocks.push_object(BlockDescriptor::new("core:stone", LightProperties::OPAQUE, true)).unwrap();
        let dirt = blocks.push_object(BlockDescriptor::new("core:dirt", LightProperties::OPAQUE, true)).unwrap();
        let grass = blocks.push_object(BlockDescriptor::new("core:grass", LightProperties::OPAQUE, true)).unwrap();
        let bedrock = blocks.push_object(BlockDescriptor::new("core:bedrock", LightProperties::OPAQUE, true)).unwrap();

        let mut entities = Registry::new();
        let player = entities
            .push_object(EntityDescriptor::new(
                "core:player",
                DVec3::new(0.3, 0.9, 0.3),
                Properties::new(1.0, 0.5, 0.0),
            ))
            .unwrap();

        let mut biomes: Registry<Box<dyn BiomeDescriptor>> = Registry::new();
        biomes.push_object(Box::new(PlainsBiome { grass, dirt })).unwrap();
        biomes.push_object(Box::new(DesertBiome)).unwrap();

        Self {
            blocks,
            entities,
            biomes,
            core_blocks: CoreBlocks {
                air,
                stone,
                dirt,
                grass,
                bedrock,
            },
            core_entities: CoreEntities { player },
        }
    }
}

/// A temperate, moderately humid biome: thin grass-over-dirt cover over stone.
#[derive(Debug)]
struct PlainsBiome {
    grass: RegistryId,
    dirt: RegistryId,
}

impl BiomeDescriptor for PlainsBiome {
    fn name(&self) -> RegistryNameRef {
        KStringRef::from_ref("core:plains")
    }

    fn temperature(&self) -> f32 {
        0.5
    }

    fn humidity(&self) -> f32 {
        0.5
    }

    fn match_score(&self, _pos: PositionI, temperature: f32, humidity: f32) -> f32 {
        1.0 - ((temperature - self.temperature()).abs() + (humidity - self.humidity()).abs()) / 2.0
    }

    fn cover(&self, _pos: PositionI, depth: u32) -> Option<RegistryId> {
        match depth {
            0 => Some(self.grass),
            1..=3 => Some(self.dirt),
            _ => None,
        }
    }

    fn block_value(&self, pos: PositionI, noise: &dyn NoiseSource, random_class: u32) -> f32 {
        let p = DVec2::new(pos.pos.x as f64, pos.pos.z as f64);
        (noise.fbm_2d(p, 0.01, 4, random_class) * 6.0) as f32
    }

    fn representative_color(&self) -> rgb::RGBA8 {
        rgb::RGBA8::new(94, 153, 59, 255)
    }
}

/// A hot, dry biome: no topsoil, bare stone straight to the surface.
#[derive(Debug)]
struct DesertBiome;

impl BiomeDescriptor for DesertBiome {
    fn name(&self) -> RegistryNameRef {
        KStringRef::from_ref("core:desert")
    }

    fn temperature(&self) -> f32 {
        0.9
    }

    fn humidity(&self) -> f32 {
        0.1
    }

    fn match_score(&self, _pos: PositionI, temperature: f32, humidity: f32) -> f32 {
        1.0 - ((temperature - self.temperature()).abs() + (humidity - self.humidity()).abs()) / 2.0
    }

    fn cover(&self, _pos: PositionI, _depth: u32) -> Option<RegistryId> {
        None
    }

    fn block_value(&self, pos: PositionI, noise: &dyn NoiseSource, random_class: u32) -> f32 {
        let p = DVec2::new(pos.pos.x as f64, pos.pos.z as f64);
        (noise.fbm_2d(p, 0.02, 3, random_class) * 3.0) as f32
    }

    fn representative_color(&self) -> rgb::RGBA8 {
        rgb::RGBA8::new(237, 201, 175, 255)
    }
}

/// Probability-weighted combination of `BiomeProbabilities` against a registry, used by the Land
/// generator part to compute a continuous `block_value` across a biome-blend border instead of a
/// hard cut at the dominant biome's boundary.
pub fn blended_block_value(
    registry: &Registry<Box<dyn BiomeDescriptor>>,
    probabilities: &BiomeProbabilities,
    pos: PositionI,
    noise: &dyn NoiseSource,
    random_classes: &[u32],
) -> f32 {
    registry
        .iter()
        .enumerate()
        .map(|(idx, (_, biome))| {
            let weight = probabilities.get(idx);
            if weight <= 0.0 {
                0.0
            } else {
                weight * biome.block_value(pos, noise, random_classes.get(idx).copied().unwrap_or(0))
            }
        })
        .sum()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_registries_have_the_expected_core_kinds() {
        let regs = GameRegistries::builtin();
        assert_eq!(regs.blocks.len(), 5);
        assert_eq!(regs.entities.len(), 1);
        assert_eq!(regs.biomes.len(), 2);
        assert!(regs.blocks.lookup_id_to_object(regs.core_blocks.air).unwrap().name == "core:air");
    }
}
