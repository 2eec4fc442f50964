//! Biome descriptors: construction-time registry entries describing how a patch of terrain should
//! be shaped and dressed (§4.4 Generation pipeline). Ported from the original engine's
//! `biome_server.h`/`biomes.h`, generalized from a fixed enum of biome kinds into an open registry
//! of trait objects so new biomes can be added without touching this core.

use std::fmt::Debug;

use glam::DVec2;
use rgb::RGBA8;

use crate::coordinates::PositionI;
use crate::registry::{RegistryId, RegistryNameRef, RegistryObject};

/// A source of deterministic, seeded fractal noise, sampled by biomes to vary terrain height and
/// cover without each biome needing its own random state. Implemented by `gs_common`'s
/// `WorldRandom` (the exact hash-mix and FBM formulas are a generation-pipeline concern, not a
/// core data-model one).
pub trait NoiseSource {
    /// Samples 2D fractal Brownian motion noise at `pos`, using `octaves` layers at the given base
    /// `frequency`, under the given `random_class` (a per-use-site noise stream selector).
    fn fbm_2d(&self, pos: DVec2, frequency: f64, octaves: u32, random_class: u32) -> f64;
}

/// One kind of biome: a construction-time-fixed description of how terrain in its territory should
/// be shaped. Mirrors the original engine's `BiomeDescriptor` virtual interface, made into an
/// object-safe trait so biomes can be registered as `Box<dyn BiomeDescriptor>`.
pub trait BiomeDescriptor: Debug + Send + Sync {
    /// The unique namespaced name this biome is registered under, e.g. `"core:desert"`.
    fn name(&self) -> RegistryNameRef;

    /// This biome's nominal temperature, used only as a fixed reference point by [`Self::match_score`]
    /// implementations that compare against the sampled column temperature/humidity.
    fn temperature(&self) -> f32;

    /// This biome's nominal humidity. See [`Self::temperature`].
    fn humidity(&self) -> f32;

    /// How strongly this biome claims the column at `pos`, given the column's sampled temperature
    /// and humidity (both roughly 0-1). Scores across all registered biomes are normalized, raised
    /// to the 32nd power and renormalized by the caller (§4.4) before being treated as
    /// probabilities; a biome that never applies outside its dimension (e.g. a Nether-only biome)
    /// should return `0.0` for every other dimension.
    fn match_score(&self, pos: PositionI, temperature: f32, humidity: f32) -> f32;

    /// The block to place at `pos`, `depth` blocks below the surface of a continuous stone run
    /// (§4.4's Cover generator). Returns `None` to leave the existing block untouched.
    fn cover(&self, pos: PositionI, depth: u32) -> Option<RegistryId>;

    /// Whether [`Self::block_value`] depends on `pos.pos.y`. Most biomes sample only the column's
    /// `(x, z)`, in which case the generator can cache one value per column instead of per block.
    fn is_block_value_height_dependent(&self) -> bool {
        false
    }

    /// The biome-specific noise contribution added to `AverageGroundHeight` to decide how much
    /// stone to fill in at `pos` (§4.4's Land generator). `random_class` is this biome's
    /// dedicated noise stream, allocated once at registration time.
    fn block_value(&self, pos: PositionI, noise: &dyn NoiseSource, random_class: u32) -> f32;

    /// A flat representative color for this biome, for debug overlays and map-style views (out of
    /// this core's rendering scope beyond this single swatch value). Defaults to opaque white so a
    /// biome that doesn't care about one still renders as something.
    fn representative_color(&self) -> RGBA8 {
        RGBA8::new(255, 255, 255, 255)
    }
}

impl RegistryObject for Box<dyn BiomeDescriptor> {
    fn registry_name(&self) -> RegistryNameRef {
        self.as_ref().name()
    }
}

/// Per-biome match scores for one column, indexed in registration order. Built by the generation
/// pipeline's biome-selection step and consumed by the Land/Cover generator parts.
#[derive(Clone, Debug, Default)]
pub struct BiomeProbabilities {
    scores: Vec<f32>,
}

impl BiomeProbabilities {
    /// Wraps a raw per-biome score vector.
    pub fn new(scores: Vec<f32>) -> Self {
        Self { scores }
    }

    /// The raw score for the biome at `index`.
    pub fn get(&self, index: usize) -> f32 {
        self.scores.get(index).copied().unwrap_or(0.0)
    }

    /// Number of biomes this probability vector covers.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether this probability vector covers no biomes.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The index of the highest-scoring biome, i.e. the dominant biome for this column. Ties
    /// resolve to the lowest index, matching the original engine's linear `getCurrentBiome` scan.
    pub fn dominant(&self) -> Option<usize> {
        self.scores
            .iter()
            .enumerate()
            .fold(None, |best, (idx, &score)| match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((idx, score)),
            })
            .map(|(idx, _)| idx)
    }

    /// Normalizes the raw scores to sum to `1.0` (a no-op, all-zero vector if every score was
    /// zero or negative).
    pub fn normalize(&mut self) {
        normalize(&mut self.scores);
    }

    /// Sharpens the distribution by squaring it five times (raising every score to the 32nd
    /// power) and renormalizing, per §4.4: this drives all but the one or two best-matching
    /// biomes' weight towards zero, producing mostly-pure biome regions with narrow blended
    /// borders.
    pub fn sharpen(&mut self) {
        for _ in 0..5 {
            for score in &mut self.scores {
                *score *= *score;
            }
        }
        normalize(&mut self.scores);
    }
}

fn normalize(scores: &mut [f32]) {
    let sum: f32 = scores.iter().sum();
    if sum > 0.0 {
        for score in scores.iter_mut() {
            *score /= sum;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dominant_picks_highest_score() {
        let probs = BiomeProbabilities::new(vec![0.1, 0.7, 0.2]);
        assert_eq!(probs.dominant(), Some(1));
    }

    #[test]
    fn dominant_ties_resolve_to_lowest_index() {
        let probs = BiomeProbabilities::new(vec![0.5, 0.5]);
        assert_eq!(probs.dominant(), Some(0));
    }

    #[test]
    fn normalize_makes_scores_sum_to_one() {
        let mut probs = BiomeProbabilities::new(vec![1.0, 1.0, 2.0]);
        probs.normalize();
        let sum: f32 = (0..probs.len()).map(|i| probs.get(i)).sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sharpen_exaggerates_the_leading_score() {
        let mut probs = BiomeProbabilities::new(vec![0.6, 0.4]);
        probs.sharpen();
        assert!(probs.get(0) > 0.99);
        assert!(probs.get(1) < 0.01);
    }

    #[test]
    fn normalize_of_all_zero_scores_is_a_no_op() {
        let mut probs = BiomeProbabilities::new(vec![0.0, 0.0]);
        probs.normalize();
        assert_eq!(probs.get(0), 0.0);
        assert_eq!(probs.get(1), 0.0);
    }
}
