//! The bounded chunk-generation worker pool. Fixed-size thread pool that pulls chunk columns off
//! [`crate::world::World::needs_generation`], generates each into a throwaway scratch chunk
//! outside the world lock, then merges the result back in block-by-block. Grounded on the
//! original engine's `world_generator.h` generation-thread pool, re-targeted onto the
//! throwaway-scratch-chunk-then-merge scheme spec §4.4 mandates in place of holding the world lock
//! for the whole generation pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use gs_schemas::voxel::block::BlockData;
use gs_schemas::voxel::chunk::Chunk;

use crate::generation::{GenerationContext, WorldGenerator};
use crate::prelude::*;
use crate::registries::GameRegistries;
use crate::world::{ServerChunkData, ServerExtraData, World};

/// How long an idle worker sleeps between polls of `needs_generation` when it finds the queue
/// empty. Short enough not to add perceptible latency to a chunk request, long enough not to spin.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A fixed-size pool of background threads draining `World::needs_generation` (spec §4.4's
/// `GenerateThreadCount`). Dropping or calling [`GenerationWorkerPool::shutdown`] stops every
/// worker and joins its thread.
pub struct GenerationWorkerPool {
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl GenerationWorkerPool {
    /// Spawns `thread_count` worker threads sharing `world` (locked once per claimed job, never
    /// held across the generation pass itself).
    pub fn new(thread_count: usize, world: Arc<Mutex<World>>, generator: Arc<WorldGenerator>, registries: Arc<GameRegistries>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handles = (0..thread_count.max(1))
            .map(|index| {
                let world = Arc::clone(&world);
                let generator = Arc::clone(&generator);
                let registries = Arc::clone(&registries);
                let shutdown = Arc::clone(&shutdown);
                std::thread::Builder::new()
                    .name(format!("gen-worker-{index}"))
                    .spawn(move || worker_loop(world, generator, registries, shutdown))
                    .expect("failed to spawn generation worker thread")
            })
            .collect();
        Self { shutdown, handles }
    }

    /// Signals every worker to stop after its current job (if any) and joins all of their threads.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(world: Arc<Mutex<World>>, generator: Arc<WorldGenerator>, registries: Arc<GameRegistries>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        let job = {
            let mut world = world.lock().unwrap();
            world.claim_next_generation_job()
        };
        let Some(job) = job else {
            std::thread::sleep(IDLE_POLL_INTERVAL);
            continue;
        };

        let seed = world.lock().unwrap().random().seed();
        let random = crate::generation::WorldRandom::new(seed);
        let (chunk_origin, _) = job.pos.split_chunk_component();
        let mut scratch = Chunk::<ServerExtraData>::new(BlockData::default(), ServerChunkData);
        let mut ctx = GenerationContext {
            random: &random,
            registries: &registries,
            dimension: job.dimension,
            chunk_origin,
            chunk: &mut scratch,
        };
        generator.run(&mut ctx);

        let mut world = world.lock().unwrap();
        world.merge_generated_chunk(job, scratch);
        debug!(%job, "generated chunk column");
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use gs_schemas::coordinates::{AbsBlockPos, Dimension, PositionI};

    use super::*;

    #[test]
    fn worker_pool_generates_a_requested_chunk() {
        let registries = Arc::new(GameRegistries::builtin());
        let generator = Arc::new(WorldGenerator::new(WorldGenerator::default_parts(&registries)));
        let world = Arc::new(Mutex::new(World::new(1, registries.clone(), generator.clone())));

        let pos = PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(3, 3, 3));
        world.lock().unwrap().request_chunk(pos);

        let pool = GenerationWorkerPool::new(2, world.clone(), generator, registries);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if world.lock().unwrap().generated.len() == 1 {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "worker pool did not finish generating in time");
            std::thread::sleep(Duration::from_millis(5));
        }

        pool.shutdown();
        assert!(world.lock().unwrap().is_chunk_loaded(Dimension::OVERWORLD, gs_schemas::coordinates::AbsChunkPos::new(0, 0)));
    }
}
