#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

//! The common client&server code for Geosia: the world store, the chunk generation pipeline, the
//! continuous-time physics stepper re-exported from [`gs_schemas`], the network wire protocol, and
//! the dedicated server's accept/tick loop.

pub mod concurrency;
pub mod config;
pub mod dedicated_server;
pub mod generation;
pub mod network;
pub mod prelude;
pub mod registries;
pub mod version;
pub mod world;

use std::time::Duration;

use crate::config::{GameConfig, GameConfigHandle};
use crate::generation::{GenerationWorkerPool, WorldGenerator};
use crate::network::server::NetworkServer;
use crate::prelude::*;
use crate::registries::GameRegistries;
use crate::world::World;

// TODO: Populate these from build/git info
/// The major SemVer field of the current build's version
pub static GAME_VERSION_MAJOR: u32 = 0;
/// The minor SemVer field of the current build's version
pub static GAME_VERSION_MINOR: u32 = 0;
/// The patch SemVer field of the current build's version
pub static GAME_VERSION_PATCH: u32 = 1;
/// The build SemVer field of the current build's version
pub static GAME_VERSION_BUILD: &str = "todo";
/// The prerelease SemVer field of the current build's version
pub static GAME_VERSION_PRERELEASE: &str = "";
/// The name of the game
pub static GAME_BRAND_NAME: &str = "Geosia";

/// A running dedicated server: the authoritative world behind a mutex, the chunk-generation
/// worker pool, and the network accept/tick loop (spec §5, §6). Dropping (or calling
/// [`GameServer::shutdown`]) stops every background thread.
pub struct GameServer {
    config: GameConfigHandle,
    world: Arc<Mutex<World>>,
    registries: Arc<GameRegistries>,
    worker_pool: Option<GenerationWorkerPool>,
    network: Option<NetworkServer>,
}

impl GameServer {
    /// Builds the world, synchronously generates the spawn region, starts the generation worker
    /// pool and the network accept/tick loop (spec §6's startup sequence).
    pub fn new(config: GameConfigHandle) -> Result<Arc<GameServer>> {
        let cfg = config.load();
        let registries = Arc::new(GameRegistries::builtin());
        let generator = Arc::new(WorldGenerator::new(WorldGenerator::default_parts(&registries)));
        let seed = if cfg.server.seed != 0 { cfg.server.seed } else { crate::generation::make_seed() };

        let mut world = World::new(seed, Arc::clone(&registries), Arc::clone(&generator));
        world.generate_region_sync(gs_schemas::coordinates::Dimension::OVERWORLD, cfg.server.generate_size);
        let world = Arc::new(Mutex::new(world));

        let worker_pool = GenerationWorkerPool::new(cfg.server.generate_thread_count, Arc::clone(&world), generator, Arc::clone(&registries));
        let network = if cfg.server.listen_addresses.is_empty() {
            None
        } else {
            Some(NetworkServer::start(Arc::clone(&config), Arc::clone(&world), Arc::clone(&registries))?)
        };

        info!(brand = GAME_BRAND_NAME, version = %format!("{GAME_VERSION_MAJOR}.{GAME_VERSION_MINOR}.{GAME_VERSION_PATCH}"), seed, "server started");

        Ok(Arc::new(Self {
            config,
            world,
            registries,
            worker_pool: Some(worker_pool),
            network,
        }))
    }

    /// Constructs a server with no listen addresses, suited for unit tests that only need the
    /// world/generation machinery running.
    pub fn new_test() -> Arc<GameServer> {
        let mut config = GameConfig::default();
        config.server.listen_addresses.clear();
        config.server.generate_size = 0;
        config.server.generate_thread_count = 1;
        Self::new(GameConfig::new_handle(config)).expect("failed to create test GameServer")
    }

    /// The shared world handle.
    pub fn world(&self) -> &Arc<Mutex<World>> {
        &self.world
    }

    /// The registries this server was built with.
    pub fn registries(&self) -> &Arc<GameRegistries> {
        &self.registries
    }

    /// The live, hot-swappable configuration handle.
    pub fn config_handle(&self) -> &GameConfigHandle {
        &self.config
    }

    /// The server's simulation tick duration, derived from [`config::ServerConfig::tick_rate`].
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.load().server.tick_rate.max(1) as f64)
    }

    /// Stops the network accept/tick loop and the generation worker pool, in that order so no
    /// worker is left mid-job against a world about to stop being touched.
    pub fn shutdown(mut self: Arc<Self>) {
        let server = Arc::get_mut(&mut self).expect("GameServer::shutdown called while other handles are still alive");
        if let Some(network) = server.network.take() {
            network.shutdown();
        }
        if let Some(pool) = server.worker_pool.take() {
            pool.shutdown();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_test_server_has_no_listen_addresses_and_boots_successfully() {
        let server = GameServer::new_test();
        assert!(server.config_handle().load().server.listen_addresses.is_empty());
        assert!(server.world().lock().unwrap().is_chunk_loaded(gs_schemas::coordinates::Dimension::OVERWORLD, gs_schemas::coordinates::AbsChunkPos::new(0, 0)));
    }
}
