//! Server/game configuration, shared between the accept loop and the world-tick loop through a
//! [`crate::concurrency::VersionedArc`] handle so an admin command can update it without locking
//! out either loop. Grounded on the teacher's own `ocg_common::config` (`smart-default` field
//! defaults, one top-level `GameConfig` holding a `ServerConfig`).

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::concurrency::VersionedArc;

/// The default TCP port the dedicated server listens on, per spec §6.
pub const DEFAULT_PORT: u16 = 12345;

/// Default number of chunk-generation worker threads (spec §4.4's `GenerateThreadCount`).
pub const DEFAULT_GENERATE_THREAD_COUNT: usize = 5;

// A zero-size worker pool would mean no chunk ever finishes generating; catch that at compile
// time rather than as a hang the first time a client requests an ungenerated chunk.
static_assertions::const_assert!(DEFAULT_GENERATE_THREAD_COUNT > 0);

/// Server-specific configuration. Derives `serde` so it can be dumped to (or loaded from) a config
/// file or an admin debug endpoint without hand-writing a second schema for it.
#[derive(Clone, Debug, SmartDefault, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Addresses/ports the server listens on.
    #[default(_code = "vec![SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))]")]
    pub listen_addresses: Vec<SocketAddr>,
    /// Maximum number of simultaneously connected clients.
    #[default = 16]
    pub max_players: usize,
    /// Display name advertised to connecting clients.
    #[default = "Geosia server"]
    pub server_title: String,
    /// Radius (in chunks) of the square region synchronously generated around the origin of each
    /// dimension before the server starts accepting connections (spec §4.4).
    #[default = 4]
    pub generate_size: i32,
    /// Number of worker threads in the chunk-generation pool (spec §4.4).
    #[default(DEFAULT_GENERATE_THREAD_COUNT)]
    pub generate_thread_count: usize,
    /// World simulation ticks per second (spec §4.6 specifies 20 Hz for the world-tick task).
    #[default = 20]
    pub tick_rate: u32,
    /// World generation seed. `0` means "pick one from [`crate::generation::WorldRandom::make_seed`]".
    #[default = 0]
    pub seed: u32,
}

/// Top-level game configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// Server-specific settings; present even on a client-only build so a local/integrated server
    /// can reuse the same type.
    pub server: ServerConfig,
}

/// A shared, hot-swappable handle to the running [`GameConfig`].
pub type GameConfigHandle = std::sync::Arc<VersionedArc<GameConfig>>;

impl GameConfig {
    /// Wraps a config value in a freshly allocated, shareable handle.
    pub fn new_handle(config: GameConfig) -> GameConfigHandle {
        std::sync::Arc::new(VersionedArc::new(config))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_server_config_listens_on_default_port() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addresses[0].port(), DEFAULT_PORT);
        assert_eq!(config.generate_thread_count, DEFAULT_GENERATE_THREAD_COUNT);
    }

    static_assertions::assert_impl_all!(GameConfig: serde::Serialize, serde::de::DeserializeOwned);
}
