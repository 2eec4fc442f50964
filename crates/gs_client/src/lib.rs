#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

//! The Geosia client core: the network reader/writer threads, the render-object world mirror, and
//! the chunk mesh generator (spec §3, §4.6). Rendering and windowing themselves are out of this
//! core's scope (spec §1); [`meshgen::RenderBackend`] is the seam a concrete renderer plugs into.

pub mod meshgen;
pub mod network;
pub mod render_world;

use std::time::Duration;

use clap::Parser;
use gs_common::prelude::*;
use gs_common::registries::GameRegistries;
use gs_schemas::coordinates::{Dimension, PositionF};
use glam::DVec3;

use crate::meshgen::{mesh_builder_thread, NullRenderBackend, RenderBackend};
use crate::network::ClientSession;

/// Command line options for the client binary (spec §6: `client --host HOST --port PORT`).
#[derive(Parser)]
#[command(name = "gs_client", about = "Geosia client")]
pub struct CliOptions {
    /// Server hostname or IP address to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to connect to.
    #[arg(long, default_value_t = gs_common::config::DEFAULT_PORT)]
    pub port: u16,
}

/// How often the client's own physics-input loop re-sends the local player's position while idle,
/// matching the dedicated server's tick cadence closely enough to avoid starving interpolation on
/// the far end.
const POSITION_UPDATE_INTERVAL: Duration = Duration::from_millis(50);

/// Connects to the configured server, starts the reader/writer/mesh-builder threads behind a
/// [`NullRenderBackend`], and blocks until the connection drops (spec §4.6's three-task client).
/// A real renderer embeds this core by constructing its own [`ClientSession`] and
/// [`meshgen::RenderBackend`] directly rather than calling this entry point.
pub fn run_client(options: CliOptions) -> Result<()> {
    run_client_with_backend(options, Arc::new(NullRenderBackend))
}

/// As [`run_client`], but with an explicit [`RenderBackend`] instead of the headless default.
pub fn run_client_with_backend(options: CliOptions, backend: Arc<dyn RenderBackend>) -> Result<()> {
    let registries = Arc::new(GameRegistries::builtin());
    let session = ClientSession::connect(&options.host, options.port).context("connecting to server")?;
    info!(host = %options.host, port = options.port, "connected to server");

    let shutdown = Arc::new(AtomicBool::new(false));
    let mesh_builder = {
        let registries = Arc::clone(&registries);
        let world = Arc::clone(session.world());
        let backend = Arc::clone(&backend);
        let shutdown = Arc::clone(&shutdown);
        std::thread::Builder::new()
            .name("gs-client-meshbuilder".to_owned())
            .spawn(move || mesh_builder_thread(registries, world, backend, shutdown))
            .context("spawning mesh-builder thread")?
    };

    while session.is_connected() && session.player_entity_id().is_none() {
        std::thread::sleep(POSITION_UPDATE_INTERVAL);
    }
    if session.player_entity_id().is_some() {
        session.send_position(PositionF::new(Dimension::OVERWORLD, DVec3::new(0.0, 80.0, 0.0)), DVec3::ZERO);
    }

    session.join();
    shutdown.store(true, AtomicOrdering::Relaxed);
    let _ = mesh_builder.join();
    Ok(())
}
