//! The dedicated server's network layer: the accept loop, one reader and one writer thread per
//! connection, and the world-tick thread that steps physics and broadcasts render updates (spec
//! §4.6, §5). Grounded on the teacher's own `network::server` (the connected-clients table, the
//! per-connection bootstrap handshake), re-targeted from async capnp RPC over quinn onto blocking
//! `std::net::TcpStream` reader/writer threads per `SPEC_FULL.md` section C.

use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use glam::DVec3;
use gs_schemas::coordinates::{AbsBlockPos, AbsChunkPos, Dimension, InChunkPos, PositionF, PositionI, CHUNK_DIM3Z};
use gs_schemas::physics::{step as physics_step, PhysicsObject, Properties};
use gs_schemas::voxel::entity::EntityData;

use crate::config::GameConfigHandle;
use crate::network::protocol::{Client, Event, RenderBlock, RenderObject};
use crate::network::PeerAddress;
use crate::prelude::*;
use crate::registries::GameRegistries;
use crate::world::{EntityId, World};

/// How often the accept loop polls its (nonblocking) listener for a shutdown request between
/// connection attempts.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Spawn position for a freshly connected client's player entity: just above the default ground
/// height so it lands on generated terrain instead of falling through ungenerated chunks.
const SPAWN_POSITION: DVec3 = DVec3::new(0.0, 80.0, 0.0);

struct Session {
    client: Arc<Client>,
    outgoing: Sender<Event>,
}

/// Shared state every per-connection thread and the tick thread need a handle to.
struct Shared {
    world: Arc<Mutex<World>>,
    config: GameConfigHandle,
    sessions: Mutex<HashMap<PeerAddress, Session>>,
    shutdown: AtomicBool,
}

/// The running network+tick side of a dedicated server: an accept loop, a pool of per-connection
/// reader/writer threads (spawned as connections arrive), and a single world-tick thread (spec
/// §5: "server-side world ticks are serialized on the world lock").
pub struct NetworkServer {
    shared: Arc<Shared>,
    accept_thread: JoinHandle<()>,
    tick_thread: JoinHandle<()>,
}

impl NetworkServer {
    /// Binds the first configured listen address and starts the accept loop and tick thread.
    pub fn start(config: GameConfigHandle, world: Arc<Mutex<World>>, registries: Arc<GameRegistries>) -> Result<Self> {
        let listen_addr = config.load().server.listen_addresses.first().copied().context("no listen address configured")?;
        let listener = TcpListener::bind(listen_addr).with_context(|| format!("binding {listen_addr}"))?;
        listener.set_nonblocking(true).context("setting listener nonblocking")?;

        let shared = Arc::new(Shared {
            world,
            config,
            sessions: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
        });

        let accept_shared = Arc::clone(&shared);
        let accept_registries = Arc::clone(&registries);
        let accept_thread = std::thread::Builder::new()
            .name("gs-accept".to_owned())
            .spawn(move || accept_loop(listener, accept_shared, accept_registries))
            .context("spawning accept thread")?;

        let tick_shared = Arc::clone(&shared);
        let tick_thread = std::thread::Builder::new()
            .name("gs-tick".to_owned())
            .spawn(move || tick_loop(tick_shared))
            .context("spawning tick thread")?;

        info!(%listen_addr, "server listening");
        Ok(Self {
            shared,
            accept_thread,
            tick_thread,
        })
    }

    /// Signals the accept and tick loops to stop, and joins both threads. Per-connection threads
    /// are not explicitly joined: closing their socket (on the next tick broadcast failure, or the
    /// peer disconnecting) unblocks them on their own.
    pub fn shutdown(self) {
        self.shared.shutdown.store(true, AtomicOrdering::Relaxed);
        let _ = self.accept_thread.join();
        let _ = self.tick_thread.join();
    }
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>, registries: Arc<GameRegistries>) {
    while !shared.shutdown.load(AtomicOrdering::Relaxed) {
        match listener.accept() {
            Ok((stream, remote)) => {
                let local = stream.local_addr().unwrap_or(remote);
                let peer = PeerAddress::Network { local, remote };
                if let Err(e) = spawn_connection(stream, peer, Arc::clone(&shared), Arc::clone(&registries)) {
                    warn!(%peer, error = %e, "failed to start session");
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                error!(error = %e, "accept() failed");
                std::thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn spawn_connection(mut stream: TcpStream, peer: PeerAddress, shared: Arc<Shared>, registries: Arc<GameRegistries>) -> Result<()> {
    stream.set_nonblocking(false).context("setting stream blocking")?;

    let peer_version = crate::version::GameVersion::read(&mut stream).context("reading peer's version preamble")?;
    if let Err(e) = peer_version.check_compatible(&crate::version::GameVersion::CURRENT) {
        let _ = stream.shutdown(Shutdown::Both);
        bail!("{peer}: {e}");
    }

    let reader_stream = stream.try_clone().context("cloning stream for reader thread")?;
    let writer_stream = stream;

    let client = Arc::new(Client::new());
    let (tx, rx) = channel::<Event>();

    let universe_id = shared.world.lock().unwrap().universe_id();
    let entity_id = {
        let mut world = shared.world.lock().unwrap();
        let descriptor_id = registries.core_entities.player;
        let descriptor = registries
            .entities
            .lookup_id_to_object(descriptor_id)
            .context("player descriptor missing from registry")?;
        let physics = descriptor.spawn_physics(PositionF::new(Dimension::OVERWORLD, SPAWN_POSITION));
        let mut entity = EntityData::new(descriptor_id, physics);
        entity.refresh_render(0.0, 0.0);
        world.spawn_entity(entity)
    };
    *client.player_entity.lock().unwrap() = Some(entity_id);

    shared.sessions.lock().unwrap().insert(
        peer,
        Session {
            client: Arc::clone(&client),
            outgoing: tx.clone(),
        },
    );

    let _ = tx.send(Event::SendPlayer { entity_id, universe_id });

    let writer_client = Arc::clone(&client);
    std::thread::Builder::new()
        .name(format!("gs-writer-{peer}"))
        .spawn(move || writer_thread(writer_stream, rx, writer_client))
        .context("spawning writer thread")?;

    std::thread::Builder::new()
        .name(format!("gs-reader-{peer}"))
        .spawn(move || reader_thread(reader_stream, peer, client, shared))
        .context("spawning reader thread")?;

    info!(%peer, entity_id, "client connected");
    Ok(())
}

fn writer_thread(mut stream: TcpStream, rx: Receiver<Event>, client: Arc<Client>) {
    while let Ok(event) = rx.recv() {
        if let Err(e) = event.write(&mut stream, &client) {
            warn!(error = %e, "writer thread terminating");
            let _ = stream.shutdown(Shutdown::Both);
            break;
        }
    }
}

fn reader_thread(mut stream: TcpStream, peer: PeerAddress, client: Arc<Client>, shared: Arc<Shared>) {
    loop {
        let event = match Event::read(&mut stream, &client) {
            Ok(event) => event,
            Err(e) => {
                if !is_clean_disconnect(&e) {
                    warn!(%peer, error = %e, "reader thread terminating");
                }
                break;
            }
        };
        if let Err(e) = handle_client_event(event, &peer, &client, &shared) {
            warn!(%peer, error = %e, "error handling client event");
            break;
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
    shared.sessions.lock().unwrap().remove(&peer);
    if let Some(entity_id) = *client.player_entity.lock().unwrap() {
        if let Some(entity) = shared.world.lock().unwrap().entity_mut(entity_id) {
            entity.destroy();
        }
    }
    info!(%peer, "client disconnected");
}

fn is_clean_disconnect(err: &gs_schemas::codec::CodecError) -> bool {
    matches!(err, gs_schemas::codec::CodecError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
}

fn handle_client_event(event: Event, peer: &PeerAddress, client: &Arc<Client>, shared: &Arc<Shared>) -> Result<()> {
    match event {
        Event::RequestChunk(pos) => {
            shared.world.lock().unwrap().request_chunk(pos);
        }
        Event::RequestState => {
            client.need_state.store(true, AtomicOrdering::Relaxed);
        }
        Event::UpdatePositionAndVelocity { position, velocity } => {
            let Some(entity_id) = *client.player_entity.lock().unwrap() else {
                return Ok(());
            };
            let mut world = shared.world.lock().unwrap();
            if let Some(entity) = world.entity_mut(entity_id) {
                if let PhysicsObject::AABox {
                    position: pos_field,
                    velocity: vel_field,
                    ..
                } = &mut entity.physics
                {
                    *pos_field = position;
                    *vel_field = velocity;
                }
            }
        }
        other @ (Event::UpdateRenderObjects(_) | Event::SendPlayer { .. }) => {
            bail!("peer {peer} sent server-only event {other:?}");
        }
    }
    Ok(())
}

fn tick_loop(shared: Arc<Shared>) {
    let mut last_tick = std::time::Instant::now();
    loop {
        if shared.shutdown.load(AtomicOrdering::Relaxed) {
            break;
        }
        let tick_rate = shared.config.load().server.tick_rate.max(1);
        let tick_duration = Duration::from_secs_f64(1.0 / tick_rate as f64);

        let elapsed = last_tick.elapsed();
        if elapsed < tick_duration {
            std::thread::sleep(tick_duration - elapsed);
        }
        let dt = last_tick.elapsed().as_secs_f64();
        last_tick = std::time::Instant::now();

        run_tick(&shared, dt);
    }
}

fn run_tick(shared: &Arc<Shared>, dt: f64) {
    let mut world = shared.world.lock().unwrap();

    step_entities(&mut world, dt);
    world.reap_destroyed_entities();

    let mut updates = Vec::new();
    collect_pending_updates(&world, &mut updates);
    world.pending_client_updates.clear();

    let sessions = shared.sessions.lock().unwrap();
    for session in sessions.values() {
        if session.client.need_state.load(AtomicOrdering::Relaxed) {
            let full_snapshot = build_full_snapshot(&world);
            let _ = session.outgoing.send(Event::UpdateRenderObjects(full_snapshot));
            session.client.need_state.store(false, AtomicOrdering::Relaxed);
            session.client.got_state.store(true, AtomicOrdering::Relaxed);
        } else if !updates.is_empty() {
            let _ = session.outgoing.send(Event::UpdateRenderObjects(updates.clone()));
        }
    }
}

/// Steps every live entity's physics forward by `dt`. Each entity's object is cloned out, stepped
/// against an immutable reborrow of the world (for block collision) and the rest of the entities
/// (for entity-entity collision), then written back — avoiding a conflict between `CollisionWorld`'s
/// shared borrow of `World` and the need to mutate the entity being stepped.
fn step_entities(world: &mut World, dt: f64) {
    let ids: Vec<EntityId> = world.entities().filter(|(_, e)| e.good()).map(|(id, _)| id).collect();
    for id in ids {
        let Some(entity) = world.entity(id) else { continue };
        let mut physics = entity.physics.clone();
        let Some(dimension) = physics.position().map(|p| p.dimension) else { continue };

        let others: Vec<(DVec3, DVec3, DVec3, Properties)> = world
            .entities()
            .filter(|&(other_id, other)| other_id != id && other.good())
            .filter(|(_, other)| other.physics.position().is_some_and(|p| p.dimension == dimension))
            .filter_map(|(_, other)| {
                let (min, max) = other.physics.aabb()?;
                Some((min, max, other.velocity(), other.physics.properties()))
            })
            .collect();

        physics_step(&mut physics, &*world, &others, dt);

        if let Some(entity) = world.entity_mut(id) {
            entity.physics = physics;
            entity.refresh_render(0.0, 0.0);
        }
    }
}

fn collect_pending_updates(world: &World, out: &mut Vec<RenderObject>) {
    for pos in world.pending_client_updates.iter() {
        let (chunk_pos, _) = pos.pos.split_chunk_component();
        append_chunk_blocks(world, pos.dimension, chunk_pos, out);
    }
    for (id, entity) in world.entities() {
        if entity.good() {
            if let Some(snapshot) = entity.render {
                out.push(RenderObject::Entity {
                    entity_id: id,
                    snapshot: Some(snapshot),
                });
            }
        }
    }
}

fn build_full_snapshot(world: &World) -> Vec<RenderObject> {
    let mut out = Vec::new();
    for pos in world.generated.iter() {
        let (chunk_pos, _) = pos.pos.split_chunk_component();
        append_chunk_blocks(world, pos.dimension, chunk_pos, &mut out);
    }
    for (id, entity) in world.entities() {
        if entity.good() {
            if let Some(snapshot) = entity.render {
                out.push(RenderObject::Entity {
                    entity_id: id,
                    snapshot: Some(snapshot),
                });
            }
        }
    }
    out
}

fn append_chunk_blocks(world: &World, dimension: Dimension, chunk_pos: AbsChunkPos, out: &mut Vec<RenderObject>) {
    let Some(group) = world.group(dimension) else { return };
    let Some(chunk) = group.get_chunk(chunk_pos) else { return };
    let chunk = chunk.read();
    let origin = AbsBlockPos::from(chunk_pos);
    for idx in 0..CHUNK_DIM3Z {
        let Ok(in_chunk) = InChunkPos::try_from_index(idx) else { continue };
        let data = chunk.get(in_chunk);
        let Some(descriptor) = data.descriptor else { continue };
        let block_pos = origin + gs_schemas::coordinates::RelBlockPos::from_ivec3(glam::IVec3::from(in_chunk));
        out.push(RenderObject::Block(RenderBlock {
            position: PositionI::new(dimension, block_pos),
            descriptor,
            idata: data.idata,
            light: data.light,
        }));
    }
}
