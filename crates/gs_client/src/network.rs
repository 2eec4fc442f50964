//! The client's half of the wire protocol: one writer thread draining an outgoing event queue and
//! one reader thread applying incoming [`RenderObject`] updates to a [`RenderObjectWorld`] (spec
//! §4.6's "reader, writer, mesh-builder" three-task split; this module is the first two).
//! Grounded on `gs_common::network::server`'s own reader/writer thread pair, mirrored onto the
//! other end of the same blocking `TcpStream` and the same [`Event`]/[`Client`] wire types.

use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use gs_common::network::protocol::{Client, Event};
use gs_common::prelude::*;
use gs_schemas::coordinates::PositionF;

use crate::render_world::RenderObjectWorld;

/// How often the writer thread wakes up to drain any chunks the mesh-builder has marked as wanted,
/// independent of whatever outgoing queue traffic is already flowing (spec §4.6: "each position
/// sent at most once per session").
const CHUNK_REQUEST_INTERVAL: Duration = Duration::from_millis(200);

/// Maximum number of `RequestChunk` messages the writer thread will emit per sweep, so a newly
/// connected client with a large needed-chunks backlog doesn't flood the connection in one burst.
const CHUNK_REQUEST_BATCH: usize = 64;

/// A connection to a dedicated server: the shared per-session asset table, the render-object world
/// it is populating, and the handles needed to send outgoing events and shut the connection down.
pub struct ClientSession {
    client: Arc<Client>,
    world: Arc<Mutex<RenderObjectWorld>>,
    outgoing: Sender<Event>,
    player_entity: Mutex<Option<u64>>,
    universe_id: Mutex<Option<uuid::Uuid>>,
    shutdown: Arc<AtomicBool>,
    reader_thread: Mutex<Option<JoinHandle<()>>>,
    writer_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ClientSession {
    /// Connects to `host:port`, performs the initial `RequestState` handshake, and starts the
    /// reader and writer threads (spec §4.6's initial-state handshake: "a freshly connected client
    /// sends `RequestState` and waits for the resulting `UpdateRenderObjects` batch").
    pub fn connect(host: &str, port: u16) -> Result<Arc<Self>> {
        let mut stream = TcpStream::connect((host, port)).with_context(|| format!("connecting to {host}:{port}"))?;
        stream.set_nonblocking(false).context("setting stream blocking")?;
        gs_common::version::GameVersion::CURRENT
            .write(&mut stream)
            .context("writing version preamble")?;
        let reader_stream = stream.try_clone().context("cloning stream for reader thread")?;
        let writer_stream = stream;

        let client = Arc::new(Client::new());
        let world = Arc::new(Mutex::new(RenderObjectWorld::new()));
        let (tx, rx) = channel::<Event>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let writer_client = Arc::clone(&client);
        let writer_world = Arc::clone(&world);
        let writer_shutdown = Arc::clone(&shutdown);
        let writer_thread = std::thread::Builder::new()
            .name("gs-client-writer".to_owned())
            .spawn(move || writer_thread(writer_stream, rx, writer_client, writer_world, writer_shutdown))
            .context("spawning writer thread")?;

        let session = Arc::new(Self {
            client: Arc::clone(&client),
            world: Arc::clone(&world),
            outgoing: tx,
            player_entity: Mutex::new(None),
            universe_id: Mutex::new(None),
            shutdown: Arc::clone(&shutdown),
            reader_thread: Mutex::new(None),
            writer_thread: Mutex::new(Some(writer_thread)),
        });

        let reader_session = Arc::clone(&session);
        let reader_thread = std::thread::Builder::new()
            .name("gs-client-reader".to_owned())
            .spawn(move || reader_thread(reader_stream, client, reader_session))
            .context("spawning reader thread")?;
        *session.reader_thread.lock().unwrap() = Some(reader_thread);

        session.request_state();
        Ok(session)
    }

    /// Sends the local player's current position/velocity to the server (spec §4.6).
    pub fn send_position(&self, position: PositionF, velocity: glam::DVec3) {
        let _ = self.outgoing.send(Event::UpdatePositionAndVelocity { position, velocity });
    }

    /// Asks the server for a full snapshot of every currently loaded render object.
    pub fn request_state(&self) {
        let _ = self.outgoing.send(Event::RequestState);
    }

    /// The client's own player entity id, once the server has sent [`Event::SendPlayer`].
    pub fn player_entity_id(&self) -> Option<u64> {
        *self.player_entity.lock().unwrap()
    }

    /// The connected server world's [`gs_common::world::World::universe_id`], once the handshake
    /// has completed. `None` until then, or across a reconnect that hasn't replied yet.
    pub fn universe_id(&self) -> Option<uuid::Uuid> {
        *self.universe_id.lock().unwrap()
    }

    /// The shared render-object world this session is populating, for the mesh-builder thread.
    pub fn world(&self) -> &Arc<Mutex<RenderObjectWorld>> {
        &self.world
    }

    /// The per-session asset interning table, shared with the wire codec.
    pub fn asset_table(&self) -> &Arc<Client> {
        &self.client
    }

    /// Whether the reader/writer threads are still up. Goes `false` once either side closes the
    /// connection, letting a caller waiting on a handshake response bail out instead of blocking
    /// forever against a server that has already hung up.
    pub fn is_connected(&self) -> bool {
        !self.shutdown.load(AtomicOrdering::Relaxed)
    }

    /// Signals both threads to stop. Neither is explicitly joined: the reader thread is blocked in
    /// a socket read that only this call's `TcpStream::shutdown` (triggered once the writer thread
    /// notices `shutdown` and closes its half) or the peer disconnecting unblocks on its own,
    /// mirroring the dedicated server's own per-connection threads.
    pub fn shutdown(self: &Arc<Self>) {
        self.shutdown.store(true, AtomicOrdering::Relaxed);
        let _ = self.outgoing.send(Event::RequestState); // wakes the writer's recv() if idle
    }

    /// Blocks until the reader thread has exited, for callers (e.g. the CLI entry point) that want
    /// to wait for a clean disconnect before the process exits.
    pub fn join(&self) {
        if let Some(handle) = self.reader_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.writer_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

fn writer_thread(mut stream: TcpStream, rx: Receiver<Event>, client: Arc<Client>, world: Arc<Mutex<RenderObjectWorld>>, shutdown: Arc<AtomicBool>) {
    let _span = tracing::info_span!("gs-client-writer").entered();
    loop {
        match rx.recv_timeout(CHUNK_REQUEST_INTERVAL) {
            Ok(event) => {
                if let Err(e) = event.write(&mut stream, &client) {
                    warn!(error = %e, "client writer thread terminating");
                    break;
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }

        if shutdown.load(AtomicOrdering::Relaxed) {
            break;
        }

        let wanted = world.lock().unwrap().drain_needed_chunks(CHUNK_REQUEST_BATCH);
        for pos in wanted {
            if let Err(e) = Event::RequestChunk(pos).write(&mut stream, &client) {
                warn!(error = %e, "client writer thread terminating");
                let _ = stream.shutdown(Shutdown::Both);
                return;
            }
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
}

fn reader_thread(mut stream: TcpStream, client: Arc<Client>, session: Arc<ClientSession>) {
    let _span = tracing::info_span!("gs-client-reader").entered();
    loop {
        if session.shutdown.load(AtomicOrdering::Relaxed) {
            break;
        }
        let event = match Event::read(&mut stream, &client) {
            Ok(event) => event,
            Err(e) => {
                if !is_clean_disconnect(&e) {
                    warn!(error = %e, "client reader thread terminating");
                }
                break;
            }
        };
        handle_server_event(event, &session);
    }
    session.shutdown.store(true, AtomicOrdering::Relaxed);
    let _ = stream.shutdown(Shutdown::Both);
    info!("disconnected from server");
}

fn handle_server_event(event: Event, session: &Arc<ClientSession>) {
    match event {
        Event::UpdateRenderObjects(objects) => {
            let mut world = session.world.lock().unwrap();
            for object in objects {
                world.apply(object);
            }
        }
        Event::SendPlayer { entity_id, universe_id } => {
            let previous = session.universe_id.lock().unwrap().replace(universe_id);
            if previous.is_some_and(|prev| prev != universe_id) {
                warn!(%universe_id, "server's universe id changed; discarding stale render world");
                *session.world.lock().unwrap() = RenderObjectWorld::new();
            }
            *session.player_entity.lock().unwrap() = Some(entity_id);
        }
        other @ (Event::UpdatePositionAndVelocity { .. } | Event::RequestChunk(_) | Event::RequestState) => {
            warn!(event = ?other, "server sent a client-only event");
        }
    }
}

fn is_clean_disconnect(err: &gs_schemas::codec::CodecError) -> bool {
    matches!(err, gs_schemas::codec::CodecError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof)
}

#[cfg(test)]
mod test {
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn connect_fails_cleanly_against_a_closed_port() {
        // Bind and immediately drop a listener to get a port nothing is listening on anymore.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(ClientSession::connect("127.0.0.1", port).is_err());
    }
}
