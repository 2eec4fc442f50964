//! The wire protocol: framed events exchanged between a connected client and the server, and the
//! per-session [`Client`] asset registry that lets either side intern shared content once per
//! connection instead of resending it with every reference (spec §4.2, §4.6). Grounded on the
//! original engine's `client.h`/`client_server.h` (`Client::getId`/`makeId`/`getPtr`/`setPtr`
//! asset table, the `send`/`receive` event framing), re-targeted from capnp RPC onto this crate's
//! own byte-stream codec over a blocking `TcpStream` per `SPEC_FULL.md` section C.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use glam::DVec3;
use gs_schemas::codec::{ByteStreamReader, ByteStreamWriter, CodecError, CodecResult};
use gs_schemas::coordinates::{AbsBlockPos, Dimension, PositionF, PositionI};
use gs_schemas::light::Lighting;
use gs_schemas::registry::RegistryId;
use gs_schemas::voxel::entity::RenderObjectEntity;

use crate::prelude::*;

/// The reserved id meaning "no object", per spec §4.2.
pub const NULL_ID: u64 = 0;

/// Every shared content category a [`Client`] keeps an interning table for (spec §4.2). Only
/// [`DataType::BlockMesh`] and [`DataType::EntityMesh`] are exercised by this core's own wire
/// events; the rest exist as registry slots a content layer built on top of this core can use for
/// its own asset kinds without inventing a second interning mechanism.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DataType {
    /// A texture/image asset.
    Image,
    /// A block kind's render mesh.
    BlockMesh,
    /// An entity kind's render mesh.
    EntityMesh,
    /// One live entity instance.
    EntityInstance,
    /// A named set of entities.
    EntitySet,
    /// A render world (a client's mirrored view of a server `World`).
    RenderWorld,
    /// A boolean flag.
    Flag,
    /// An update list.
    UpdateList,
    /// A vector/position value.
    Vector,
    /// A floating point value.
    Float,
    /// A content script.
    Script,
    /// The locally controlled player entity.
    Player,
    /// A physics world.
    PhysicsWorld,
}

/// Global, process-wide counter assigning ids across every connected session's tables, per spec
/// §4.2 ("other IDs are assigned monotonically from a process-global counter"). Starts at `1`
/// since `0` is [`NULL_ID`].
static NEXT_ASSET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct InternTable {
    id_to_key: HashMap<u64, u64>,
    key_to_id: HashMap<u64, u64>,
}

/// The per-connection asset registry: content-addressed two-way maps between opaque 64-bit ids
/// and a content key (spec §4.2). Objects are identified by a caller-supplied `u64` content key
/// (e.g. a block descriptor's [`RegistryId`] cast to `u64`), rather than by value, since the
/// session never needs to materialize the content itself — only to agree with its peer on which
/// id refers to which piece of already-shared content.
#[derive(Default)]
pub struct Client {
    tables: Mutex<HashMap<DataType, InternTable>>,
    /// Whether this session has received the server's full initial state (spec §4.6
    /// `RequestState`/response handshake).
    pub got_state: AtomicBool,
    /// Whether this session has asked for the server's full initial state and is waiting on it.
    pub need_state: AtomicBool,
    /// The entity id backing this session's player, once spawned.
    pub player_entity: Mutex<Option<crate::world::EntityId>>,
}

impl Client {
    /// Constructs an empty session registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The id currently bound to `content_key` under `ty`, or [`NULL_ID`] if none.
    pub fn get_id(&self, ty: DataType, content_key: u64) -> u64 {
        let tables = self.tables.lock().unwrap();
        tables.get(&ty).and_then(|t| t.key_to_id.get(&content_key)).copied().unwrap_or(NULL_ID)
    }

    /// The content key bound to `id` under `ty`, if any.
    pub fn get_ptr(&self, ty: DataType, id: u64) -> Option<u64> {
        let tables = self.tables.lock().unwrap();
        tables.get(&ty).and_then(|t| t.id_to_key.get(&id)).copied()
    }

    /// Allocates a fresh id for `content_key` under `ty` and binds both directions. Panics if
    /// `content_key` is already bound (callers should check [`Client::get_id`] first).
    pub fn make_id(&self, ty: DataType, content_key: u64) -> u64 {
        let id = NEXT_ASSET_ID.fetch_add(1, Ordering::Relaxed);
        self.set_ptr(ty, id, content_key);
        id
    }

    /// Directly binds `id` to `content_key` under `ty`, overwriting any prior binding for either
    /// side. Used when the peer dictates the id (e.g. restoring a previously negotiated mapping).
    pub fn set_ptr(&self, ty: DataType, id: u64, content_key: u64) {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(ty).or_default();
        table.id_to_key.insert(id, content_key);
        table.key_to_id.insert(content_key, id);
    }

    /// Removes the binding for `id` under `ty`, if any.
    pub fn remove_id(&self, ty: DataType, id: u64) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(table) = tables.get_mut(&ty) {
            if let Some(key) = table.id_to_key.remove(&id) {
                table.key_to_id.remove(&key);
            }
        }
    }

    /// Removes the binding for `content_key` under `ty`, if any.
    pub fn remove_ptr(&self, ty: DataType, content_key: u64) {
        let mut tables = self.tables.lock().unwrap();
        if let Some(table) = tables.get_mut(&ty) {
            if let Some(id) = table.key_to_id.remove(&content_key) {
                table.id_to_key.remove(&id);
            }
        }
    }

    /// Writes an id for `content_key` under `ty`, allocating and writing the binding payload on
    /// first reference. `write_payload` is only called (and only its result written) the first
    /// time this connection has ever referenced `content_key`.
    fn write_interned(&self, w: &mut impl Write, ty: DataType, content_key: u64, write_payload: impl FnOnce(&mut dyn Write) -> CodecResult<()>) -> CodecResult<()> {
        let existing = self.get_id(ty, content_key);
        if existing != NULL_ID {
            w.write_u64(existing)?;
            return Ok(());
        }
        let id = self.make_id(ty, content_key);
        w.write_u64(id)?;
        write_payload(w)
    }

    /// Reads an id under `ty`, resolving it against `read_payload` on first reference (the
    /// payload is only present on the wire the first time the sender referenced this content).
    fn read_interned(&self, r: &mut impl Read, ty: DataType, read_payload: impl FnOnce(&mut dyn Read) -> CodecResult<u64>) -> CodecResult<u64> {
        let id = r.read_u64()?;
        if let Some(key) = self.get_ptr(ty, id) {
            return Ok(key);
        }
        let key = read_payload(r)?;
        self.set_ptr(ty, id, key);
        Ok(key)
    }
}

/// One block-level render update: a position, its current lighting, and the id of its mesh
/// (interned the first time this connection has ever seen this block kind).
#[derive(Copy, Clone, Debug)]
pub struct RenderBlock {
    /// World position of the updated block.
    pub position: PositionI,
    /// The block's kind, by registry id.
    pub descriptor: RegistryId,
    /// Kind-specific payload.
    pub idata: i32,
    /// Current lighting.
    pub light: Lighting,
}

/// One render-object update sent in an [`Event::UpdateRenderObjects`] batch: either a block
/// change or an entity snapshot (spec §3, §4.6).
#[derive(Clone, Debug)]
pub enum RenderObject {
    /// A block changed at a position.
    Block(RenderBlock),
    /// An entity's render snapshot changed (or the entity was destroyed, carrying its last known
    /// snapshot one final time, per spec §3 Lifecycles).
    Entity {
        /// Stable id identifying this entity instance across updates.
        entity_id: u64,
        /// The snapshot, or `None` if this is the entity's final (destruction) update.
        snapshot: Option<RenderObjectEntity>,
    },
}

impl RenderObject {
    fn write(&self, w: &mut impl Write, client: &Client) -> CodecResult<()> {
        match self {
            RenderObject::Block(block) => {
                w.write_u8(0)?;
                w.write_u32(block.position.dimension.0)?;
                w.write_i32(block.position.pos.x)?;
                w.write_i32(block.position.pos.y)?;
                w.write_i32(block.position.pos.z)?;
                w.write_i32(block.idata)?;
                w.write_u16(block.light.as_packed())?;
                let key = block.descriptor.as_u32() as u64;
                client.write_interned(w, DataType::BlockMesh, key, |w| w.write_u64(key))
            }
            RenderObject::Entity { entity_id, snapshot } => {
                w.write_u8(1)?;
                w.write_u64(*entity_id)?;
                match snapshot {
                    None => w.write_bool(false),
                    Some(snap) => {
                        w.write_bool(true)?;
                        w.write_u32(snap.position.dimension.0)?;
                        w.write_f64(snap.position.pos.x)?;
                        w.write_f64(snap.position.pos.y)?;
                        w.write_f64(snap.position.pos.z)?;
                        w.write_f64(snap.velocity.x)?;
                        w.write_f64(snap.velocity.y)?;
                        w.write_f64(snap.velocity.z)?;
                        w.write_f32(snap.phi)?;
                        w.write_f32(snap.theta)?;
                        let key = snap.descriptor.as_u32() as u64;
                        client.write_interned(w, DataType::EntityMesh, key, |w| w.write_u64(key))
                    }
                }
            }
        }
    }

    fn read(r: &mut impl Read, client: &Client) -> CodecResult<Self> {
        match r.read_u8()? {
            0 => {
                let dimension = Dimension::new(r.read_u32()?);
                let x = r.read_i32()?;
                let y = r.read_i32()?;
                let z = r.read_i32()?;
                let idata = r.read_i32()?;
                let light = Lighting::from_packed(r.read_u16()?).unwrap_or_default();
                let key = client.read_interned(r, DataType::BlockMesh, |r| r.read_u64())?;
                let descriptor = registry_id_from_key(key)?;
                Ok(RenderObject::Block(RenderBlock {
                    position: PositionI::new(dimension, AbsBlockPos::new(x, y, z)),
                    descriptor,
                    idata,
                    light,
                }))
            }
            1 => {
                let entity_id = r.read_u64()?;
                let snapshot = if r.read_bool()? {
                    let dimension = Dimension::new(r.read_u32()?);
                    let px = r.read_f64()?;
                    let py = r.read_f64()?;
                    let pz = r.read_f64()?;
                    let vx = r.read_f64()?;
                    let vy = r.read_f64()?;
                    let vz = r.read_f64()?;
                    let phi = r.read_f32()?;
                    let theta = r.read_f32()?;
                    let key = client.read_interned(r, DataType::EntityMesh, |r| r.read_u64())?;
                    Some(RenderObjectEntity {
                        descriptor: registry_id_from_key(key)?,
                        position: PositionF::new(dimension, DVec3::new(px, py, pz)),
                        velocity: DVec3::new(vx, vy, vz),
                        phi,
                        theta,
                    })
                } else {
                    None
                };
                Ok(RenderObject::Entity { entity_id, snapshot })
            }
            other => Err(CodecError::OutOfBounds {
                value: other as i64,
                min: 0,
                max: 1,
            }),
        }
    }
}

fn registry_id_from_key(key: u64) -> CodecResult<RegistryId> {
    let raw = u32::try_from(key).map_err(|_| CodecError::OutOfBounds {
        value: key as i64,
        min: 1,
        max: u32::MAX as i64,
    })?;
    std::num::NonZeroU32::new(raw).map(RegistryId::new).ok_or(CodecError::OutOfBounds {
        value: 0,
        min: 1,
        max: u32::MAX as i64,
    })
}

/// One message in either direction of the wire protocol (spec §4.6). Framed as a one-byte event
/// tag followed by a fixed payload layout; there is no outer length prefix since every event's
/// payload is self-delimiting (fixed fields plus length-prefixed collections).
#[derive(Clone, Debug)]
pub enum Event {
    /// Server → client: a batch of block/entity render updates (sent once per tick, spec §4.6).
    UpdateRenderObjects(Vec<RenderObject>),
    /// Client → server: the sending client's authoritative input-derived position/velocity for
    /// its own player entity (spec §4.6). Also used server → client for every other visible
    /// entity as part of [`Event::UpdateRenderObjects`] instead, so this variant only ever flows
    /// client → server.
    UpdatePositionAndVelocity {
        /// New position.
        position: PositionF,
        /// New velocity.
        velocity: DVec3,
    },
    /// Client → server: ask the world to (generate and) load the chunk column containing
    /// `position` (spec §4.4, §4.6).
    RequestChunk(PositionI),
    /// Client → server: ask for a full snapshot of every currently loaded render object (spec
    /// §4.6's initial handshake).
    RequestState,
    /// Server → client: binds this session's player entity id (spec §4.6's initial handshake).
    SendPlayer {
        /// The stable id of the client's player entity, for use in [`Event::UpdatePositionAndVelocity`]
        /// replies and in matching future [`RenderObject::Entity`] updates against "that's me".
        entity_id: u64,
        /// The server world's [`crate::world::World::universe_id`], so a reconnecting client can
        /// tell whether it landed back on the same running world or a different one (and, in the
        /// latter case, drop any locally cached render-world state instead of trusting it).
        universe_id: uuid::Uuid,
    },
}

impl Event {
    const TAG_UPDATE_RENDER_OBJECTS: u8 = 0;
    const TAG_UPDATE_POSITION_AND_VELOCITY: u8 = 1;
    const TAG_REQUEST_CHUNK: u8 = 2;
    const TAG_REQUEST_STATE: u8 = 3;
    const TAG_SEND_PLAYER: u8 = 4;

    /// Writes this event's frame: a one-byte tag, then its payload.
    pub fn write(&self, w: &mut impl Write, client: &Client) -> CodecResult<()> {
        match self {
            Event::UpdateRenderObjects(objects) => {
                w.write_u8(Self::TAG_UPDATE_RENDER_OBJECTS)?;
                w.write_u32(objects.len() as u32)?;
                for obj in objects {
                    obj.write(w, client)?;
                }
                Ok(())
            }
            Event::UpdatePositionAndVelocity { position, velocity } => {
                w.write_u8(Self::TAG_UPDATE_POSITION_AND_VELOCITY)?;
                w.write_u32(position.dimension.0)?;
                w.write_f64(position.pos.x)?;
                w.write_f64(position.pos.y)?;
                w.write_f64(position.pos.z)?;
                w.write_f64(velocity.x)?;
                w.write_f64(velocity.y)?;
                w.write_f64(velocity.z)
            }
            Event::RequestChunk(pos) => {
                w.write_u8(Self::TAG_REQUEST_CHUNK)?;
                w.write_u32(pos.dimension.0)?;
                w.write_i32(pos.pos.x)?;
                w.write_i32(pos.pos.y)?;
                w.write_i32(pos.pos.z)
            }
            Event::RequestState => w.write_u8(Self::TAG_REQUEST_STATE),
            Event::SendPlayer { entity_id, universe_id } => {
                w.write_u8(Self::TAG_SEND_PLAYER)?;
                w.write_u64(*entity_id)?;
                let (hi, lo) = universe_id.as_u64_pair();
                w.write_u64(hi)?;
                w.write_u64(lo)
            }
        }
    }

    /// Reads one event frame.
    pub fn read(r: &mut impl Read, client: &Client) -> CodecResult<Self> {
        match r.read_u8()? {
            Self::TAG_UPDATE_RENDER_OBJECTS => {
                let count = r.read_u32()? as usize;
                let mut objects = Vec::with_capacity(count.min(1 << 16));
                for _ in 0..count {
                    objects.push(RenderObject::read(r, client)?);
                }
                Ok(Event::UpdateRenderObjects(objects))
            }
            Self::TAG_UPDATE_POSITION_AND_VELOCITY => {
                let dimension = Dimension::new(r.read_u32()?);
                let px = r.read_f64()?;
                let py = r.read_f64()?;
                let pz = r.read_f64()?;
                let vx = r.read_f64()?;
                let vy = r.read_f64()?;
                let vz = r.read_f64()?;
                Ok(Event::UpdatePositionAndVelocity {
                    position: PositionF::new(dimension, DVec3::new(px, py, pz)),
                    velocity: DVec3::new(vx, vy, vz),
                })
            }
            Self::TAG_REQUEST_CHUNK => {
                let dimension = Dimension::new(r.read_u32()?);
                let x = r.read_i32()?;
                let y = r.read_i32()?;
                let z = r.read_i32()?;
                Ok(Event::RequestChunk(PositionI::new(dimension, AbsBlockPos::new(x, y, z))))
            }
            Self::TAG_REQUEST_STATE => Ok(Event::RequestState),
            Self::TAG_SEND_PLAYER => {
                let entity_id = r.read_u64()?;
                let hi = r.read_u64()?;
                let lo = r.read_u64()?;
                Ok(Event::SendPlayer {
                    entity_id,
                    universe_id: uuid::Uuid::from_u64_pair(hi, lo),
                })
            }
            other => Err(CodecError::OutOfBounds {
                value: other as i64,
                min: 0,
                max: 4,
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use gs_schemas::light::Lighting;

    use super::*;

    fn id(n: u32) -> RegistryId {
        RegistryId::new(std::num::NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn interned_block_mesh_is_sent_once_per_connection() {
        let client = Client::new();
        let block = RenderBlock {
            position: PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(1, 2, 3)),
            descriptor: id(7),
            idata: 0,
            light: Lighting::default(),
        };
        let event = Event::UpdateRenderObjects(vec![RenderObject::Block(block)]);

        let mut first = Vec::new();
        event.write(&mut first, &client).unwrap();
        let mut second = Vec::new();
        event.write(&mut second, &client).unwrap();

        // The second write references the same block kind, so it must be strictly shorter: no
        // repeated payload, only the (already-bound) id.
        assert!(second.len() < first.len());
    }

    #[test]
    fn event_roundtrips_through_the_wire_format() {
        let writer_client = Client::new();
        let reader_client = Client::new();
        let event = Event::RequestChunk(PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(16, 0, -16)));

        let mut buf = Vec::new();
        event.write(&mut buf, &writer_client).unwrap();
        let read_back = Event::read(&mut &buf[..], &reader_client).unwrap();

        match read_back {
            Event::RequestChunk(pos) => assert_eq!(pos, PositionI::new(Dimension::OVERWORLD, AbsBlockPos::new(16, 0, -16))),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn send_player_roundtrips_its_universe_id() {
        let writer_client = Client::new();
        let reader_client = Client::new();
        let universe_id = uuid::Uuid::from_u64_pair(0x1122_3344_5566_7788, 0x99AA_BBCC_DDEE_FF00);
        let event = Event::SendPlayer { entity_id: 42, universe_id };

        let mut buf = Vec::new();
        event.write(&mut buf, &writer_client).unwrap();
        let read_back = Event::read(&mut &buf[..], &reader_client).unwrap();

        match read_back {
            Event::SendPlayer { entity_id, universe_id: read_universe_id } => {
                assert_eq!(entity_id, 42);
                assert_eq!(read_universe_id, universe_id);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn client_make_id_never_returns_null() {
        let client = Client::new();
        let id = client.make_id(DataType::Script, 42);
        assert_ne!(id, NULL_ID);
        assert_eq!(client.get_id(DataType::Script, 42), id);
        assert_eq!(client.get_ptr(DataType::Script, id), Some(42));
    }

    #[test]
    fn client_remove_clears_both_directions() {
        let client = Client::new();
        let id = client.make_id(DataType::Image, 9);
        client.remove_id(DataType::Image, id);
        assert_eq!(client.get_id(DataType::Image, 9), NULL_ID);
        assert_eq!(client.get_ptr(DataType::Image, id), None);
    }
}
