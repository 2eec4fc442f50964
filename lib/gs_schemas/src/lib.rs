//! Disk and network data serialization schemas shared between the client and server halves of the
//! game: coordinate newtypes, the registry system, chunk/block storage, the lighting model, the
//! continuous-AABB physics types and the byte-stream wire codec.

#![warn(missing_docs)]
#![allow(clippy::unusual_byte_groupings)]

use std::fmt::Debug;

use smallvec::SmallVec;

pub mod codec;
pub mod coordinates;
pub mod light;
pub mod mutwatcher;
pub mod physics;
pub mod range;
pub mod registry;
pub mod voxel;

/// Which side of the client/server split a piece of code is running on. Used by [`mutwatcher`]
/// to decide whether a mutation should be recorded as authoritative or as a local prediction.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum GameSide {
    /// The authoritative world simulation.
    Server,
    /// A client mirroring (and locally predicting) part of the server's state.
    Client,
}

/// Per-[`GsExtraData`] user-supplied associated data attached to chunks and chunk groups.
/// The game's storage types ([`voxel::chunk::Chunk`], [`voxel::chunk_group::ChunkGroup`]) are
/// generic over this so the server and client can each attach their own bookkeeping (a server
/// needs none of the client's render state, and a client needs none of the server's persistence
/// state) without either crate depending on the other's types.
pub trait GsExtraData: Clone + Debug + Send + Sync + 'static {
    /// Extra data stored on every chunk.
    type ChunkData: Clone + Debug + Send + Sync;
    /// Extra data stored on every chunk group.
    type GroupData: Clone + Debug + Send + Sync;
}

/// A copy-on-write small vector: either borrowed from a buffer being deserialized, or owned after
/// having been mutated or freshly constructed. Used for palette/data arrays read back from the
/// wire or a save file, where most chunks don't need their own allocation.
#[derive(Clone, Debug)]
pub enum SmallCowVec<'d, A: smallvec::Array>
where
    A::Item: Clone,
{
    /// Borrowed straight from an input buffer.
    Borrowed(&'d [A::Item]),
    /// Owned, either freshly built or after a copy-on-write mutation.
    Owned(SmallVec<A>),
}

impl<'d, A: smallvec::Array> SmallCowVec<'d, A>
where
    A::Item: Clone,
{
    /// Borrows the contents as a plain slice.
    pub fn as_slice(&self) -> &[A::Item] {
        match self {
            SmallCowVec::Borrowed(s) => s,
            SmallCowVec::Owned(v) => v.as_slice(),
        }
    }
}

impl<'d, A: smallvec::Array> From<SmallCowVec<'d, A>> for SmallVec<A>
where
    A::Item: Clone,
{
    fn from(value: SmallCowVec<'d, A>) -> Self {
        match value {
            SmallCowVec::Borrowed(s) => SmallVec::from_slice(s),
            SmallCowVec::Owned(v) => v,
        }
    }
}
