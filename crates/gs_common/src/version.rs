//! `GameVersion`: the fixed-size handshake preamble a connecting client writes (and the server
//! reads first, before anything else on the connection) to reject an incompatible build before
//! either side commits any other resources to the session. Grounded on the original engine's
//! `game_version.h`/`game_version.cpp` handshake check, carried over per `SPEC_FULL.md` section B.

use std::io::{Read, Write};

use thiserror::Error;

use crate::{GAME_VERSION_MAJOR, GAME_VERSION_MINOR, GAME_VERSION_PATCH};

/// A build's major/minor/patch version, as exchanged at connection setup.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GameVersion {
    /// Major version; a mismatch here is always incompatible.
    pub major: u32,
    /// Minor version; a mismatch here is always incompatible (spec §4.6's handshake is exact-match,
    /// not semver-compatible-range, since the wire codec has no version negotiation of its own).
    pub minor: u32,
    /// Patch version; never checked, informational only.
    pub patch: u32,
}

impl GameVersion {
    /// This build's own version.
    pub const CURRENT: Self = Self {
        major: GAME_VERSION_MAJOR,
        minor: GAME_VERSION_MINOR,
        patch: GAME_VERSION_PATCH,
    };

    /// Writes this version as three big-endian `u32`s (spec §6's "Big-endian framing").
    pub fn write(&self, w: &mut impl Write) -> std::io::Result<()> {
        w.write_all(&self.major.to_be_bytes())?;
        w.write_all(&self.minor.to_be_bytes())?;
        w.write_all(&self.patch.to_be_bytes())
    }

    /// Reads a version written by [`Self::write`].
    pub fn read(r: &mut impl Read) -> std::io::Result<Self> {
        let mut buf = [0u8; 4];
        r.read_exact(&mut buf)?;
        let major = u32::from_be_bytes(buf);
        r.read_exact(&mut buf)?;
        let minor = u32::from_be_bytes(buf);
        r.read_exact(&mut buf)?;
        let patch = u32::from_be_bytes(buf);
        Ok(Self { major, minor, patch })
    }

    /// Checks `self` (the peer's version) against `current` (this build's own), per spec §4.6's
    /// handshake: major and minor must match exactly.
    pub fn check_compatible(&self, current: &GameVersion) -> Result<(), VersionMismatch> {
        if self.major != current.major || self.minor != current.minor {
            Err(VersionMismatch {
                peer: *self,
                ours: *current,
            })
        } else {
            Ok(())
        }
    }
}

/// A connecting peer's version doesn't match this build closely enough to safely talk the wire
/// protocol.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
#[error("incompatible protocol version: peer is {}.{}.{}, this build is {}.{}.{}", peer.major, peer.minor, peer.patch, ours.major, ours.minor, ours.patch)]
pub struct VersionMismatch {
    /// The version the peer sent.
    pub peer: GameVersion,
    /// This build's own version.
    pub ours: GameVersion,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_roundtrips_through_the_wire_format() {
        let version = GameVersion {
            major: 3,
            minor: 7,
            patch: 12,
        };
        let mut buf = Vec::new();
        version.write(&mut buf).unwrap();
        assert_eq!(GameVersion::read(&mut &buf[..]).unwrap(), version);
    }

    #[test]
    fn matching_major_minor_is_compatible_regardless_of_patch() {
        let ours = GameVersion { major: 1, minor: 2, patch: 0 };
        let peer = GameVersion { major: 1, minor: 2, patch: 99 };
        assert!(peer.check_compatible(&ours).is_ok());
    }

    #[test]
    fn mismatched_minor_is_incompatible() {
        let ours = GameVersion { major: 1, minor: 2, patch: 0 };
        let peer = GameVersion { major: 1, minor: 3, patch: 0 };
        assert!(peer.check_compatible(&ours).is_err());
    }
}
