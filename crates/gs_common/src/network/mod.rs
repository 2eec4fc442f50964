//! The networking layer of the game.

use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub mod protocol;
pub mod server;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
/// Address uniquely identifying a connected network peer, on the other side of one TCP connection.
pub enum PeerAddress {
    /// A remote, over-the-network connection to a given peer at the specified IP address and port, connected to a local IP and port.
    Network {
        /// The local network interface address and port bound for this peer
        local: SocketAddr,
        /// The peer's address and port
        remote: SocketAddr,
    },
}

impl PeerAddress {
    /// Obtains the underlying socket address for this peer.
    pub fn remote_addr(self) -> SocketAddr {
        match self {
            PeerAddress::Network { remote, .. } => remote,
        }
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network { local, remote } => write!(f, "Remote:({local} -> {remote})"),
        }
    }
}
