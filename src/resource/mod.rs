//! Resource accounting boundary.
//!
//! Policy lives outside this crate behind [`ResourceManager`]. The transports
//! only acquire one [`ConnectionScope`] per connection attempt, bind it to the
//! peer once known, and release it exactly once.

mod scope;

pub use scope::ConnectionScope;

use std::fmt;

use crate::address::Multiaddr;
use crate::core::ResourceError;
use crate::identity::PeerId;

/// Connection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Accepted from a remote peer.
    Inbound,
    /// Dialed by us.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

/// Scope handed out by a [`ResourceManager`] for one connection.
pub trait ConnManagementScope: Send + Sync {
    /// Attach the connection to a peer. May be refused by policy.
    fn set_peer(&self, peer: &PeerId) -> Result<(), ResourceError>;

    /// Release everything the scope holds. Called exactly once.
    fn done(&self);
}

/// Admission control for new connections.
pub trait ResourceManager: Send + Sync {
    /// Open a connection scope.
    ///
    /// `endpoint` is the remote address when it is known up front, for
    /// managers that make per-address decisions.
    fn open_connection(
        &self,
        direction: Direction,
        use_fd: bool,
        endpoint: Option<&Multiaddr>,
    ) -> Result<Box<dyn ConnManagementScope>, ResourceError>;
}

/// Resource manager that admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResourceManager;

struct NullScope;

impl ConnManagementScope for NullScope {
    fn set_peer(&self, _peer: &PeerId) -> Result<(), ResourceError> {
        Ok(())
    }

    fn done(&self) {}
}

impl ResourceManager for NullResourceManager {
    fn open_connection(
        &self,
        _direction: Direction,
        _use_fd: bool,
        _endpoint: Option<&Multiaddr>,
    ) -> Result<Box<dyn ConnManagementScope>, ResourceError> {
        Ok(Box::new(NullScope))
    }
}
