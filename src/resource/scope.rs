//! Linear connection scope handle.

use std::fmt;

use tracing::debug;

use super::{ConnManagementScope, Direction, ResourceManager};
use crate::address::Multiaddr;
use crate::core::ResourceError;
use crate::identity::PeerId;

/// One connection's claim on accounted resources.
///
/// Acquired before the substrate session exists, bound to a peer at most
/// once, and released exactly once: either explicitly through
/// [`release`](Self::release) or when the handle is dropped. Dropping covers
/// every early return and a cancelled dial future alike.
pub struct ConnectionScope {
    inner: Option<Box<dyn ConnManagementScope>>,
    direction: Direction,
    peer: Option<PeerId>,
}

impl ConnectionScope {
    /// Acquire a scope from `rcmgr`.
    pub fn open(
        rcmgr: &dyn ResourceManager,
        direction: Direction,
        endpoint: Option<&Multiaddr>,
    ) -> Result<Self, ResourceError> {
        let inner = rcmgr.open_connection(direction, false, endpoint)?;
        Ok(Self {
            inner: Some(inner),
            direction,
            peer: None,
        })
    }

    /// Bind the scope to `peer`.
    ///
    /// Binding an already bound scope fails with [`ResourceError::Blocked`]
    /// and leaves the first binding in place.
    pub fn bind(&mut self, peer: &PeerId) -> Result<(), ResourceError> {
        if let Some(bound) = &self.peer {
            return Err(ResourceError::Blocked(format!("scope already bound to {bound}")));
        }
        let Some(inner) = &self.inner else {
            return Err(ResourceError::Blocked("scope already released".into()));
        };
        inner.set_peer(peer)?;
        self.peer = Some(peer.clone());
        Ok(())
    }

    /// Direction the scope was opened for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Peer the scope is bound to, if any.
    pub fn peer(&self) -> Option<&PeerId> {
        self.peer.as_ref()
    }

    /// Whether the scope is bound.
    pub fn is_bound(&self) -> bool {
        self.peer.is_some()
    }

    /// Release the scope now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(inner) = self.inner.take() {
            debug!(direction = %self.direction, peer = ?self.peer, "releasing connection scope");
            inner.done();
        }
    }
}

impl Drop for ConnectionScope {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for ConnectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionScope")
            .field("direction", &self.direction)
            .field("peer", &self.peer)
            .field("released", &self.inner.is_none())
            .finish()
    }
}
