//! Authenticated connections.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::Stream;
use crate::address::{AddressCodec, Multiaddr};
use crate::core::{MuxedSession, SubstrateError, TransportResult};
use crate::identity::{PeerId, PeerIdentity, PublicKey};
use crate::resource::{ConnectionScope, Direction};

/// One authenticated, multiplexed session with a remote peer.
///
/// Owns the session and its [`ConnectionScope`]. Closing the connection
/// closes both, once; dropping an open connection does the same.
pub struct Conn<C: AddressCodec> {
    session: Box<dyn MuxedSession<C::Native>>,
    scope: Mutex<Option<ConnectionScope>>,
    direction: Direction,
    codec: Arc<C>,
    local: PeerIdentity,
    remote: PeerIdentity,
}

impl<C: AddressCodec> Conn<C> {
    pub(crate) fn new(
        session: Box<dyn MuxedSession<C::Native>>,
        scope: ConnectionScope,
        codec: Arc<C>,
        local: PeerIdentity,
        remote: PeerIdentity,
    ) -> Self {
        Self {
            session,
            direction: scope.direction(),
            scope: Mutex::new(Some(scope)),
            codec,
            local,
            remote,
        }
    }

    /// Our peer ID.
    pub fn local_peer(&self) -> &PeerId {
        self.local.peer_id()
    }

    /// Our public key.
    pub fn local_public_key(&self) -> &PublicKey {
        self.local.public_key()
    }

    /// The authenticated remote peer ID.
    pub fn remote_peer(&self) -> &PeerId {
        self.remote.peer_id()
    }

    /// The authenticated remote public key.
    pub fn remote_public_key(&self) -> &PublicKey {
        self.remote.public_key()
    }

    /// Our native address.
    pub fn local_addr(&self) -> C::Native {
        self.session.local_addr()
    }

    /// The peer's native address.
    pub fn remote_addr(&self) -> C::Native {
        self.session.remote_addr()
    }

    /// Our overlay address.
    ///
    /// # Panics
    ///
    /// If the substrate reports a local address its own codec cannot encode.
    pub fn local_multiaddr(&self) -> Multiaddr {
        let native = self.session.local_addr();
        self.codec
            .to_overlay(&native)
            .unwrap_or_else(|err| panic!("local address {native:?} of an established connection does not encode: {err}"))
    }

    /// The peer's overlay address.
    ///
    /// # Panics
    ///
    /// If the substrate reports a remote address its own codec cannot encode.
    pub fn remote_multiaddr(&self) -> Multiaddr {
        let native = self.session.remote_addr();
        self.codec
            .to_overlay(&native)
            .unwrap_or_else(|err| panic!("remote address {native:?} of an established connection does not encode: {err}"))
    }

    /// Whether we dialed or accepted this connection.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Run `f` against the connection's scope. `None` once closed.
    pub fn with_scope<R>(&self, f: impl FnOnce(Option<&ConnectionScope>) -> R) -> R {
        f(self.scope.lock().as_ref())
    }

    /// Open a stream, waiting for stream credit if the peer's limit is reached.
    pub async fn open_stream(&self) -> TransportResult<Stream> {
        let stream = self.session.open_stream().await?;
        Ok(Stream::new(stream))
    }

    /// Wait for the peer to open a stream.
    pub async fn accept_stream(&self) -> TransportResult<Stream> {
        let stream = self.session.accept_stream().await?;
        Ok(Stream::new(stream))
    }

    /// Close the session and release the scope. Later calls are no-ops.
    pub fn close(&self) -> TransportResult<()> {
        let Some(scope) = self.scope.lock().take() else {
            return Ok(());
        };
        let result = self.session.close(0, "");
        scope.release();
        match result {
            Ok(()) | Err(SubstrateError::Closed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether the session has terminated.
    pub fn is_closed(&self) -> bool {
        self.scope.lock().is_none() || self.session.is_closed()
    }
}

impl<C: AddressCodec> Drop for Conn<C> {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.get_mut().take() {
            if let Err(err) = self.session.close(0, "") {
                if !matches!(err, SubstrateError::Closed) {
                    debug!(peer = %self.remote.peer_id(), %err, "error closing dropped connection");
                }
            }
            scope.release();
        }
    }
}

impl<C: AddressCodec> fmt::Debug for Conn<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("direction", &self.direction)
            .field("local", self.local.peer_id())
            .field("remote", self.remote.peer_id())
            .finish_non_exhaustive()
    }
}
