//! Connection establishment shared by both transports.
//!
//! Dial pipeline:
//!
//! ```text
//! can_dial? ─▶ gate key algorithm ─▶ open outbound scope ─▶ bind peer (if known)
//!    ─▶ resolve native target ─▶ secure handshake ─▶ authenticate ─▶ bind peer (if not yet) ─▶ Conn
//! ```
//!
//! The scope is an owned handle; every early return drops it, which releases
//! it. On success it moves into the [`Conn`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use super::{Conn, Listener, MuxConfig};
use crate::address::{AddressCodec, Multiaddr};
use crate::core::{
    IdentityError, MuxedSession, SecureMuxer, ServerConfig, TransportError, TransportResult,
};
use crate::identity::{LocalIdentity, PeerId, PeerIdentity, verify_certificate_chain};
use crate::resource::{ConnectionScope, Direction, ResourceManager};

/// Drives the secure multiplexer for one substrate.
pub struct Establisher<C: AddressCodec> {
    identity: Arc<LocalIdentity>,
    rcmgr: Arc<dyn ResourceManager>,
    muxer: Arc<dyn SecureMuxer<C::Native>>,
    codec: Arc<C>,
    mux: MuxConfig,
    listening: Arc<AtomicBool>,
}

impl<C: AddressCodec> Establisher<C> {
    /// Assemble an establisher.
    pub fn new(
        identity: Arc<LocalIdentity>,
        rcmgr: Arc<dyn ResourceManager>,
        muxer: Arc<dyn SecureMuxer<C::Native>>,
        codec: Arc<C>,
        mux: MuxConfig,
    ) -> Self {
        Self {
            identity,
            rcmgr,
            muxer,
            codec,
            mux,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Our identity.
    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    /// The substrate's address codec.
    pub fn codec(&self) -> &Arc<C> {
        &self.codec
    }

    /// The secure multiplexer.
    pub fn muxer(&self) -> &Arc<dyn SecureMuxer<C::Native>> {
        &self.muxer
    }

    /// Whether a listener is currently active.
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Dial `raddr`, expecting `peer` when given.
    ///
    /// Without `peer`, any Ed25519 peer that completes the handshake is
    /// accepted and the scope is bound once it is known.
    pub async fn dial(&self, raddr: &Multiaddr, peer: Option<&PeerId>) -> TransportResult<Conn<C>> {
        if !self.codec.matches(raddr) {
            return Err(TransportError::UnsupportedAddress(raddr.to_string()));
        }
        if let Some(peer) = peer {
            PeerIdentity::from_peer_id(peer)?;
        }

        let mut scope = ConnectionScope::open(&*self.rcmgr, Direction::Outbound, Some(raddr))
            .inspect_err(|err| debug!(addr = %raddr, %err, "resource manager blocked outgoing connection"))?;
        if let Some(peer) = peer {
            scope.bind(peer).inspect_err(|err| {
                debug!(%peer, addr = %raddr, %err, "resource manager blocked outgoing connection to peer");
            })?;
        }

        let target = self.codec.resolve(raddr).await?;
        let config = self.identity.tls().config_for_peer(peer.cloned(), self.mux);
        let session = self.muxer.dial(target, config).await?;

        let remote = match authenticate(&*session, peer) {
            Ok(remote) => remote,
            Err(err) => {
                abort(&*session, &err);
                return Err(err.into());
            }
        };
        if !scope.is_bound() {
            if let Err(err) = scope.bind(remote.peer_id()) {
                debug!(peer = %remote.peer_id(), addr = %raddr, %err, "resource manager blocked outgoing connection to peer");
                abort(&*session, &err);
                return Err(err.into());
            }
        }

        Ok(Conn::new(
            session,
            scope,
            Arc::clone(&self.codec),
            self.identity.peer().clone(),
            remote,
        ))
    }

    /// Start the one listener this establisher allows.
    pub async fn listen(&self) -> TransportResult<Listener<C>> {
        let guard = ListeningGuard::acquire(&self.listening)?;

        let identity = Arc::clone(&self.identity);
        let mux = self.mux;
        let config = ServerConfig {
            mux,
            config_for_client: Arc::new(move || identity.tls().config_for_peer(None, mux)),
        };
        let inner = self.muxer.listen(config).await?;

        let local_addr = inner.local_addr();
        let multiaddr = match self.codec.to_overlay(&local_addr) {
            Ok(multiaddr) => multiaddr,
            Err(err) => {
                if let Err(close_err) = inner.close().await {
                    debug!(%close_err, "error closing listener with unencodable address");
                }
                return Err(err.into());
            }
        };
        info!(addr = %multiaddr, peer = %self.identity.peer_id(), "listening");

        guard.disarm();
        Ok(Listener::new(
            inner,
            multiaddr,
            Arc::clone(&self.codec),
            Arc::clone(&self.rcmgr),
            self.identity.peer().clone(),
            Arc::clone(&self.listening),
        ))
    }
}

impl<C: AddressCodec> fmt::Debug for Establisher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Establisher")
            .field("peer", self.identity.peer_id())
            .field("mux", &self.mux)
            .field("listening", &self.is_listening())
            .finish_non_exhaustive()
    }
}

/// Clears the listening flag unless the listen attempt completes.
struct ListeningGuard<'a> {
    flag: &'a AtomicBool,
    armed: bool,
}

impl<'a> ListeningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> TransportResult<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyListening);
        }
        Ok(Self { flag, armed: true })
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ListeningGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flag.store(false, Ordering::Release);
        }
    }
}

/// Recover the peer's identity from a completed handshake.
pub(crate) fn authenticate<A: Send + 'static>(
    session: &dyn MuxedSession<A>,
    expected: Option<&PeerId>,
) -> Result<PeerIdentity, IdentityError> {
    let key = verify_certificate_chain(session.peer_certificates(), expected)?;
    PeerIdentity::from_public_key(key)
}

/// Close a session that will not become a connection.
pub(crate) fn abort<A: Send + 'static>(session: &dyn MuxedSession<A>, reason: &dyn fmt::Display) {
    if let Err(err) = session.close(0, &reason.to_string()) {
        debug!(%err, "error closing rejected session");
    }
}
