//! Inbound connection listener.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::Conn;
use super::establish::{abort, authenticate};
use crate::address::{AddressCodec, Multiaddr};
use crate::core::{SecureListener, TransportResult};
use crate::identity::PeerIdentity;
use crate::resource::{ConnectionScope, Direction, ResourceManager};

/// The transport's single active listener.
///
/// Each [`accept`](Self::accept) yields one verified connection or one error.
/// Errors about a single inbound session (bad address, admission, identity)
/// are returned to the caller, who is expected to call `accept` again; a
/// substrate error from the listening session itself means it is done.
///
/// Dropping an unclosed listener frees the transport to listen again.
pub struct Listener<C: AddressCodec> {
    inner: Box<dyn SecureListener<C::Native>>,
    multiaddr: Multiaddr,
    codec: Arc<C>,
    rcmgr: Arc<dyn ResourceManager>,
    local: PeerIdentity,
    listening: Arc<AtomicBool>,
    close_attempted: AtomicBool,
}

impl<C: AddressCodec> Listener<C> {
    pub(crate) fn new(
        inner: Box<dyn SecureListener<C::Native>>,
        multiaddr: Multiaddr,
        codec: Arc<C>,
        rcmgr: Arc<dyn ResourceManager>,
        local: PeerIdentity,
        listening: Arc<AtomicBool>,
    ) -> Self {
        Self {
            inner,
            multiaddr,
            codec,
            rcmgr,
            local,
            listening,
            close_attempted: AtomicBool::new(false),
        }
    }

    /// Wait for the next authenticated inbound connection.
    pub async fn accept(&self) -> TransportResult<Conn<C>> {
        let session = self.inner.accept().await?;

        let raddr = match self.codec.to_overlay(&session.remote_addr()) {
            Ok(raddr) => raddr,
            Err(err) => {
                abort(&*session, &err);
                return Err(err.into());
            }
        };

        let mut scope = match ConnectionScope::open(&*self.rcmgr, Direction::Inbound, Some(&raddr)) {
            Ok(scope) => scope,
            Err(err) => {
                debug!(addr = %raddr, %err, "resource manager blocked incoming connection");
                abort(&*session, &err);
                return Err(err.into());
            }
        };

        let remote = match authenticate(&*session, None) {
            Ok(remote) => remote,
            Err(err) => {
                abort(&*session, &err);
                return Err(err.into());
            }
        };

        if let Err(err) = scope.bind(remote.peer_id()) {
            debug!(peer = %remote.peer_id(), addr = %raddr, %err, "resource manager blocked incoming connection from peer");
            abort(&*session, &err);
            return Err(err.into());
        }

        Ok(Conn::new(
            session,
            scope,
            Arc::clone(&self.codec),
            self.local.clone(),
            remote,
        ))
    }

    /// Native address we listen on.
    pub fn addr(&self) -> C::Native {
        self.inner.local_addr()
    }

    /// Overlay address we listen on.
    pub fn multiaddr(&self) -> &Multiaddr {
        &self.multiaddr
    }

    /// Stop listening.
    ///
    /// Only a successful close frees the transport to listen again.
    pub async fn close(&self) -> TransportResult<()> {
        self.close_attempted.store(true, Ordering::Release);
        self.inner.close().await?;
        self.listening.store(false, Ordering::Release);
        debug!(addr = %self.multiaddr, "listener closed");
        Ok(())
    }
}

impl<C: AddressCodec> Drop for Listener<C> {
    fn drop(&mut self) {
        if !self.close_attempted.load(Ordering::Acquire) {
            self.listening.store(false, Ordering::Release);
            debug!(addr = %self.multiaddr, "listener dropped without close");
        }
    }
}

impl<C: AddressCodec> fmt::Debug for Listener<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("addr", &self.multiaddr)
            .field("peer", self.local.peer_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Component;
    use crate::core::{HandshakeConfig, IdentityError, ResourceError, SecureMuxer, TransportError};
    use crate::identity::{
        Certificate, CertificateChain, KeyType, Keypair, LocalIdentity, PublicKey,
    };
    use libp2p_identity::secp256k1;
    use crate::testing::{CountingResourceManager, MemoryMuxerHub, TestCodec};
    use crate::transport::{Establisher, MuxConfig};

    fn addr(port: u16) -> Multiaddr {
        Multiaddr::from(Component::new("tcp", &port.to_string()).unwrap())
    }

    fn listening_node(
        hub: &MemoryMuxerHub<u16>,
        rcmgr: &CountingResourceManager,
    ) -> Establisher<TestCodec> {
        Establisher::new(
            Arc::new(LocalIdentity::new(Keypair::generate())),
            Arc::new(rcmgr.clone()),
            Arc::new(hub.muxer(1)),
            Arc::new(TestCodec),
            MuxConfig::default(),
        )
    }

    /// Handshake config presenting an arbitrary host key and accepting any server.
    fn forged_config(host_key: &PublicKey) -> HandshakeConfig {
        let certificate = Certificate::new(host_key.encode_protobuf(), [7u8; 32], vec![0u8; 64]);
        HandshakeConfig {
            certificates: CertificateChain::from(vec![certificate]),
            verifier: Arc::new(|chain: &CertificateChain| {
                crate::identity::verify_certificate_chain(chain, None)
            }),
            mux: MuxConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_accept_gates_key_algorithm() {
        let hub = MemoryMuxerHub::new();
        let rcmgr = CountingResourceManager::new();
        let node = listening_node(&hub, &rcmgr);
        let listener = node.listen().await.unwrap();

        let secp = PublicKey::from(secp256k1::Keypair::generate().public().clone());
        let rogue = hub.muxer(9);
        let (dialed, accepted) = tokio::join!(
            rogue.dial(1, forged_config(&secp)),
            listener.accept()
        );

        let session = dialed.unwrap();
        assert!(matches!(
            accepted,
            Err(TransportError::Identity(IdentityError::UnsupportedKeyAlgorithm(KeyType::Secp256k1)))
        ));
        assert!(session.is_closed());
        assert_eq!(rcmgr.acquired(), 1);
        assert_eq!(rcmgr.open(), 0);
    }

    #[tokio::test]
    async fn test_accept_admission_rejections() {
        let hub = MemoryMuxerHub::new();
        let rcmgr = CountingResourceManager::new();
        let node = listening_node(&hub, &rcmgr);
        let listener = node.listen().await.unwrap();
        let dialer = Establisher::new(
            Arc::new(LocalIdentity::new(Keypair::generate())),
            Arc::new(CountingResourceManager::new()),
            Arc::new(hub.muxer(2)),
            Arc::new(TestCodec),
            MuxConfig::default(),
        );

        let target = addr(1);
        rcmgr.reject_open(true);
        let (_, accepted) = tokio::join!(dialer.dial(&target, None), listener.accept());
        assert!(matches!(
            accepted,
            Err(TransportError::Admission(ResourceError::LimitExceeded { .. }))
        ));
        assert_eq!(rcmgr.acquired(), 0);

        rcmgr.reject_open(false);
        rcmgr.reject_peer(true);
        let (_, accepted) = tokio::join!(dialer.dial(&target, None), listener.accept());
        assert!(matches!(
            accepted,
            Err(TransportError::Admission(ResourceError::Blocked(_)))
        ));
        assert_eq!(rcmgr.acquired(), 1);
        assert_eq!(rcmgr.open(), 0);

        // The listener survives per-connection failures.
        rcmgr.reject_peer(false);
        let (dialed, accepted) = tokio::join!(dialer.dial(&target, None), listener.accept());
        let accepted = accepted.unwrap();
        assert_eq!(accepted.remote_peer(), dialed.unwrap().local_peer());
        assert_eq!(rcmgr.open(), 1);
        drop(accepted);
        assert_eq!(rcmgr.open(), 0);
    }

    #[tokio::test]
    async fn test_closed_listener_ends_accept() {
        let hub = MemoryMuxerHub::new();
        let rcmgr = CountingResourceManager::new();
        let node = listening_node(&hub, &rcmgr);
        let listener = node.listen().await.unwrap();
        assert_eq!(listener.addr(), 1);

        listener.close().await.unwrap();
        assert!(matches!(
            listener.accept().await,
            Err(TransportError::Substrate(_))
        ));
        assert!(!hub.is_listening(&1));
    }

    #[tokio::test]
    async fn test_failed_close_keeps_flag() {
        let hub = MemoryMuxerHub::new();
        let rcmgr = CountingResourceManager::new();
        let node = listening_node(&hub, &rcmgr);
        let listener = node.listen().await.unwrap();

        listener.close().await.unwrap();
        assert!(!node.is_listening());
        let again = node.listen().await.unwrap();

        // Closing an already closed listener fails and must not clear the
        // flag held by the live one.
        assert!(listener.close().await.is_err());
        assert!(node.is_listening());
        drop(listener);
        assert!(node.is_listening());
        again.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_listener_frees_listen() {
        let hub = MemoryMuxerHub::new();
        let rcmgr = CountingResourceManager::new();
        let node = listening_node(&hub, &rcmgr);

        let listener = node.listen().await.unwrap();
        drop(listener);
        assert!(!node.is_listening());
        assert!(!hub.is_listening(&1));

        let again = node.listen().await.unwrap();
        assert!(node.is_listening());
        assert!(hub.is_listening(&1));
        again.close().await.unwrap();
    }
}
