//! Transport over anonymity network sessions.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{
    Destination, GarlicAddr, GarlicCodec, GarlicConfig, GarlicSession, SessionBridge,
    empty_listen_addr,
};
use crate::address::{AddressCodec, Multiaddr};
use crate::core::{TransportError, TransportResult};
use crate::identity::{Keypair, LocalIdentity, PeerId};
use crate::resource::{NullResourceManager, ResourceManager};
use crate::transport::{Conn, Establisher, Listener, Transport, first_error};

/// Secure multiplexed transport over one router session.
///
/// The session's destination is fixed when the transport is built, so the
/// only listen address accepted is [`empty_listen_addr`]; the listener
/// reports the real destination.
pub struct GarlicTransport {
    establisher: Establisher<GarlicCodec>,
    session: Arc<dyn GarlicSession>,
}

impl GarlicTransport {
    /// Open a router session through `bridge` and build the transport on it.
    ///
    /// Private networks are not supported: any non-empty `psk` is refused.
    pub async fn new(
        config: GarlicConfig,
        keypair: Keypair,
        rcmgr: Option<Arc<dyn ResourceManager>>,
        psk: Option<&[u8]>,
        bridge: &dyn SessionBridge,
    ) -> TransportResult<Self> {
        if psk.is_some_and(|psk| !psk.is_empty()) {
            return Err(TransportError::PrivateNetworkNotSupported);
        }

        let identity = Arc::new(LocalIdentity::new(keypair));
        let rcmgr = rcmgr.unwrap_or_else(|| Arc::new(NullResourceManager));

        let substrate = bridge
            .open_session(identity.keypair(), &config.bridge_addr, &config.options())
            .await?;
        let codec = GarlicCodec::new(Some(Arc::clone(&substrate.session)))?;

        info!(
            peer = %identity.peer_id(),
            destination = %substrate.session.local_destination().hash(),
            bridge = %config.bridge_addr,
            "garlic transport started"
        );

        Ok(Self {
            establisher: Establisher::new(
                identity,
                rcmgr,
                substrate.muxer,
                Arc::new(codec),
                config.mux,
            ),
            session: substrate.session,
        })
    }

    /// The session's destination.
    pub fn local_destination(&self) -> &Destination {
        self.session.local_destination()
    }

    /// The session's destination in overlay form.
    pub fn local_multiaddr(&self) -> TransportResult<Multiaddr> {
        let local = GarlicAddr::Destination(self.local_destination().clone());
        Ok(self.establisher.codec().to_overlay(&local)?)
    }
}

#[async_trait]
impl Transport for GarlicTransport {
    type Codec = GarlicCodec;

    /// Short-form addresses are looked up through the session first.
    async fn dial(
        &self,
        raddr: &Multiaddr,
        peer: Option<&PeerId>,
    ) -> TransportResult<Conn<GarlicCodec>> {
        self.establisher.dial(raddr, peer).await
    }

    async fn listen(&self, laddr: &Multiaddr) -> TransportResult<Listener<GarlicCodec>> {
        if *laddr != empty_listen_addr() {
            return Err(TransportError::UnsupportedListenAddress(laddr.to_string()));
        }
        self.establisher.listen().await
    }

    fn can_dial(&self, addr: &Multiaddr) -> bool {
        self.establisher.codec().matches(addr)
    }

    fn protocols(&self) -> &'static [u32] {
        self.establisher.codec().protocols()
    }

    fn local_peer(&self) -> &PeerId {
        self.establisher.identity().peer_id()
    }

    async fn close(&self) -> TransportResult<()> {
        let mut first = None;
        first_error(&mut first, "secure multiplexer", self.establisher.muxer().close().await);
        first_error(&mut first, "router session", self.session.close().await);
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Display for GarlicTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("garlic")
    }
}

impl fmt::Debug for GarlicTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GarlicTransport")
            .field("destination", &self.local_destination().hash())
            .field("establisher", &self.establisher)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AddressError, P_GARLIC32, P_GARLIC64, SubstrateError};
    use crate::garlic::{DestHash, GarlicConfigBuilder, SessionOptions};
    use crate::testing::{CountingResourceManager, MemoryBridge};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn transport(bridge: &MemoryBridge) -> GarlicTransport {
        let config = GarlicConfigBuilder::new()
            .session(SessionOptions::zero_hop())
            .build();
        GarlicTransport::new(config, Keypair::generate(), None, None, bridge)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dial_and_accept() {
        let bridge = MemoryBridge::new();
        let a = transport(&bridge).await;
        let b = transport(&bridge).await;

        let listener = b.listen(&empty_listen_addr()).await.unwrap();
        let codec = GarlicCodec::new(None).unwrap();
        // The listener reports the real destination, which is stable.
        let listen_addr = listener.multiaddr().clone();
        assert_eq!(listen_addr, b.local_multiaddr().unwrap());
        assert_eq!(
            codec.to_overlay(&codec.to_native(&listen_addr).unwrap()).unwrap(),
            listen_addr
        );

        // Dial the short form; the session resolves it.
        let short = codec
            .to_overlay(&GarlicAddr::Hash(b.local_destination().hash()))
            .unwrap();
        let (dialed, accepted) = tokio::join!(a.dial(&short, None), listener.accept());
        let dialed = dialed.unwrap();
        let accepted = accepted.unwrap();

        assert_eq!(dialed.remote_peer(), b.local_peer());
        assert_eq!(accepted.remote_peer(), a.local_peer());
        assert!(accepted.remote_multiaddr().is_exactly(P_GARLIC64));
        assert_eq!(accepted.remote_multiaddr(), a.local_multiaddr().unwrap());

        let mut out = accepted.open_stream().await.unwrap();
        out.write_all(b"garlic").await.unwrap();
        let mut inc = dialed.accept_stream().await.unwrap();
        let mut buf = [0u8; 6];
        inc.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"garlic");

        a.close().await.unwrap();
        b.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_known_peer_long_form() {
        let bridge = MemoryBridge::new();
        let a = transport(&bridge).await;
        let b = transport(&bridge).await;
        let listener = b.listen(&empty_listen_addr()).await.unwrap();

        let (dialed, accepted) = tokio::join!(
            a.dial(listener.multiaddr(), Some(b.local_peer())),
            listener.accept()
        );
        let dialed = dialed.unwrap();
        assert_eq!(dialed.remote_peer(), b.local_peer());
        assert_eq!(dialed.remote_multiaddr(), *listener.multiaddr());
        assert!(dialed.remote_multiaddr().is_exactly(P_GARLIC64));
        assert_eq!(accepted.unwrap().remote_peer(), a.local_peer());
    }

    #[tokio::test]
    async fn test_unresolvable_short_form_releases_scope() {
        let bridge = MemoryBridge::new();
        let rcmgr = CountingResourceManager::new();
        let a = GarlicTransport::new(
            GarlicConfig::default(),
            Keypair::generate(),
            Some(Arc::new(rcmgr.clone())),
            None,
            &bridge,
        )
        .await
        .unwrap();

        let unknown = GarlicCodec::new(None)
            .unwrap()
            .to_overlay(&GarlicAddr::Hash(DestHash::new([5u8; 32])))
            .unwrap();
        let err = a.dial(&unknown, None).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Address(AddressError::Unresolvable { .. })
        ));
        assert_eq!(rcmgr.acquired(), 1);
        assert_eq!(rcmgr.open(), 0);
    }

    #[tokio::test]
    async fn test_listen_only_on_empty_addr() {
        let bridge = MemoryBridge::new();
        let a = transport(&bridge).await;

        let own = a.local_multiaddr().unwrap();
        assert!(matches!(
            a.listen(&own).await,
            Err(TransportError::UnsupportedListenAddress(_))
        ));

        let listener = a.listen(&empty_listen_addr()).await.unwrap();
        assert!(matches!(
            a.listen(&empty_listen_addr()).await,
            Err(TransportError::AlreadyListening)
        ));
        listener.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_options_reach_bridge() {
        let bridge = MemoryBridge::new();
        let config = GarlicConfigBuilder::new()
            .bridge_addr("10.1.1.1:7656")
            .session(SessionOptions::zero_hop())
            .option("i2cp.leaseSetEncType=4")
            .build();
        GarlicTransport::new(config, Keypair::generate(), None, None, &bridge)
            .await
            .unwrap();

        let (addr, options) = bridge.last_open().unwrap();
        assert_eq!(addr, "10.1.1.1:7656");
        assert_eq!(options.len(), 7);
        assert_eq!(options[0], "inbound.length=0");
        assert_eq!(options[6], "i2cp.leaseSetEncType=4");
    }

    #[tokio::test]
    async fn test_construction_failures() {
        let bridge = MemoryBridge::new();
        let psk = GarlicTransport::new(
            GarlicConfig::default(),
            Keypair::generate(),
            None,
            Some(&[1, 2, 3]),
            &bridge,
        )
        .await;
        assert!(matches!(psk, Err(TransportError::PrivateNetworkNotSupported)));
        assert!(bridge.last_open().is_none());

        bridge.fail_open(true);
        let down = GarlicTransport::new(GarlicConfig::default(), Keypair::generate(), None, None, &bridge)
            .await;
        assert!(matches!(
            down,
            Err(TransportError::Substrate(SubstrateError::Unreachable(_)))
        ));
    }

    #[tokio::test]
    async fn test_metadata() {
        let bridge = MemoryBridge::new();
        let a = transport(&bridge).await;

        assert_eq!(a.to_string(), "garlic");
        assert_eq!(a.protocols(), &[P_GARLIC32, P_GARLIC64]);
        assert!(!a.proxy());
        assert!(a.can_dial(&empty_listen_addr()));
        assert!(a.can_dial(&a.local_multiaddr().unwrap()));
        assert!(!a.can_dial(&"/ip4/127.0.0.1/udp/1".parse().unwrap()));

        a.close().await.unwrap();
        assert!(a.close().await.is_err());
    }
}
