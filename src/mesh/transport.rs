//! Transport over the key-addressed mesh.
//!
//! Application connections run the secure multiplexer over mesh packets.
//! The mesh already encrypts hop to hop, so traffic is encrypted twice;
//! that is the current behavior and nothing here tries to avoid it.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{MeshAddr, MeshCodec, MeshConfig, MeshNetwork, MeshProvider, Peerings};
use crate::address::{AddressCodec, Multiaddr};
use crate::core::{IdentityError, TransportError, TransportResult};
use crate::identity::{Keypair, LocalIdentity, PeerId, PeerIdentity};
use crate::resource::{NullResourceManager, ResourceManager};
use crate::transport::{Conn, Establisher, Listener, Transport, first_error};

/// Secure multiplexed transport over the mesh.
pub struct MeshTransport {
    establisher: Establisher<MeshCodec>,
    network: Arc<dyn MeshNetwork>,
    peerings: Peerings,
    local: MeshAddr,
}

impl MeshTransport {
    /// Start the mesh node, its peerings and the transport on top.
    ///
    /// Private networks are not supported: any non-empty `psk` is refused.
    pub async fn new(
        config: MeshConfig,
        keypair: Keypair,
        rcmgr: Option<Arc<dyn ResourceManager>>,
        psk: Option<&[u8]>,
        provider: &dyn MeshProvider,
    ) -> TransportResult<Self> {
        if psk.is_some_and(|psk| !psk.is_empty()) {
            return Err(TransportError::PrivateNetworkNotSupported);
        }

        let codec = MeshCodec::new()?;
        let identity = Arc::new(LocalIdentity::new(keypair));
        let rcmgr = rcmgr.unwrap_or_else(|| Arc::new(NullResourceManager));

        let substrate = provider.start(identity.keypair()).await?;
        let local = substrate.network.public_key();

        let peerings = match Peerings::start(
            &config.peering_listens,
            &config.peers,
            Arc::clone(&substrate.network),
        )
        .await
        {
            Ok(peerings) => peerings,
            Err(err) => {
                let mut first = None;
                first_error(&mut first, "secure multiplexer", substrate.muxer.close().await);
                first_error(&mut first, "mesh", substrate.network.close().await);
                return Err(err);
            }
        };

        info!(
            peer = %identity.peer_id(),
            addr = %local,
            peerings = peerings.listen_addrs().len(),
            "mesh transport started"
        );

        Ok(Self {
            establisher: Establisher::new(
                identity,
                rcmgr,
                substrate.muxer,
                Arc::new(codec),
                config.mux,
            ),
            network: substrate.network,
            peerings,
            local,
        })
    }

    /// Our mesh address.
    pub fn local_addr(&self) -> MeshAddr {
        self.local
    }

    /// Our mesh address in overlay form.
    pub fn local_multiaddr(&self) -> TransportResult<Multiaddr> {
        Ok(self.establisher.codec().to_overlay(&self.local)?)
    }

    /// Addresses the peering listeners are bound to.
    pub fn peering_addrs(&self) -> &[SocketAddr] {
        self.peerings.listen_addrs()
    }
}

#[async_trait]
impl Transport for MeshTransport {
    type Codec = MeshCodec;

    /// Mesh dials need the peer: the address is its key, and the identity
    /// proven in the handshake must be the same key.
    async fn dial(
        &self,
        raddr: &Multiaddr,
        peer: Option<&PeerId>,
    ) -> TransportResult<Conn<MeshCodec>> {
        let codec = self.establisher.codec();
        if !codec.matches(raddr) {
            return Err(TransportError::UnsupportedAddress(raddr.to_string()));
        }
        let peer = peer.ok_or(IdentityError::PeerRequired)?;
        let target = codec.to_native(raddr)?;
        let expected = MeshAddr::from_peer(&PeerIdentity::from_peer_id(peer)?);
        if expected != target {
            return Err(IdentityError::PeerMismatch {
                expected: peer.to_string(),
                actual: hex::encode(target.as_bytes()),
            }
            .into());
        }

        self.establisher.dial(raddr, Some(peer)).await
    }

    async fn listen(&self, laddr: &Multiaddr) -> TransportResult<Listener<MeshCodec>> {
        let codec = self.establisher.codec();
        match codec.to_native(laddr) {
            Ok(addr) if addr == self.local => self.establisher.listen().await,
            _ => Err(TransportError::UnsupportedListenAddress(laddr.to_string())),
        }
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
        self.peerings.close();
        let mut first = None;
        first_error(&mut first, "secure multiplexer", self.establisher.muxer().close().await);
        first_error(&mut first, "mesh", self.network.close().await);
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Display for MeshTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mesh")
    }
}

impl fmt::Debug for MeshTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeshTransport")
            .field("addr", &self.local)
            .field("establisher", &self.establisher)
            .finish_non_exhaustive()
    }
}
