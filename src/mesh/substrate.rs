//! Mesh substrate boundary.
//!
//! Routing and forwarding belong to the mesh implementation. The transport
//! needs a way to start it with our key, a secure multiplexer running over
//! its packet interface, and an entry point for peering links.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::MeshAddr;
use crate::core::{SecureMuxer, SubstrateError};
use crate::identity::Keypair;

/// A raw byte stream carrying a peering link.
pub trait PeeringStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> PeeringStream for T {}

/// A running mesh node.
#[async_trait]
pub trait MeshNetwork: Send + Sync {
    /// Our key, which is also our mesh address.
    fn public_key(&self) -> MeshAddr;

    /// Hand a peering link to the mesh.
    ///
    /// The mesh owns `stream` from here on. Returns when the link ends.
    async fn handle_conn(
        &self,
        peer: MeshAddr,
        stream: Box<dyn PeeringStream>,
        priority: u8,
    ) -> Result<(), SubstrateError>;

    /// Stop the node and drop every link.
    async fn close(&self) -> Result<(), SubstrateError>;
}

/// A started mesh node and the secure multiplexer bound to its packets.
#[derive(Clone)]
pub struct MeshSubstrate {
    /// The mesh node.
    pub network: Arc<dyn MeshNetwork>,
    /// Secure multiplexer over the node's packet interface.
    pub muxer: Arc<dyn SecureMuxer<MeshAddr>>,
}

/// Starts mesh nodes.
#[async_trait]
pub trait MeshProvider: Send + Sync {
    /// Start a node keyed by `keypair`.
    async fn start(&self, keypair: &Keypair) -> Result<MeshSubstrate, SubstrateError>;
}
