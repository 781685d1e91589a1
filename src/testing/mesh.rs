//! In-memory mesh.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::MemoryMuxerHub;
use crate::core::SubstrateError;
use crate::identity::Keypair;
use crate::mesh::{MeshAddr, MeshNetwork, MeshProvider, MeshSubstrate, PeeringStream};

/// Mesh nodes sharing one [`MemoryMuxerHub`].
///
/// Every node reaches every other node directly; peering links are only
/// recorded, so tests can check who linked with whom.
#[derive(Clone, Default)]
pub struct MemoryMesh {
    hub: MemoryMuxerHub<MeshAddr>,
    nodes: Arc<Mutex<HashMap<MeshAddr, Arc<MemoryMeshNode>>>>,
}

impl MemoryMesh {
    /// Empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a node directly, without a transport on top.
    pub async fn start_node(&self, keypair: Keypair) -> MeshSubstrate {
        let addr = MeshAddr::new(keypair.public_bytes());
        let node = Arc::new(MemoryMeshNode {
            addr,
            links: watch::Sender::new(Vec::new()),
            closed: watch::Sender::new(false),
        });
        self.nodes.lock().insert(addr, Arc::clone(&node));
        MeshSubstrate {
            network: node,
            muxer: Arc::new(self.hub.muxer(addr)),
        }
    }

    /// Wait until `node` has at least `count` links, then return them.
    ///
    /// Unknown nodes have no links.
    pub async fn wait_for_links(&self, node: &MeshAddr, count: usize) -> Vec<MeshAddr> {
        let Some(node) = self.nodes.lock().get(node).cloned() else {
            return Vec::new();
        };
        let mut links = node.links.subscribe();
        match links.wait_for(|links| links.len() >= count).await {
            Ok(links) => links.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of nodes not yet closed.
    pub fn running(&self) -> usize {
        self.nodes
            .lock()
            .values()
            .filter(|node| !*node.closed.borrow())
            .count()
    }
}

#[async_trait]
impl MeshProvider for MemoryMesh {
    async fn start(&self, keypair: &Keypair) -> Result<MeshSubstrate, SubstrateError> {
        Ok(self.start_node(keypair.clone()).await)
    }
}

struct MemoryMeshNode {
    addr: MeshAddr,
    links: watch::Sender<Vec<MeshAddr>>,
    closed: watch::Sender<bool>,
}

#[async_trait]
impl MeshNetwork for MemoryMeshNode {
    fn public_key(&self) -> MeshAddr {
        self.addr
    }

    async fn handle_conn(
        &self,
        peer: MeshAddr,
        stream: Box<dyn PeeringStream>,
        _priority: u8,
    ) -> Result<(), SubstrateError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(SubstrateError::Closed);
        }
        self.links.send_modify(|links| links.push(peer));

        // Hold the link open until the node stops.
        let _ = closed.wait_for(|closed| *closed).await;
        drop(stream);
        Ok(())
    }

    async fn close(&self) -> Result<(), SubstrateError> {
        if self.closed.send_replace(true) {
            return Err(SubstrateError::Closed);
        }
        Ok(())
    }
}
