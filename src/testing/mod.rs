//! In-memory substrates for tests.
//!
//! Nothing here touches the network. The muxer hub stands in for the secure
//! multiplexing protocol, the memory mesh and memory bridge stand in for the
//! two substrates, and [`CountingResourceManager`] checks scope accounting.

mod muxer;
mod rcmgr;

#[cfg(feature = "garlic")]
mod garlic;
#[cfg(feature = "mesh")]
mod mesh;

#[cfg(feature = "garlic")]
pub use garlic::MemoryBridge;
#[cfg(feature = "mesh")]
pub use mesh::MemoryMesh;
pub use muxer::{HubAddr, MemoryMuxer, MemoryMuxerHub, MemorySession};
pub use rcmgr::CountingResourceManager;

use crate::address::{AddressCodec, Component, Multiaddr};
use crate::core::{AddressError, P_TCP};

/// Codec for hub addresses that are bare ports: `/tcp/<port>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestCodec;

impl AddressCodec for TestCodec {
    type Native = u16;

    fn protocols(&self) -> &'static [u32] {
        &[P_TCP]
    }

    fn matches(&self, addr: &Multiaddr) -> bool {
        addr.is_exactly(P_TCP)
    }

    fn to_overlay(&self, native: &u16) -> Result<Multiaddr, AddressError> {
        Ok(Component::new("tcp", &native.to_string())?.into())
    }

    fn to_native(&self, addr: &Multiaddr) -> Result<u16, AddressError> {
        match addr.value_for_protocol(P_TCP) {
            Some(&[hi, lo]) if self.matches(addr) => Ok(u16::from_be_bytes([hi, lo])),
            _ => Err(AddressError::NotThisSubstrate(addr.to_string())),
        }
    }
}
