//! Key-addressed mesh substrate.
//!
//! Nodes are addressed by their Ed25519 public key, so a mesh address and a
//! peer identity name the same thing. Direct links are bootstrapped with a
//! small TCP peering exchange; the mesh routes everything else.

mod addr;
mod config;
mod peering;
mod substrate;
mod transport;

pub use addr::{MESH, MeshAddr, MeshCodec};
pub use config::{MeshConfig, MeshConfigBuilder};
pub use peering::{PeeringEndpoint, Peerings, dial_peering, handshake, handshake_and_add};
pub use substrate::{MeshNetwork, MeshProvider, MeshSubstrate, PeeringStream};
pub use transport::MeshTransport;
