//! # Strata
//!
//! Secure, multiplexed peer-to-peer transports over substrates that are not
//! IP networks.
//!
//! Two substrate families are supported:
//!
//! - **Mesh**: a key-addressed mesh where a node's address is its Ed25519
//!   public key. Direct links are bootstrapped with a small TCP peering
//!   exchange.
//! - **Garlic**: an anonymity network reached through a local session bridge.
//!   Nodes are addressed by self-certifying destinations or their hashes.
//!
//! Both expose the same [`Transport`](transport::Transport) surface: dial and
//! listen on overlay [`Multiaddr`](address::Multiaddr)s, get back
//! authenticated connections carrying multiplexed streams. Every connection
//! proves an Ed25519 peer identity during the secure handshake and holds a
//! resource-manager scope for as long as it lives.
//!
//! ## Feature Flags
//!
//! - `mesh` (default): mesh substrate, peering, [`MeshTransport`](mesh::MeshTransport)
//! - `garlic` (default): anonymity substrate, [`GarlicTransport`](garlic::GarlicTransport)
//! - `testing`: in-memory substrates for integration suites
//!
//! ## Modules
//!
//! - [`core`]: constants, error types, substrate boundary traits
//! - [`address`]: multiaddrs, the protocol registry, address codecs
//! - [`identity`]: keys, peer IDs, certificate identity
//! - [`resource`]: resource manager boundary and connection scopes
//! - [`transport`]: the dial/listen pipeline shared by both substrates
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use strata::mesh::MeshProvider;
//! use strata::prelude::*;
//!
//! async fn run(provider: &dyn MeshProvider) -> TransportResult<()> {
//!     let config = MeshConfigBuilder::new()
//!         .peer("tcp://203.0.113.7:9001")
//!         .build();
//!     let transport = MeshTransport::new(config, Keypair::generate(), None, None, provider).await?;
//!
//!     let listener = transport.listen(&transport.local_multiaddr()?).await?;
//!     let conn = listener.accept().await?;
//!     println!("accepted {}", conn.remote_peer());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Always included
pub mod address;
pub mod core;
pub mod identity;
pub mod resource;
pub mod transport;

// Mesh substrate (feature-gated)
#[cfg(feature = "mesh")]
#[cfg_attr(docsrs, doc(cfg(feature = "mesh")))]
pub mod mesh;

// Anonymity substrate (feature-gated)
#[cfg(feature = "garlic")]
#[cfg_attr(docsrs, doc(cfg(feature = "garlic")))]
pub mod garlic;

// In-memory substrates
#[cfg(any(test, feature = "testing"))]
#[cfg_attr(docsrs, doc(cfg(feature = "testing")))]
pub mod testing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::address::{AddressCodec, Multiaddr};
    pub use crate::core::{
        AddressError, ErrorKind, IdentityError, ResourceError, SubstrateError, TransportError,
        TransportResult,
    };
    pub use crate::identity::{Keypair, PeerId};
    pub use crate::resource::{Direction, NullResourceManager, ResourceManager};
    pub use crate::transport::{Conn, Listener, MuxConfig, Stream, Transport};

    #[cfg(feature = "mesh")]
    pub use crate::mesh::{MeshAddr, MeshConfig, MeshConfigBuilder, MeshTransport};

    #[cfg(feature = "garlic")]
    pub use crate::garlic::{
        GarlicConfig, GarlicConfigBuilder, GarlicTransport, SessionOptions, empty_listen_addr,
    };
}

// Re-export commonly used items at crate root
pub use crate::address::Multiaddr;
pub use crate::core::{TransportError, TransportResult};
pub use crate::identity::{Keypair, PeerId};
pub use crate::transport::Transport;
