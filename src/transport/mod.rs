//! Transport layer shared by both substrates.
//!
//! The substrate-specific transports are thin: they own a substrate, an
//! [`AddressCodec`] and an [`Establisher`], and add their own listen-address
//! rules. Everything about identity verification and scope accounting lives
//! here.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Overlay framework              │
//! ├─────────────────────────────────────────┤
//! │   Transport: dial / listen / close      │  ← This module
//! │   Establisher, Listener, Conn, Stream   │
//! ├─────────────────────────────────────────┤
//! │   Secure multiplexer (SecureMuxer)      │
//! ├─────────────────────────────────────────┤
//! │   Mesh packets / anonymity datagrams    │
//! └─────────────────────────────────────────┘
//! ```

mod config;
mod conn;
mod establish;
mod listener;
mod stream;

pub use config::MuxConfig;
pub use conn::Conn;
pub use establish::Establisher;
pub use listener::Listener;
pub use stream::Stream;

use std::fmt;

use async_trait::async_trait;

use crate::address::{AddressCodec, Multiaddr};
use crate::core::{TransportError, TransportResult};
use crate::identity::PeerId;

/// What the overlay framework sees of a transport.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Display {
    /// The substrate's address codec.
    type Codec: AddressCodec;

    /// Dial `raddr`. `peer` is the identity the remote must prove.
    async fn dial(
        &self,
        raddr: &Multiaddr,
        peer: Option<&PeerId>,
    ) -> TransportResult<Conn<Self::Codec>>;

    /// Start listening on `laddr`. Only one listener may be active.
    async fn listen(&self, laddr: &Multiaddr) -> TransportResult<Listener<Self::Codec>>;

    /// Whether `addr` is one this transport dials.
    fn can_dial(&self, addr: &Multiaddr) -> bool;

    /// Address protocol codes handled by this transport.
    fn protocols(&self) -> &'static [u32];

    /// Whether connections are proxied. Never the case here.
    fn proxy(&self) -> bool {
        false
    }

    /// Our peer ID.
    fn local_peer(&self) -> &PeerId;

    /// Shut the transport and its substrate down.
    async fn close(&self) -> TransportResult<()>;
}

/// Keep the first error, log the rest.
pub(crate) fn first_error(
    first: &mut Option<TransportError>,
    what: &str,
    result: Result<(), impl Into<TransportError>>,
) {
    if let Err(err) = result {
        let err = err.into();
        tracing::warn!(%err, "error closing {what}");
        first.get_or_insert(err);
    }
}
