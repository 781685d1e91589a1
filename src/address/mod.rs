//! Overlay addressing.
//!
//! [`Multiaddr`] is the overlay's generic address. Each substrate supplies an
//! [`AddressCodec`] translating between it and the substrate's native address
//! type; the codec's `matches` predicate is the transport's `can_dial`.

mod encoding;
mod multiaddr;
pub mod registry;
pub(crate) mod varint;

use std::fmt::Debug;

use async_trait::async_trait;

pub use encoding::{base32_decode, base32_encode, base64_decode, base64_encode};
pub use multiaddr::{Component, Multiaddr};
pub use registry::{Protocol, Size, Transcoder};

use crate::core::AddressError;

/// Bidirectional conversion between overlay and substrate-native addresses.
#[async_trait]
pub trait AddressCodec: Send + Sync + 'static {
    /// The substrate's native address.
    type Native: Clone + Debug + Send + Sync + 'static;

    /// Protocol codes this codec produces.
    fn protocols(&self) -> &'static [u32];

    /// Whether `addr` is one this codec produces. Anything else is rejected
    /// before any substrate call.
    fn matches(&self, addr: &Multiaddr) -> bool;

    /// Native address to overlay address.
    fn to_overlay(&self, native: &Self::Native) -> Result<Multiaddr, AddressError>;

    /// Overlay address to native address, without touching the substrate.
    fn to_native(&self, addr: &Multiaddr) -> Result<Self::Native, AddressError>;

    /// Overlay address to a dialable native address.
    ///
    /// Substrates whose short forms need a lookup override this.
    async fn resolve(&self, addr: &Multiaddr) -> Result<Self::Native, AddressError> {
        self.to_native(addr)
    }
}
