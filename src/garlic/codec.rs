//! Overlay encoding of anonymity network addresses.
//!
//! Hashes map to `/garlic32/<base32>`, full destinations to
//! `/garlic64/<base64>`. Decoding is local; only [`resolve`] asks the
//! router, to turn a hash into something dialable.
//!
//! [`resolve`]: AddressCodec::resolve

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use tracing::debug;

use super::{DestHash, Destination, GarlicAddr, GarlicSession};
use crate::address::{AddressCodec, Component, Multiaddr, registry};
use crate::core::{AddressError, DEST_HASH_SIZE, P_GARLIC32, P_GARLIC64};

static EMPTY_LISTEN_ADDR: Lazy<Multiaddr> = Lazy::new(|| {
    if let Err(err) = registry::register(registry::GARLIC32) {
        debug!(%err, "garlic32 unavailable for the empty listen address");
    }
    Multiaddr::from(Component::from_known(P_GARLIC32, vec![0u8; DEST_HASH_SIZE]))
});

/// The only address a garlic transport listens on: the short form of the
/// all-zero hash. The session's own destination is what actually listens.
pub fn empty_listen_addr() -> Multiaddr {
    EMPTY_LISTEN_ADDR.clone()
}

/// Codec for `/garlic32` and `/garlic64` addresses.
#[derive(Clone)]
pub struct GarlicCodec {
    session: Option<Arc<dyn GarlicSession>>,
}

impl GarlicCodec {
    /// Build a codec. Without a session, hashes cannot be resolved.
    pub fn new(session: Option<Arc<dyn GarlicSession>>) -> Result<Self, AddressError> {
        registry::register(registry::GARLIC32)?;
        registry::register(registry::GARLIC64)?;
        Ok(Self { session })
    }
}

impl fmt::Debug for GarlicCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GarlicCodec")
            .field("session", &self.session.as_ref().map(|s| s.local_destination().hash()))
            .finish()
    }
}

#[async_trait]
impl AddressCodec for GarlicCodec {
    type Native = GarlicAddr;

    fn protocols(&self) -> &'static [u32] {
        &[P_GARLIC32, P_GARLIC64]
    }

    fn matches(&self, addr: &Multiaddr) -> bool {
        addr.is_exactly(P_GARLIC32) || addr.is_exactly(P_GARLIC64)
    }

    fn to_overlay(&self, native: &GarlicAddr) -> Result<Multiaddr, AddressError> {
        let component = match native {
            GarlicAddr::Hash(hash) => Component::from_bytes(P_GARLIC32, hash.as_bytes().to_vec())?,
            GarlicAddr::Destination(dest) => {
                Component::from_bytes(P_GARLIC64, dest.as_bytes().to_vec())?
            }
        };
        Ok(component.into())
    }

    fn to_native(&self, addr: &Multiaddr) -> Result<GarlicAddr, AddressError> {
        if addr.is_exactly(P_GARLIC32) {
            let value = addr
                .value_for_protocol(P_GARLIC32)
                .ok_or_else(|| AddressError::Malformed(addr.to_string()))?;
            let hash = <[u8; DEST_HASH_SIZE]>::try_from(value).map_err(|_| {
                AddressError::InvalidValue {
                    protocol: "garlic32".into(),
                    reason: "only 32-byte destination hashes are supported".into(),
                }
            })?;
            return Ok(GarlicAddr::Hash(DestHash::new(hash)));
        }
        if addr.is_exactly(P_GARLIC64) {
            let value = addr
                .value_for_protocol(P_GARLIC64)
                .ok_or_else(|| AddressError::Malformed(addr.to_string()))?;
            return Ok(GarlicAddr::Destination(Destination::from_bytes(value.to_vec())?));
        }
        Err(AddressError::NotThisSubstrate(addr.to_string()))
    }

    async fn resolve(&self, addr: &Multiaddr) -> Result<GarlicAddr, AddressError> {
        let hash = match self.to_native(addr)? {
            GarlicAddr::Hash(hash) => hash,
            dest => return Ok(dest),
        };
        let Some(session) = &self.session else {
            return Err(AddressError::Unresolvable {
                name: hash.to_string(),
                reason: "no router session".into(),
            });
        };
        session
            .lookup(&hash)
            .await
            .map(GarlicAddr::Destination)
            .map_err(|err| AddressError::Unresolvable {
                name: hash.to_string(),
                reason: err.to_string(),
            })
    }
}
