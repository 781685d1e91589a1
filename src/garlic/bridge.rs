//! Session bridge boundary.
//!
//! The anonymity router runs out of process and is driven through a local
//! bridge (SAM-style). Opening a session yields our destination, a name
//! lookup service and a secure multiplexer over the session's datagrams.

use std::sync::Arc;

use async_trait::async_trait;

use super::{DestHash, Destination, GarlicAddr};
use crate::core::{SecureMuxer, SubstrateError};
use crate::identity::Keypair;

/// An open session with the anonymity router.
#[async_trait]
pub trait GarlicSession: Send + Sync {
    /// The destination this session receives on.
    fn local_destination(&self) -> &Destination;

    /// Resolve a destination hash to the full destination.
    async fn lookup(&self, hash: &DestHash) -> Result<Destination, SubstrateError>;

    /// Tear the session down.
    async fn close(&self) -> Result<(), SubstrateError>;
}

/// An open session and the secure multiplexer over its datagrams.
#[derive(Clone)]
pub struct GarlicSubstrate {
    /// The router session.
    pub session: Arc<dyn GarlicSession>,
    /// Secure multiplexer over the session's datagrams.
    pub muxer: Arc<dyn SecureMuxer<GarlicAddr>>,
}

/// Opens router sessions through a bridge.
#[async_trait]
pub trait SessionBridge: Send + Sync {
    /// Open a session through the bridge at `bridge_addr`.
    ///
    /// `options` are `key=value` tunnel options passed to the router as is.
    async fn open_session(
        &self,
        keypair: &Keypair,
        bridge_addr: &str,
        options: &[String],
    ) -> Result<GarlicSubstrate, SubstrateError>;
}
