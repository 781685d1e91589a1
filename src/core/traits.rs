//! Substrate boundary traits.
//!
//! The secure multiplexing protocol (certificate handshake, encryption, stream
//! framing) is not implemented here. It is consumed through these traits,
//! parameterised by the substrate's native address type `A`.
//!
//! ```text
//!   Transport façade
//!         │
//!   Establisher / Listener  ── address codec, resource scope, identity check
//!         │
//!   SecureMuxer<A> ─ MuxedSession<A> ─ MuxedStream
//!         │
//!   mesh packets / anonymity datagrams
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use super::error::{IdentityError, SubstrateError};
use crate::identity::{CertificateChain, PublicKey};
use crate::transport::MuxConfig;

/// A bidirectional, ordered byte stream inside a secure session.
pub trait MuxedStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> MuxedStream for T {}

/// Peer certificate verification hook.
///
/// Called by the secure substrate during the handshake with the certificate
/// chain the peer presented. Returning an error aborts the handshake.
pub type CertVerifier =
    Arc<dyn Fn(&CertificateChain) -> Result<PublicKey, IdentityError> + Send + Sync>;

/// Per-handshake configuration: what we present and how we check the peer.
#[derive(Clone)]
pub struct HandshakeConfig {
    /// Certificate chain presented to the peer.
    pub certificates: CertificateChain,
    /// Verification applied to the peer's chain.
    pub verifier: CertVerifier,
    /// Multiplexer tuning.
    pub mux: MuxConfig,
}

impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeConfig")
            .field("certificates", &self.certificates.len())
            .field("mux", &self.mux)
            .finish_non_exhaustive()
    }
}

/// Produces a handshake config for each inbound client.
///
/// The peer is unknown until its certificate arrives, so nothing about the
/// expected peer can be fixed ahead of time.
pub type ConfigForClient = Arc<dyn Fn() -> HandshakeConfig + Send + Sync>;

/// Listening configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Multiplexer tuning for accepted sessions.
    pub mux: MuxConfig,
    /// Lazily builds the handshake config per inbound client.
    pub config_for_client: ConfigForClient,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("mux", &self.mux)
            .finish_non_exhaustive()
    }
}

/// A handshake-completed, authenticated, multiplexed session.
#[async_trait]
pub trait MuxedSession<A: Send + 'static>: Send + Sync {
    /// Certificate chain the peer presented during the handshake.
    fn peer_certificates(&self) -> &CertificateChain;

    /// Native address of our end.
    fn local_addr(&self) -> A;

    /// Native address of the peer.
    fn remote_addr(&self) -> A;

    /// Open a new bidirectional stream, waiting for stream credit if needed.
    async fn open_stream(&self) -> io::Result<Box<dyn MuxedStream>>;

    /// Wait for the peer to open a bidirectional stream.
    async fn accept_stream(&self) -> io::Result<Box<dyn MuxedStream>>;

    /// Close the session with an application error code and reason.
    fn close(&self, code: u64, reason: &str) -> Result<(), SubstrateError>;

    /// Whether the session has terminated.
    fn is_closed(&self) -> bool;
}

/// A listening secure session endpoint.
#[async_trait]
pub trait SecureListener<A: Send + 'static>: Send + Sync {
    /// Wait for the next handshake-completed inbound session.
    async fn accept(&self) -> Result<Box<dyn MuxedSession<A>>, SubstrateError>;

    /// Native address we are reachable at.
    fn local_addr(&self) -> A;

    /// Stop accepting sessions.
    async fn close(&self) -> Result<(), SubstrateError>;
}

/// The secure multiplexing protocol bound to one packet or datagram handle.
#[async_trait]
pub trait SecureMuxer<A: Send + 'static>: Send + Sync {
    /// Establish a session to `target`.
    async fn dial(
        &self,
        target: A,
        config: HandshakeConfig,
    ) -> Result<Box<dyn MuxedSession<A>>, SubstrateError>;

    /// Start accepting sessions.
    async fn listen(
        &self,
        config: ServerConfig,
    ) -> Result<Box<dyn SecureListener<A>>, SubstrateError>;

    /// Tear down the multiplexer and all its sessions.
    async fn close(&self) -> Result<(), SubstrateError>;
}
