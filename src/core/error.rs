//! Error types for the strata transports.
//!
//! The taxonomy mirrors how the overlay framework must react: address and
//! identity errors are final for the attempt, admission errors are surfaced
//! verbatim so the caller can back off, and substrate errors come from the
//! layers underneath.

use std::io;

use thiserror::Error;

use crate::identity::KeyType;

/// Errors produced while parsing, encoding or translating addresses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Protocol name or code is not registered.
    #[error("unknown address protocol: {0}")]
    UnknownProtocol(String),

    /// Textual or binary form could not be parsed.
    #[error("malformed address: {0}")]
    Malformed(String),

    /// A component value is invalid for its protocol.
    #[error("invalid value for /{protocol}: {reason}")]
    InvalidValue {
        /// Protocol name.
        protocol: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// The address belongs to a different substrate.
    #[error("not an address of this substrate: {0}")]
    NotThisSubstrate(String),

    /// The short form could not be resolved by the substrate.
    #[error("could not resolve {name}: {reason}")]
    Unresolvable {
        /// The name that was looked up.
        name: String,
        /// Reason reported by the substrate.
        reason: String,
    },

    /// A different protocol is already registered under this name or code.
    #[error("protocol conflicts with registered /{0}")]
    ProtocolConflict(String),
}

/// Errors tied to keys and peer identities.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Only Ed25519 keys are supported.
    #[error("only Ed25519 keys are supported, got {0}")]
    UnsupportedKeyAlgorithm(KeyType),

    /// Public key bytes could not be decoded.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Secret key bytes could not be decoded.
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    /// Peer ID bytes or text could not be decoded.
    #[error("invalid peer id: {0}")]
    InvalidPeerId(String),

    /// The peer ID hashes its key, so the key cannot be recovered from it.
    #[error("peer id does not embed its public key")]
    NoInlineKey,

    /// The authenticated peer is not the one that was dialed.
    #[error("peer id mismatch: expected {expected}, got {actual}")]
    PeerMismatch {
        /// Peer that was expected.
        expected: String,
        /// Peer that authenticated.
        actual: String,
    },

    /// Certificate chain is structurally invalid.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Certificate signature does not verify under the host key.
    #[error("certificate signature verification failed")]
    BadSignature,

    /// This transport can only dial a known peer.
    #[error("dialing requires the remote peer id")]
    PeerRequired,
}

/// Admission-control rejections from the resource manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A limit in some scope would be exceeded.
    #[error("resource limit exceeded in {scope} scope: {resource}")]
    LimitExceeded {
        /// Scope that refused (system, transient, peer, ...).
        scope: String,
        /// Resource that ran out (conns, fd, memory, ...).
        resource: String,
    },

    /// The connection or peer is blocked by policy.
    #[error("blocked by resource manager: {0}")]
    Blocked(String),
}

/// Failures reported by the secure-multiplexing, mesh or session substrates.
#[derive(Debug, Error)]
pub enum SubstrateError {
    /// The session, listener or substrate is closed.
    #[error("substrate closed")]
    Closed,

    /// The operation did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// Secure channel handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The target could not be reached.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Broad classification used by callers to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad, foreign or unsupported address.
    Address,
    /// Key algorithm or identity failure.
    Identity,
    /// Resource-manager rejection; may be retried later.
    Admission,
    /// Failure of an underlying substrate.
    Substrate,
    /// API misuse (double listen, unsupported options).
    Usage,
}

/// Top-level transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Address error.
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Identity error.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Resource-manager rejection.
    #[error("admission rejected: {0}")]
    Admission(#[from] ResourceError),

    /// Substrate failure.
    #[error("substrate error: {0}")]
    Substrate(#[from] SubstrateError),

    /// The address is not one this transport dials.
    #[error("unsupported address: {0}")]
    UnsupportedAddress(String),

    /// The address is not one this transport can listen on.
    #[error("unsupported listen address: {0}")]
    UnsupportedListenAddress(String),

    /// A listener is already active on this transport.
    #[error("transport only supports listening once at a time")]
    AlreadyListening,

    /// Pre-shared-key private networks are not supported.
    #[error("private networks are not supported")]
    PrivateNetworkNotSupported,

    /// Peering endpoint uses a scheme other than tcp.
    #[error("unsupported peering transport: {0}")]
    UnsupportedPeeringScheme(String),

    /// Peering endpoint string could not be parsed.
    #[error("invalid peering address: {0}")]
    InvalidPeeringAddress(String),
}

impl TransportError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Address(_) | Self::UnsupportedAddress(_) | Self::UnsupportedListenAddress(_) => {
                ErrorKind::Address
            }
            Self::Identity(_) => ErrorKind::Identity,
            Self::Admission(_) => ErrorKind::Admission,
            Self::Substrate(_) => ErrorKind::Substrate,
            Self::AlreadyListening
            | Self::PrivateNetworkNotSupported
            | Self::UnsupportedPeeringScheme(_)
            | Self::InvalidPeeringAddress(_) => ErrorKind::Usage,
        }
    }

    /// Whether the resource manager refused the connection.
    pub fn is_admission_rejection(&self) -> bool {
        self.kind() == ErrorKind::Admission
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Substrate(SubstrateError::Io(err))
    }
}

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err: TransportError = ResourceError::Blocked("peer".into()).into();
        assert_eq!(err.kind(), ErrorKind::Admission);
        assert!(err.is_admission_rejection());

        let err: TransportError = SubstrateError::Timeout.into();
        assert_eq!(err.kind(), ErrorKind::Substrate);
        assert!(!err.is_admission_rejection());

        let err: TransportError = IdentityError::UnsupportedKeyAlgorithm(KeyType::RSA).into();
        assert_eq!(err.kind(), ErrorKind::Identity);

        assert_eq!(TransportError::AlreadyListening.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_io_error_is_substrate() {
        let err: TransportError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, TransportError::Substrate(SubstrateError::Io(_))));
    }

    #[test]
    fn test_error_messages() {
        let err = IdentityError::UnsupportedKeyAlgorithm(KeyType::Secp256k1);
        assert_eq!(err.to_string(), "only Ed25519 keys are supported, got Secp256k1");
        assert_eq!(
            TransportError::UnsupportedPeeringScheme("udp".into()).to_string(),
            "unsupported peering transport: udp"
        );
    }
}
