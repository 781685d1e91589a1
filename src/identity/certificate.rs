//! Certificate identity bound into the secure channel handshake.
//!
//! Each node presents a single certificate whose key is signed by its host
//! key:
//!
//! ```text
//! signature = Sign(host_key, "libp2p-tls-handshake:" || certificate_key)
//! ```
//!
//! The secure substrate binds its channel to the certificate key; this module
//! proves the certificate key belongs to the host key, and from there to the
//! peer ID.

use std::sync::Arc;

use super::keys::{KeyType, Keypair, PeerId, PublicKey};
use crate::core::{CERTIFICATE_SIGNATURE_PREFIX, HandshakeConfig, IdentityError, PUBLIC_KEY_SIZE};
use crate::transport::MuxConfig;

/// A host-key-signed certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    host_key: Vec<u8>,
    certificate_key: [u8; PUBLIC_KEY_SIZE],
    signature: Vec<u8>,
}

impl Certificate {
    /// Assemble a certificate from its parts.
    pub fn new(host_key: Vec<u8>, certificate_key: [u8; PUBLIC_KEY_SIZE], signature: Vec<u8>) -> Self {
        Self {
            host_key,
            certificate_key,
            signature,
        }
    }

    /// Protobuf-encoded host public key.
    pub fn host_key(&self) -> &[u8] {
        &self.host_key
    }

    /// Certificate public key used by the secure channel.
    pub fn certificate_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.certificate_key
    }

    /// Host key signature over the certificate key.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    fn signed_message(certificate_key: &[u8; PUBLIC_KEY_SIZE]) -> Vec<u8> {
        let mut message = CERTIFICATE_SIGNATURE_PREFIX.to_vec();
        message.extend_from_slice(certificate_key);
        message
    }
}

/// The chain a peer presents. Exactly one certificate is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateChain(Vec<Certificate>);

impl CertificateChain {
    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Certificates in presentation order.
    pub fn certificates(&self) -> &[Certificate] {
        &self.0
    }
}

impl From<Vec<Certificate>> for CertificateChain {
    fn from(certs: Vec<Certificate>) -> Self {
        Self(certs)
    }
}

/// Our certificate identity.
#[derive(Debug, Clone)]
pub struct TlsIdentity {
    chain: CertificateChain,
}

impl TlsIdentity {
    /// Issue a certificate for `host` over a fresh certificate key.
    pub fn new(host: &Keypair) -> Self {
        let certificate_key = Keypair::generate().public_bytes();
        let signature = host.sign(&Certificate::signed_message(&certificate_key));
        let certificate =
            Certificate::new(host.public().encode_protobuf(), certificate_key, signature);
        Self {
            chain: CertificateChain(vec![certificate]),
        }
    }

    /// The chain we present.
    pub fn certificates(&self) -> &CertificateChain {
        &self.chain
    }

    /// Handshake config that presents our chain and verifies the peer's.
    ///
    /// With `expected` set, a peer authenticating as anyone else fails the
    /// handshake. Without it, any well-formed chain is accepted and the
    /// caller learns the peer from the result.
    pub fn config_for_peer(&self, expected: Option<PeerId>, mux: MuxConfig) -> HandshakeConfig {
        HandshakeConfig {
            certificates: self.chain.clone(),
            verifier: Arc::new(move |chain: &CertificateChain| {
                verify_certificate_chain(chain, expected.as_ref())
            }),
            mux,
        }
    }
}

/// Extract the peer's host key from its certificate chain.
///
/// Ed25519 host keys must have signed the certificate key. Keys of other
/// algorithms are returned unverified; the transports reject them by type.
pub fn verify_certificate_chain(
    chain: &CertificateChain,
    expected: Option<&PeerId>,
) -> Result<PublicKey, IdentityError> {
    let [certificate] = chain.certificates() else {
        return Err(IdentityError::InvalidCertificate(format!(
            "expected one certificate, got {}",
            chain.len()
        )));
    };

    let host_key = PublicKey::try_decode_protobuf(certificate.host_key())
        .map_err(|e| IdentityError::InvalidPublicKey(e.to_string()))?;
    if host_key.key_type() == KeyType::Ed25519
        && !host_key.verify(
            &Certificate::signed_message(certificate.certificate_key()),
            certificate.signature(),
        )
    {
        return Err(IdentityError::BadSignature);
    }

    if let Some(expected) = expected {
        let actual = PeerId::from_public_key(&host_key);
        if actual != *expected {
            return Err(IdentityError::PeerMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }

    Ok(host_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use libp2p_identity::secp256k1;

    #[test]
    fn test_own_chain_verifies() {
        let host = Keypair::generate();
        let tls = TlsIdentity::new(&host);
        let key = verify_certificate_chain(tls.certificates(), None).unwrap();
        assert_eq!(key, host.public());
    }

    #[test]
    fn test_expected_peer_enforced() {
        let host = Keypair::generate();
        let other = Keypair::generate();
        let tls = TlsIdentity::new(&host);

        let expected = PeerId::from_public_key(&host.public());
        assert!(verify_certificate_chain(tls.certificates(), Some(&expected)).is_ok());

        let wrong = PeerId::from_public_key(&other.public());
        assert!(matches!(
            verify_certificate_chain(tls.certificates(), Some(&wrong)),
            Err(IdentityError::PeerMismatch { .. })
        ));
    }

    #[test]
    fn test_forged_signature_rejected() {
        let host = Keypair::generate();
        let forged = Certificate::new(host.public().encode_protobuf(), [4u8; 32], vec![0u8; 64]);
        let chain = CertificateChain::from(vec![forged]);
        assert_eq!(
            verify_certificate_chain(&chain, None),
            Err(IdentityError::BadSignature)
        );
    }

    #[test]
    fn test_chain_length_enforced() {
        let tls = TlsIdentity::new(&Keypair::generate());
        let cert = tls.certificates().certificates()[0].clone();
        let chain = CertificateChain::from(vec![cert.clone(), cert]);
        assert!(matches!(
            verify_certificate_chain(&chain, None),
            Err(IdentityError::InvalidCertificate(_))
        ));
        assert!(verify_certificate_chain(&CertificateChain::default(), None).is_err());
    }

    #[test]
    fn test_other_algorithms_extracted() {
        let key = PublicKey::from(secp256k1::Keypair::generate().public().clone());
        let cert = Certificate::new(key.encode_protobuf(), [0u8; 32], vec![1, 2, 3]);
        let extracted = verify_certificate_chain(&CertificateChain::from(vec![cert]), None).unwrap();
        assert_eq!(extracted.key_type(), KeyType::Secp256k1);
    }

    #[test]
    fn test_undecodable_host_key_rejected() {
        for host_key in [vec![], vec![0x08, 0x01, 0x12, 0x20, 0x00], vec![0x1a, 0x00]] {
            let cert = Certificate::new(host_key, [0u8; 32], vec![0u8; 64]);
            assert!(matches!(
                verify_certificate_chain(&CertificateChain::from(vec![cert]), None),
                Err(IdentityError::InvalidPublicKey(_))
            ));
        }
    }

    #[test]
    fn test_config_verifier_uses_expected_peer() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        let a_tls = TlsIdentity::new(&a);
        let b_tls = TlsIdentity::new(&b);

        let config = a_tls.config_for_peer(
            Some(PeerId::from_public_key(&b.public())),
            MuxConfig::default(),
        );
        assert_eq!((config.verifier)(b_tls.certificates()).unwrap(), b.public());
        assert!((config.verifier)(a_tls.certificates()).is_err());
    }
}
