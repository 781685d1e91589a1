//! Ed25519 key management.
//!
//! Public keys, key types and peer IDs are the overlay framework's own
//! ([`libp2p_identity`]); this module only owns the local signing key.

use std::fmt;

use libp2p_identity::ed25519;
use zeroize::Zeroizing;

use crate::core::{IdentityError, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};

pub use libp2p_identity::{KeyType, PeerId, PublicKey};

/// A local Ed25519 keypair.
///
/// The secret half is zeroized on drop.
#[derive(Clone)]
pub struct Keypair {
    inner: ed25519::Keypair,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            inner: ed25519::Keypair::generate(),
        }
    }

    /// Create a keypair from a 32-byte secret, zeroizing the input.
    pub fn from_secret_bytes(mut secret: [u8; SECRET_KEY_SIZE]) -> Result<Self, IdentityError> {
        let secret = ed25519::SecretKey::try_from_bytes(&mut secret)
            .map_err(|e| IdentityError::InvalidSecretKey(e.to_string()))?;
        Ok(Self {
            inner: ed25519::Keypair::from(secret),
        })
    }

    /// The public key.
    pub fn public(&self) -> PublicKey {
        PublicKey::from(self.inner.public())
    }

    /// Raw Ed25519 public key bytes.
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.inner.public().to_bytes()
    }

    /// The peer ID of this key.
    pub fn peer_id(&self) -> PeerId {
        self.public().to_peer_id()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.inner.sign(message)
    }

    /// Get the secret key.
    ///
    /// # Security
    /// Handle with care - this exposes sensitive key material.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        let mut out = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        out.copy_from_slice(self.inner.secret().as_ref());
        out
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &hex::encode(self.public_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}
