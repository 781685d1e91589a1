//! Keys, peer identities and the certificate identity used in handshakes.
//!
//! Both transports accept exactly one key algorithm, Ed25519. [`PeerIdentity`]
//! is the gate: it can only be built from an Ed25519 key.

mod certificate;
mod keys;

pub use certificate::*;
pub use keys::*;

use crate::core::{IdentityError, PUBLIC_KEY_SIZE};

/// Multihash code of the identity hash, under which small keys are inlined.
const IDENTITY_MULTIHASH: u8 = 0x00;

/// A verified Ed25519 peer: its key and derived peer ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    public_key: PublicKey,
    peer_id: PeerId,
    key_bytes: [u8; PUBLIC_KEY_SIZE],
}

impl PeerIdentity {
    /// Wrap a public key, rejecting every algorithm but Ed25519.
    pub fn from_public_key(public_key: PublicKey) -> Result<Self, IdentityError> {
        let key_type = public_key.key_type();
        let ed25519 = public_key
            .clone()
            .try_into_ed25519()
            .map_err(|_| IdentityError::UnsupportedKeyAlgorithm(key_type))?;
        Ok(Self {
            peer_id: public_key.to_peer_id(),
            key_bytes: ed25519.to_bytes(),
            public_key,
        })
    }

    /// Recover the key inlined in `peer_id` and gate its algorithm.
    ///
    /// Peer IDs that hash their key carry nothing to recover and are
    /// rejected with [`IdentityError::NoInlineKey`].
    pub fn from_peer_id(peer_id: &PeerId) -> Result<Self, IdentityError> {
        let bytes = peer_id.to_bytes();
        let [IDENTITY_MULTIHASH, len, encoded @ ..] = bytes.as_slice() else {
            return Err(IdentityError::NoInlineKey);
        };
        if usize::from(*len) != encoded.len() {
            return Err(IdentityError::InvalidPeerId(format!(
                "inline key length {} does not match declared {len}",
                encoded.len()
            )));
        }
        let public_key = PublicKey::try_decode_protobuf(encoded)
            .map_err(|e| IdentityError::InvalidPublicKey(e.to_string()))?;
        Self::from_public_key(public_key)
    }

    /// The public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The derived peer ID.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Raw Ed25519 key bytes.
    pub fn key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.key_bytes
    }
}

/// Everything a transport needs to present itself.
#[derive(Debug, Clone)]
pub struct LocalIdentity {
    keypair: Keypair,
    peer: PeerIdentity,
    tls: TlsIdentity,
}

impl LocalIdentity {
    /// Build the local identity and issue its certificate.
    pub fn new(keypair: Keypair) -> Self {
        let peer = PeerIdentity {
            peer_id: keypair.peer_id(),
            public_key: keypair.public(),
            key_bytes: keypair.public_bytes(),
        };
        let tls = TlsIdentity::new(&keypair);
        Self { keypair, peer, tls }
    }

    /// Our keypair.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Our public identity.
    pub fn peer(&self) -> &PeerIdentity {
        &self.peer
    }

    /// Our peer ID.
    pub fn peer_id(&self) -> &PeerId {
        self.peer.peer_id()
    }

    /// Our certificate identity.
    pub fn tls(&self) -> &TlsIdentity {
        &self.tls
    }
}
