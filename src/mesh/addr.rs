//! Mesh addresses and their overlay encoding.
//!
//! A mesh node's address is its Ed25519 public key. The overlay form is a
//! single `/mesh/<hex key>` component; nothing is lost either way.

use std::fmt;
use std::net::Ipv6Addr;

use crate::address::{AddressCodec, Component, Multiaddr, Protocol, Size, Transcoder, registry};
use crate::core::{AddressError, P_MESH, PUBLIC_KEY_SIZE};
use crate::identity::{PeerId, PeerIdentity};

/// The mesh address protocol.
pub const MESH: Protocol = Protocol {
    name: "mesh",
    code: P_MESH,
    size: Size::Fixed(PUBLIC_KEY_SIZE),
    transcoder: Transcoder::Hex,
};

/// First byte of every mesh overlay IPv6 address.
const OVERLAY_IP_PREFIX: u8 = 0x02;

/// A mesh node address: the node's raw Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshAddr([u8; PUBLIC_KEY_SIZE]);

impl MeshAddr {
    /// Wrap raw key bytes.
    pub fn new(key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(key)
    }

    /// The mesh address of a peer.
    pub fn from_peer(peer: &PeerIdentity) -> Self {
        Self(peer.key_bytes())
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// The mesh's IPv6 address for this key.
    ///
    /// The key is inverted, its leading one-bits counted, and the bits
    /// after the first zero packed behind `02:<count>`. Keys closer to
    /// all-zero get shorter, more significant addresses.
    pub fn overlay_ip(&self) -> Ipv6Addr {
        let mut ones: u8 = 0;
        let mut seen_zero = false;
        let mut packed = Vec::with_capacity(PUBLIC_KEY_SIZE);
        let mut acc: u8 = 0;
        let mut acc_bits = 0;

        for idx in 0..PUBLIC_KEY_SIZE * 8 {
            let bit = (!self.0[idx / 8] >> (7 - idx % 8)) & 1;
            if !seen_zero {
                if bit == 1 {
                    ones = ones.wrapping_add(1);
                } else {
                    seen_zero = true;
                }
                continue;
            }
            acc = (acc << 1) | bit;
            acc_bits += 1;
            if acc_bits == 8 {
                packed.push(acc);
                acc = 0;
                acc_bits = 0;
            }
        }

        let mut octets = [0u8; 16];
        octets[0] = OVERLAY_IP_PREFIX;
        octets[1] = ones;
        let len = packed.len().min(octets.len() - 2);
        octets[2..2 + len].copy_from_slice(&packed[..len]);
        Ipv6Addr::from(octets)
    }
}

impl From<[u8; PUBLIC_KEY_SIZE]> for MeshAddr {
    fn from(key: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(key)
    }
}

impl fmt::Display for MeshAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:1", self.overlay_ip())
    }
}

impl fmt::Debug for MeshAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MeshAddr({})", hex::encode(self.0))
    }
}

/// Codec for `/mesh/<key>` addresses.
#[derive(Debug, Clone, Copy)]
pub struct MeshCodec {
    _registered: (),
}

impl MeshCodec {
    /// Register the mesh protocol and build the codec.
    pub fn new() -> Result<Self, AddressError> {
        registry::register(MESH)?;
        Ok(Self { _registered: () })
    }

    /// Overlay address of a peer, from its peer ID.
    pub fn multiaddr_for_peer(&self, peer: &PeerId) -> Result<Multiaddr, AddressError> {
        let identity = PeerIdentity::from_peer_id(peer)
            .map_err(|err| AddressError::NotThisSubstrate(err.to_string()))?;
        self.to_overlay(&MeshAddr::from_peer(&identity))
    }
}

impl AddressCodec for MeshCodec {
    type Native = MeshAddr;

    fn protocols(&self) -> &'static [u32] {
        &[P_MESH]
    }

    fn matches(&self, addr: &Multiaddr) -> bool {
        addr.is_exactly(P_MESH)
    }

    fn to_overlay(&self, native: &MeshAddr) -> Result<Multiaddr, AddressError> {
        Ok(Component::from_bytes(P_MESH, native.0.to_vec())?.into())
    }

    fn to_native(&self, addr: &Multiaddr) -> Result<MeshAddr, AddressError> {
        if !self.matches(addr) {
            return Err(AddressError::NotThisSubstrate(addr.to_string()));
        }
        addr.value_for_protocol(P_MESH)
            .and_then(|value| <[u8; PUBLIC_KEY_SIZE]>::try_from(value).ok())
            .map(MeshAddr)
            .ok_or_else(|| AddressError::Malformed(addr.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;
    use proptest::prelude::*;

    #[test]
    fn test_overlay_ip() {
        let mut key = [0xffu8; 32];
        assert_eq!(MeshAddr(key).overlay_ip(), "200::".parse::<Ipv6Addr>().unwrap());

        key[0] = 0x7f;
        let addr = MeshAddr(key);
        assert_eq!(addr.overlay_ip(), "201::".parse::<Ipv6Addr>().unwrap());
        assert_eq!(addr.to_string(), "[201::]:1");

        // Inverted: 0xc0 0x80. Two ones, the terminating zero, then 00000 1 00.
        let mut key = [0xffu8; 32];
        key[0] = 0x3f;
        key[1] = 0x7f;
        let ip = MeshAddr(key).overlay_ip().octets();
        assert_eq!(ip[0], 0x02);
        assert_eq!(ip[1], 2);
        assert_eq!(ip[2], 0b0000_0100);
    }

    #[test]
    fn test_codec_roundtrip() {
        let codec = MeshCodec::new().unwrap();
        let key = Keypair::generate().public_bytes();
        let addr = MeshAddr::new(key);

        let overlay = codec.to_overlay(&addr).unwrap();
        assert_eq!(overlay.to_string(), format!("/mesh/{}", hex::encode(key)));
        assert!(codec.matches(&overlay));
        assert_eq!(codec.to_native(&overlay).unwrap(), addr);

        let parsed: Multiaddr = overlay.to_string().parse().unwrap();
        assert_eq!(parsed, overlay);
        assert_eq!(Multiaddr::from_bytes(&overlay.to_bytes()).unwrap(), overlay);
    }

    #[test]
    fn test_codec_rejects_foreign() {
        let codec = MeshCodec::new().unwrap();
        let tcp: Multiaddr = "/ip4/127.0.0.1/tcp/1".parse().unwrap();
        assert!(!codec.matches(&tcp));
        assert!(matches!(
            codec.to_native(&tcp),
            Err(AddressError::NotThisSubstrate(_))
        ));

        let short = format!("/mesh/{}", "ab".repeat(16));
        assert!(short.parse::<Multiaddr>().is_err());
    }

    #[test]
    fn test_multiaddr_for_peer() {
        let codec = MeshCodec::new().unwrap();
        let kp = Keypair::generate();
        let id = PeerId::from_public_key(&kp.public());
        let overlay = codec.multiaddr_for_peer(&id).unwrap();
        assert_eq!(
            codec.to_native(&overlay).unwrap(),
            MeshAddr::new(kp.public_bytes())
        );
    }

    proptest! {
        #[test]
        fn prop_roundtrip(key in any::<[u8; 32]>()) {
            let codec = MeshCodec::new().unwrap();
            let overlay = codec.to_overlay(&MeshAddr::new(key)).unwrap();
            let again = codec.to_overlay(&codec.to_native(&overlay).unwrap()).unwrap();
            prop_assert_eq!(again, overlay);
        }
    }
}
