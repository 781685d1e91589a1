//! Anonymity network addresses.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::address::{base32_decode, base32_encode, base64_decode, base64_encode};
use crate::core::{AddressError, B32_SUFFIX, DEST_HASH_SIZE, I2P_SUFFIX, MIN_DESTINATION_SIZE};

/// A full self-certifying destination: public keys plus certificate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Destination(Vec<u8>);

impl Destination {
    /// Wrap raw destination bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, AddressError> {
        if bytes.len() < MIN_DESTINATION_SIZE {
            return Err(AddressError::InvalidValue {
                protocol: "garlic64".into(),
                reason: format!(
                    "destination is {} bytes, need at least {MIN_DESTINATION_SIZE}",
                    bytes.len()
                ),
            });
        }
        Ok(Self(bytes))
    }

    /// Raw destination bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// SHA-256 of the destination, its short name.
    pub fn hash(&self) -> DestHash {
        DestHash(Sha256::digest(&self.0).into())
    }

    /// The network's base64 text form.
    pub fn to_base64(&self) -> String {
        base64_encode(&self.0)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Destination({})", self.hash())
    }
}

impl FromStr for Destination {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.strip_suffix(I2P_SUFFIX).unwrap_or(s);
        let bytes = base64_decode(text).ok_or_else(|| AddressError::Malformed(s.into()))?;
        Self::from_bytes(bytes)
    }
}

/// A destination hash: the short, non-dialable form of a destination.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DestHash([u8; DEST_HASH_SIZE]);

impl DestHash {
    /// Wrap raw hash bytes.
    pub fn new(hash: [u8; DEST_HASH_SIZE]) -> Self {
        Self(hash)
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; DEST_HASH_SIZE] {
        &self.0
    }

    /// Base32 without the `.b32.i2p` suffix.
    pub fn to_base32(&self) -> String {
        base32_encode(&self.0)
    }
}

impl fmt::Display for DestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{B32_SUFFIX}", self.to_base32())
    }
}

impl fmt::Debug for DestHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestHash({self})")
    }
}

impl FromStr for DestHash {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.strip_suffix(B32_SUFFIX).unwrap_or(s);
        base32_decode(text)
            .and_then(|bytes| <[u8; DEST_HASH_SIZE]>::try_from(bytes).ok())
            .map(Self)
            .ok_or_else(|| AddressError::Malformed(s.into()))
    }
}

/// A native anonymity network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GarlicAddr {
    /// Full destination, dialable as is.
    Destination(Destination),
    /// Destination hash, dialable after a lookup.
    Hash(DestHash),
}

impl GarlicAddr {
    /// The destination hash, computed if this is a full destination.
    pub fn hash(&self) -> DestHash {
        match self {
            Self::Destination(dest) => dest.hash(),
            Self::Hash(hash) => *hash,
        }
    }
}

impl From<Destination> for GarlicAddr {
    fn from(dest: Destination) -> Self {
        Self::Destination(dest)
    }
}

impl From<DestHash> for GarlicAddr {
    fn from(hash: DestHash) -> Self {
        Self::Hash(hash)
    }
}

impl fmt::Display for GarlicAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Destination(dest) => write!(f, "{dest}{I2P_SUFFIX}"),
            Self::Hash(hash) => hash.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destination(fill: u8) -> Destination {
        Destination::from_bytes(vec![fill; MIN_DESTINATION_SIZE]).unwrap()
    }

    #[test]
    fn test_dest_hash_text() {
        let zero = DestHash::default();
        let text = zero.to_string();
        assert_eq!(text, format!("{}.b32.i2p", "a".repeat(52)));
        assert_eq!(text.parse::<DestHash>().unwrap(), zero);
        assert_eq!("a".repeat(52).parse::<DestHash>().unwrap(), zero);
        assert!("aaaa.b32.i2p".parse::<DestHash>().is_err());
    }

    #[test]
    fn test_destination_text() {
        let dest = destination(0xfe);
        let text = format!("{dest}.i2p");
        assert!(!dest.to_string().contains('+'));
        assert_eq!(text.parse::<Destination>().unwrap(), dest);
        assert_eq!(dest.to_string().parse::<Destination>().unwrap(), dest);
    }

    #[test]
    fn test_destination_minimum_size() {
        assert!(Destination::from_bytes(vec![0; MIN_DESTINATION_SIZE - 1]).is_err());
        assert!(Destination::from_bytes(vec![0; MIN_DESTINATION_SIZE + 4]).is_ok());
    }

    #[test]
    fn test_hash_is_sha256() {
        let dest = destination(1);
        let expected: [u8; 32] = Sha256::digest(dest.as_bytes()).into();
        assert_eq!(dest.hash().as_bytes(), &expected);
        assert_eq!(GarlicAddr::from(dest.clone()).hash(), dest.hash());
        assert_eq!(GarlicAddr::from(dest.hash()).hash(), dest.hash());
    }
}
