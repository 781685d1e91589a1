//! Address protocol registry.
//!
//! Protocols are registered into an explicit, process-wide table. Standard
//! protocols are present from first use; substrate codecs register their own
//! tags when constructed. Registering an identical protocol again is a no-op.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::encoding;
use crate::core::{
    AddressError, DEST_HASH_SIZE, MIN_DESTINATION_SIZE, P_DNS, P_GARLIC32, P_GARLIC64, P_IP4,
    P_IP6, P_TCP, P_UDP,
};

/// How a protocol's value is sized on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    /// Exactly this many bytes, no length prefix. Zero means no value.
    Fixed(usize),
    /// Varint length prefix followed by the value.
    Variable,
}

/// Conversion between a value's text and binary forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transcoder {
    /// Dotted-quad IPv4.
    Ip4,
    /// IPv6.
    Ip6,
    /// Big-endian u16 port.
    Port,
    /// UTF-8 text.
    Utf8,
    /// Lowercase hex.
    Hex,
    /// Destination hash or encrypted lease set name, base32.
    Garlic32,
    /// Full destination, garlic base64.
    Garlic64,
}

impl Transcoder {
    fn invalid(name: &str, reason: impl Into<String>) -> AddressError {
        AddressError::InvalidValue {
            protocol: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Parse a text value.
    pub fn parse(self, name: &str, text: &str) -> Result<Vec<u8>, AddressError> {
        let bytes = match self {
            Self::Ip4 => text
                .parse::<Ipv4Addr>()
                .map(|ip| ip.octets().to_vec())
                .map_err(|e| Self::invalid(name, e.to_string()))?,
            Self::Ip6 => text
                .parse::<Ipv6Addr>()
                .map(|ip| ip.octets().to_vec())
                .map_err(|e| Self::invalid(name, e.to_string()))?,
            Self::Port => text
                .parse::<u16>()
                .map(|port| port.to_be_bytes().to_vec())
                .map_err(|e| Self::invalid(name, e.to_string()))?,
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Hex => hex::decode(text).map_err(|e| Self::invalid(name, e.to_string()))?,
            Self::Garlic32 => encoding::base32_decode(text)
                .ok_or_else(|| Self::invalid(name, "invalid base32"))?,
            Self::Garlic64 => encoding::base64_decode(text)
                .ok_or_else(|| Self::invalid(name, "invalid base64"))?,
        };
        self.validate(name, &bytes)?;
        Ok(bytes)
    }

    /// Render a binary value as text.
    pub fn render(self, name: &str, bytes: &[u8]) -> Result<String, AddressError> {
        self.validate(name, bytes)?;
        Ok(match self {
            Self::Ip4 => {
                let octets: [u8; 4] = bytes.try_into().map_err(|_| Self::invalid(name, "length"))?;
                Ipv4Addr::from(octets).to_string()
            }
            Self::Ip6 => {
                let octets: [u8; 16] = bytes.try_into().map_err(|_| Self::invalid(name, "length"))?;
                Ipv6Addr::from(octets).to_string()
            }
            Self::Port => {
                let port: [u8; 2] = bytes.try_into().map_err(|_| Self::invalid(name, "length"))?;
                u16::from_be_bytes(port).to_string()
            }
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Self::invalid(name, e.to_string()))?,
            Self::Hex => hex::encode(bytes),
            Self::Garlic32 => encoding::base32_encode(bytes),
            Self::Garlic64 => encoding::base64_encode(bytes),
        })
    }

    /// Check protocol-specific constraints on a binary value.
    pub fn validate(self, name: &str, bytes: &[u8]) -> Result<(), AddressError> {
        match self {
            Self::Utf8 if bytes.is_empty() => Err(Self::invalid(name, "empty value")),
            Self::Utf8 if bytes.contains(&b'/') => Err(Self::invalid(name, "contains '/'")),
            Self::Utf8 => std::str::from_utf8(bytes)
                .map(|_| ())
                .map_err(|e| Self::invalid(name, e.to_string())),
            // 32 bytes is a destination hash; 35 or more is an encrypted lease set.
            Self::Garlic32 if bytes.len() < 35 && bytes.len() != DEST_HASH_SIZE => {
                Err(Self::invalid(
                    name,
                    format!("expected 32 or at least 35 bytes, got {}", bytes.len()),
                ))
            }
            Self::Garlic64 if bytes.len() < MIN_DESTINATION_SIZE => Err(Self::invalid(
                name,
                format!("expected at least {MIN_DESTINATION_SIZE} bytes, got {}", bytes.len()),
            )),
            _ => Ok(()),
        }
    }
}

/// A registered address protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
    /// Text name, as in `/name/value`.
    pub name: &'static str,
    /// Binary code.
    pub code: u32,
    /// Value sizing.
    pub size: Size,
    /// Value transcoding.
    pub transcoder: Transcoder,
}

/// Standard IPv4 protocol.
pub const IP4: Protocol = Protocol {
    name: "ip4",
    code: P_IP4,
    size: Size::Fixed(4),
    transcoder: Transcoder::Ip4,
};

/// Standard TCP protocol.
pub const TCP: Protocol = Protocol {
    name: "tcp",
    code: P_TCP,
    size: Size::Fixed(2),
    transcoder: Transcoder::Port,
};

/// Standard IPv6 protocol.
pub const IP6: Protocol = Protocol {
    name: "ip6",
    code: P_IP6,
    size: Size::Fixed(16),
    transcoder: Transcoder::Ip6,
};

/// Standard DNS protocol.
pub const DNS: Protocol = Protocol {
    name: "dns",
    code: P_DNS,
    size: Size::Variable,
    transcoder: Transcoder::Utf8,
};

/// Standard UDP protocol.
pub const UDP: Protocol = Protocol {
    name: "udp",
    code: P_UDP,
    size: Size::Fixed(2),
    transcoder: Transcoder::Port,
};

/// Anonymity family short form.
pub const GARLIC32: Protocol = Protocol {
    name: "garlic32",
    code: P_GARLIC32,
    size: Size::Variable,
    transcoder: Transcoder::Garlic32,
};

/// Anonymity family long form.
pub const GARLIC64: Protocol = Protocol {
    name: "garlic64",
    code: P_GARLIC64,
    size: Size::Variable,
    transcoder: Transcoder::Garlic64,
};

#[derive(Debug, Default)]
struct ProtocolRegistry {
    by_code: HashMap<u32, Protocol>,
    by_name: HashMap<&'static str, u32>,
}

impl ProtocolRegistry {
    fn with_standard_protocols() -> Self {
        let mut registry = Self::default();
        for protocol in [IP4, TCP, IP6, DNS, UDP, GARLIC32, GARLIC64] {
            registry.by_code.insert(protocol.code, protocol);
            registry.by_name.insert(protocol.name, protocol.code);
        }
        registry
    }

    fn insert(&mut self, protocol: Protocol) -> Result<(), AddressError> {
        match (
            self.by_code.get(&protocol.code),
            self.by_name.get(protocol.name),
        ) {
            (Some(existing), _) if *existing == protocol => Ok(()),
            (Some(existing), _) => Err(AddressError::ProtocolConflict(existing.name.to_string())),
            (None, Some(_)) => Err(AddressError::ProtocolConflict(protocol.name.to_string())),
            (None, None) => {
                self.by_code.insert(protocol.code, protocol);
                self.by_name.insert(protocol.name, protocol.code);
                Ok(())
            }
        }
    }
}

static REGISTRY: Lazy<RwLock<ProtocolRegistry>> =
    Lazy::new(|| RwLock::new(ProtocolRegistry::with_standard_protocols()));

/// Register a protocol. Re-registering an identical protocol is a no-op;
/// reusing a name or code for something else is a conflict.
pub fn register(protocol: Protocol) -> Result<(), AddressError> {
    REGISTRY.write().insert(protocol)
}

/// Look up a protocol by code.
pub fn by_code(code: u32) -> Option<Protocol> {
    REGISTRY.read().by_code.get(&code).copied()
}

/// Look up a protocol by name.
pub fn by_name(name: &str) -> Option<Protocol> {
    let registry = REGISTRY.read();
    let code = registry.by_name.get(name)?;
    registry.by_code.get(code).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PROTOCOL: Protocol = Protocol {
        name: "registry-test",
        code: 0x3f00,
        size: Size::Fixed(0),
        transcoder: Transcoder::Hex,
    };

    #[test]
    fn test_standard_protocols_present() {
        assert_eq!(by_name("ip4"), Some(IP4));
        assert_eq!(by_code(P_GARLIC64), Some(GARLIC64));
        assert_eq!(by_name("nonexistent"), None);
    }

    #[test]
    fn test_register_is_idempotent() {
        register(TEST_PROTOCOL).unwrap();
        register(TEST_PROTOCOL).unwrap();
        assert_eq!(by_code(0x3f00), Some(TEST_PROTOCOL));
    }

    #[test]
    fn test_register_conflicts() {
        let same_code = Protocol {
            name: "registry-test-other",
            ..IP4
        };
        assert!(matches!(
            register(same_code),
            Err(AddressError::ProtocolConflict(_))
        ));

        let same_name = Protocol {
            code: 0x3f01,
            ..IP4
        };
        assert!(matches!(
            register(same_name),
            Err(AddressError::ProtocolConflict(_))
        ));
    }

    #[test]
    fn test_transcoders() {
        assert_eq!(
            Transcoder::Ip4.parse("ip4", "127.0.0.1").unwrap(),
            vec![127, 0, 0, 1]
        );
        assert_eq!(Transcoder::Port.render("tcp", &[0x1f, 0x90]).unwrap(), "8080");
        assert!(Transcoder::Port.parse("tcp", "70000").is_err());
        assert!(Transcoder::Utf8.parse("dns", "").is_err());
        assert!(Transcoder::Garlic32.validate("garlic32", &[0u8; 33]).is_err());
        assert!(Transcoder::Garlic32.validate("garlic32", &[0u8; 40]).is_ok());
        assert!(Transcoder::Garlic64.validate("garlic64", &[0u8; 100]).is_err());
        assert!(Transcoder::Garlic64.validate("garlic64", &[0u8; MIN_DESTINATION_SIZE - 1]).is_err());
        assert!(Transcoder::Garlic64.validate("garlic64", &[0u8; MIN_DESTINATION_SIZE]).is_ok());
    }
}
