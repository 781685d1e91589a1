//! Self-describing overlay addresses.
//!
//! An address is a sequence of `(protocol, value)` components. The text form
//! is `/name/value/name/value...`; the binary form is, per component,
//!
//! ```text
//! +--------------+----------------------------+--------------+
//! | code varint  | length varint (if variable)| value bytes  |
//! +--------------+----------------------------+--------------+
//! ```

use std::fmt;
use std::str::FromStr;

use super::registry::{self, Protocol, Size};
use super::varint;
use crate::core::AddressError;

/// One `(protocol, value)` pair.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Component {
    code: u32,
    value: Vec<u8>,
}

impl Component {
    /// Build a component from its protocol name and text value.
    pub fn new(name: &str, value: &str) -> Result<Self, AddressError> {
        let protocol =
            registry::by_name(name).ok_or_else(|| AddressError::UnknownProtocol(name.into()))?;
        let value = protocol.transcoder.parse(protocol.name, value)?;
        Self::from_parts(protocol, value)
    }

    /// Build a component from a registered protocol code and binary value.
    pub fn from_bytes(code: u32, value: Vec<u8>) -> Result<Self, AddressError> {
        let protocol =
            registry::by_code(code).ok_or_else(|| AddressError::UnknownProtocol(format!("{code:#x}")))?;
        protocol.transcoder.validate(protocol.name, &value)?;
        Self::from_parts(protocol, value)
    }

    /// Build a component whose value is known to satisfy its protocol.
    pub(crate) fn from_known(code: u32, value: Vec<u8>) -> Self {
        Self { code, value }
    }

    fn from_parts(protocol: Protocol, value: Vec<u8>) -> Result<Self, AddressError> {
        if let Size::Fixed(size) = protocol.size {
            if value.len() != size {
                return Err(AddressError::InvalidValue {
                    protocol: protocol.name.into(),
                    reason: format!("expected {size} bytes, got {}", value.len()),
                });
            }
        }
        Ok(Self {
            code: protocol.code,
            value,
        })
    }

    /// Protocol code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Binary value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// The registered protocol, if still known.
    pub fn protocol(&self) -> Option<Protocol> {
        registry::by_code(self.code)
    }

    fn write_bytes(&self, out: &mut Vec<u8>) {
        varint::write(u64::from(self.code), out);
        if matches!(self.protocol().map(|p| p.size), Some(Size::Variable)) {
            varint::write(self.value.len() as u64, out);
        }
        out.extend_from_slice(&self.value);
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(protocol) = self.protocol() else {
            return write!(f, "/{:#x}/{}", self.code, hex::encode(&self.value));
        };
        write!(f, "/{}", protocol.name)?;
        if protocol.size == Size::Fixed(0) {
            return Ok(());
        }
        match protocol.transcoder.render(protocol.name, &self.value) {
            Ok(text) => write!(f, "/{text}"),
            Err(_) => write!(f, "/{}", hex::encode(&self.value)),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({self})")
    }
}

/// An overlay address.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Multiaddr {
    components: Vec<Component>,
}

impl Multiaddr {
    /// The empty address.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a component, returning the extended address.
    pub fn with(mut self, component: Component) -> Self {
        self.components.push(component);
        self
    }

    /// Append a component in place.
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Components in order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the address has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Value of the first component with protocol `code`.
    pub fn value_for_protocol(&self, code: u32) -> Option<&[u8]> {
        self.components
            .iter()
            .find(|c| c.code == code)
            .map(Component::value)
    }

    /// Whether the address is exactly one component of protocol `code`.
    pub fn is_exactly(&self, code: u32) -> bool {
        matches!(self.components.as_slice(), [only] if only.code == code)
    }

    /// Binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for component in &self.components {
            component.write_bytes(&mut out);
        }
        out
    }

    /// Parse the binary form.
    pub fn from_bytes(mut bytes: &[u8]) -> Result<Self, AddressError> {
        let mut components = Vec::new();
        while !bytes.is_empty() {
            let (code, used) = varint::read(bytes)
                .ok_or_else(|| AddressError::Malformed("bad protocol code varint".into()))?;
            bytes = &bytes[used..];
            let code = u32::try_from(code)
                .map_err(|_| AddressError::Malformed(format!("protocol code {code} too large")))?;
            let protocol = registry::by_code(code)
                .ok_or_else(|| AddressError::UnknownProtocol(format!("{code:#x}")))?;

            let size = match protocol.size {
                Size::Fixed(size) => size,
                Size::Variable => {
                    let (len, used) = varint::read(bytes)
                        .ok_or_else(|| AddressError::Malformed("bad length varint".into()))?;
                    bytes = &bytes[used..];
                    usize::try_from(len)
                        .map_err(|_| AddressError::Malformed(format!("length {len} too large")))?
                }
            };
            if bytes.len() < size {
                return Err(AddressError::Malformed(format!(
                    "/{} needs {size} bytes, {} left",
                    protocol.name,
                    bytes.len()
                )));
            }
            let (value, rest) = bytes.split_at(size);
            bytes = rest;
            components.push(Component::from_bytes(code, value.to_vec())?);
        }
        Ok(Self { components })
    }
}

impl From<Component> for Multiaddr {
    fn from(component: Component) -> Self {
        Self {
            components: vec![component],
        }
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({self})")
    }
}

impl FromStr for Multiaddr {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(AddressError::Malformed(format!("{s:?} must start with '/'")));
        };
        let mut parts = rest.split('/');
        let mut components = Vec::new();
        while let Some(name) = parts.next() {
            if name.is_empty() {
                if parts.next().is_none() && !components.is_empty() {
                    break; // trailing slash
                }
                return Err(AddressError::Malformed(format!("empty protocol name in {s:?}")));
            }
            let protocol =
                registry::by_name(name).ok_or_else(|| AddressError::UnknownProtocol(name.into()))?;
            let component = if protocol.size == Size::Fixed(0) {
                Component::from_parts(protocol, Vec::new())?
            } else {
                let value = parts.next().ok_or_else(|| {
                    AddressError::Malformed(format!("/{name} is missing its value"))
                })?;
                let value = protocol.transcoder.parse(protocol.name, value)?;
                Component::from_parts(protocol, value)?
            };
            components.push(component);
        }
        Ok(Self { components })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{P_GARLIC32, P_IP4, P_TCP};
    use proptest::prelude::*;

    #[test]
    fn test_text_roundtrip() {
        let addr: Multiaddr = "/ip4/127.0.0.1/tcp/4001".parse().unwrap();
        assert_eq!(addr.len(), 2);
        assert_eq!(addr.to_string(), "/ip4/127.0.0.1/tcp/4001");
        assert_eq!(addr.value_for_protocol(P_TCP), Some(&[0x0f, 0xa1][..]));
        assert!(!addr.is_exactly(P_IP4));
    }

    #[test]
    fn test_binary_layout() {
        let addr: Multiaddr = "/ip4/10.0.0.1/tcp/80".parse().unwrap();
        assert_eq!(addr.to_bytes(), vec![0x04, 10, 0, 0, 1, 0x06, 0, 80]);

        let short = format!("/garlic32/{}", "a".repeat(52));
        let addr: Multiaddr = short.parse().unwrap();
        let bytes = addr.to_bytes();
        assert_eq!(&bytes[..3], &[0xbf, 0x03, 32]);
        assert_eq!(Multiaddr::from_bytes(&bytes).unwrap(), addr);
        assert!(addr.is_exactly(P_GARLIC32));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            "ip4/1.2.3.4".parse::<Multiaddr>(),
            Err(AddressError::Malformed(_))
        ));
        assert!(matches!(
            "/nope/1".parse::<Multiaddr>(),
            Err(AddressError::UnknownProtocol(_))
        ));
        assert!(matches!(
            "/tcp".parse::<Multiaddr>(),
            Err(AddressError::Malformed(_))
        ));
        assert!(matches!(
            "/ip4/999.1.1.1".parse::<Multiaddr>(),
            Err(AddressError::InvalidValue { .. })
        ));
        assert!("/garlic32/aaaa".parse::<Multiaddr>().is_err());
        assert!(Multiaddr::from_bytes(&[0x04, 1, 2]).is_err());
        assert!(Multiaddr::from_bytes(&[0xbf, 0x03, 40, 0]).is_err());
    }

    #[test]
    fn test_trailing_slash_and_empty() {
        let addr: Multiaddr = "/tcp/1/".parse().unwrap();
        assert_eq!(addr.to_string(), "/tcp/1");
        assert!("/".parse::<Multiaddr>().is_err());
        assert!(Multiaddr::empty().is_empty());
        assert!(Multiaddr::from_bytes(&[]).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_ip_tcp_roundtrip(ip in any::<[u8; 4]>(), port in any::<u16>()) {
            let text = format!("/ip4/{}/tcp/{port}", std::net::Ipv4Addr::from(ip));
            let addr: Multiaddr = text.parse().unwrap();
            prop_assert_eq!(addr.to_string(), text);
            prop_assert_eq!(Multiaddr::from_bytes(&addr.to_bytes()).unwrap(), addr);
        }

        #[test]
        fn prop_garlic32_roundtrip(value in proptest::collection::vec(any::<u8>(), 35..64)) {
            let addr = Multiaddr::from(Component::from_bytes(P_GARLIC32, value.clone()).unwrap());
            let reparsed: Multiaddr = addr.to_string().parse().unwrap();
            prop_assert_eq!(reparsed.value_for_protocol(P_GARLIC32), Some(value.as_slice()));
        }
    }
}
