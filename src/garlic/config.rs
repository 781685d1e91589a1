//! Garlic transport configuration.

use crate::core::DEFAULT_BRIDGE_ADDR;
use crate::transport::MuxConfig;

/// Tunnel knobs passed to the router when the session opens.
///
/// Unset knobs are left to the router's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Hops in inbound tunnels.
    pub inbound_length: Option<u8>,
    /// Hops in outbound tunnels.
    pub outbound_length: Option<u8>,
    /// Random variance added to inbound tunnel length.
    pub inbound_length_variance: Option<i8>,
    /// Random variance added to outbound tunnel length.
    pub outbound_length_variance: Option<i8>,
    /// Number of inbound tunnels.
    pub inbound_quantity: Option<u8>,
    /// Number of outbound tunnels.
    pub outbound_quantity: Option<u8>,
}

impl SessionOptions {
    /// Zero-hop tunnels, one each way. No anonymity; for local testing.
    pub fn zero_hop() -> Self {
        Self {
            inbound_length: Some(0),
            outbound_length: Some(0),
            inbound_length_variance: Some(0),
            outbound_length_variance: Some(0),
            inbound_quantity: Some(1),
            outbound_quantity: Some(1),
        }
    }

    /// Render as `key=value` router options.
    pub fn to_options(&self) -> Vec<String> {
        let mut options = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                options.push(format!("{key}={value}"));
            }
        };
        push("inbound.length", self.inbound_length.map(|v| v.to_string()));
        push("outbound.length", self.outbound_length.map(|v| v.to_string()));
        push(
            "inbound.lengthVariance",
            self.inbound_length_variance.map(|v| v.to_string()),
        );
        push(
            "outbound.lengthVariance",
            self.outbound_length_variance.map(|v| v.to_string()),
        );
        push("inbound.quantity", self.inbound_quantity.map(|v| v.to_string()));
        push("outbound.quantity", self.outbound_quantity.map(|v| v.to_string()));
        options
    }
}

/// Garlic transport configuration.
#[derive(Debug, Clone)]
pub struct GarlicConfig {
    /// Address of the router's session bridge.
    pub bridge_addr: String,

    /// Tunnel knobs.
    pub session: SessionOptions,

    /// Raw `key=value` options appended after the tunnel knobs.
    pub extra_options: Vec<String>,

    /// Secure multiplexer tuning.
    pub mux: MuxConfig,
}

impl GarlicConfig {
    /// Every option handed to the bridge.
    pub fn options(&self) -> Vec<String> {
        let mut options = self.session.to_options();
        options.extend(self.extra_options.iter().cloned());
        options
    }
}

impl Default for GarlicConfig {
    fn default() -> Self {
        Self {
            bridge_addr: DEFAULT_BRIDGE_ADDR.into(),
            session: SessionOptions::default(),
            extra_options: Vec::new(),
            mux: MuxConfig::default(),
        }
    }
}

/// Builder for [`GarlicConfig`].
#[derive(Debug)]
pub struct GarlicConfigBuilder {
    config: GarlicConfig,
}

impl GarlicConfigBuilder {
    /// Create a new builder with the default bridge address.
    pub fn new() -> Self {
        Self {
            config: GarlicConfig::default(),
        }
    }

    /// Set the bridge address.
    pub fn bridge_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.bridge_addr = addr.into();
        self
    }

    /// Set the tunnel knobs.
    pub fn session(mut self, session: SessionOptions) -> Self {
        self.config.session = session;
        self
    }

    /// Append a raw `key=value` option.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.config.extra_options.push(option.into());
        self
    }

    /// Set the secure multiplexer tuning.
    pub fn mux(mut self, mux: MuxConfig) -> Self {
        self.config.mux = mux;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GarlicConfig {
        self.config
    }
}

impl Default for GarlicConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hop_options() {
        assert_eq!(
            SessionOptions::zero_hop().to_options(),
            vec![
                "inbound.length=0",
                "outbound.length=0",
                "inbound.lengthVariance=0",
                "outbound.lengthVariance=0",
                "inbound.quantity=1",
                "outbound.quantity=1",
            ]
        );
        assert!(SessionOptions::default().to_options().is_empty());
    }

    #[test]
    fn test_builder() {
        let config = GarlicConfigBuilder::new()
            .session(SessionOptions {
                inbound_length: Some(2),
                outbound_length_variance: Some(-1),
                ..Default::default()
            })
            .option("i2cp.leaseSetEncType=4")
            .build();

        assert_eq!(config.bridge_addr, "127.0.0.1:7656");
        assert_eq!(
            config.options(),
            vec![
                "inbound.length=2",
                "outbound.lengthVariance=-1",
                "i2cp.leaseSetEncType=4",
            ]
        );
    }
}
