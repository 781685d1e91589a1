//! Mesh transport configuration.

use crate::transport::MuxConfig;

/// Mesh transport configuration.
#[derive(Debug, Clone, Default)]
pub struct MeshConfig {
    /// Peering endpoints to dial at startup (`tcp://host:port`).
    pub peers: Vec<String>,

    /// Peering endpoints to listen on (`tcp://host:port`).
    pub peering_listens: Vec<String>,

    /// Secure multiplexer tuning.
    pub mux: MuxConfig,
}

/// Builder for [`MeshConfig`].
#[derive(Debug)]
pub struct MeshConfigBuilder {
    config: MeshConfig,
}

impl MeshConfigBuilder {
    /// Create a new builder with no peerings.
    pub fn new() -> Self {
        Self {
            config: MeshConfig::default(),
        }
    }

    /// Add a peering endpoint to dial.
    pub fn peer(mut self, endpoint: impl Into<String>) -> Self {
        self.config.peers.push(endpoint.into());
        self
    }

    /// Add a peering endpoint to listen on.
    pub fn peering_listen(mut self, endpoint: impl Into<String>) -> Self {
        self.config.peering_listens.push(endpoint.into());
        self
    }

    /// Set the secure multiplexer tuning.
    pub fn mux(mut self, mux: MuxConfig) -> Self {
        self.config.mux = mux;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MeshConfig {
        self.config
    }
}

impl Default for MeshConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = MeshConfigBuilder::new()
            .peer("tcp://10.0.0.1:9001")
            .peer("tcp://10.0.0.2:9001")
            .peering_listen("tcp://0.0.0.0:9001")
            .mux(MuxConfig::default().with_max_incoming_streams(16))
            .build();

        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.peering_listens, vec!["tcp://0.0.0.0:9001"]);
        assert_eq!(config.mux.max_incoming_streams, 16);
    }
}
