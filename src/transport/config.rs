//! Secure multiplexer tuning.

use crate::core::{
    MAX_CONNECTION_RECEIVE_WINDOW, MAX_INCOMING_STREAMS, MAX_INCOMING_UNI_STREAMS,
    MAX_STREAM_RECEIVE_WINDOW,
};

/// Tuning handed to the secure multiplexer for every session.
///
/// The defaults are what remote nodes expect; change them only for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// Maximum concurrently open incoming bidirectional streams.
    pub max_incoming_streams: u32,
    /// Maximum concurrently open incoming unidirectional streams.
    pub max_incoming_uni_streams: u32,
    /// Receive window per stream, in bytes.
    pub max_stream_receive_window: u64,
    /// Receive window per connection, in bytes.
    pub max_connection_receive_window: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_incoming_streams: MAX_INCOMING_STREAMS,
            max_incoming_uni_streams: MAX_INCOMING_UNI_STREAMS,
            max_stream_receive_window: MAX_STREAM_RECEIVE_WINDOW,
            max_connection_receive_window: MAX_CONNECTION_RECEIVE_WINDOW,
        }
    }
}

impl MuxConfig {
    /// Override the incoming stream limit.
    pub fn with_max_incoming_streams(mut self, max: u32) -> Self {
        self.max_incoming_streams = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MuxConfig::default();
        assert_eq!(config.max_incoming_streams, 256);
        assert_eq!(config.max_incoming_uni_streams, 0);
        assert_eq!(config.max_stream_receive_window, 10 * 1024 * 1024);
        assert_eq!(config.max_connection_receive_window, 15 * 1024 * 1024);
        assert_eq!(config.with_max_incoming_streams(4).max_incoming_streams, 4);
    }
}
