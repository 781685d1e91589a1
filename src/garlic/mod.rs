//! Anonymity network substrate.
//!
//! Sessions are opened through the router's local bridge. A session has a
//! self-certifying [`Destination`]; its SHA-256 [`DestHash`] is the short
//! name peers usually exchange.

mod addr;
mod bridge;
mod codec;
mod config;
mod transport;

pub use addr::{DestHash, Destination, GarlicAddr};
pub use bridge::{GarlicSession, GarlicSubstrate, SessionBridge};
pub use codec::{GarlicCodec, empty_listen_addr};
pub use config::{GarlicConfig, GarlicConfigBuilder, SessionOptions};
pub use transport::GarlicTransport;
