//! Fixed constants shared by both transports.
//!
//! These values are part of the wire contract with remote nodes and
//! MUST NOT be changed without coordinating a protocol bump.

use std::time::Duration;

// =============================================================================
// KEYS AND IDENTITIES
// =============================================================================

/// Ed25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 secret key size.
pub const SECRET_KEY_SIZE: usize = 32;

/// Ed25519 signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// Prefix signed by the host key over the certificate key.
pub const CERTIFICATE_SIGNATURE_PREFIX: &[u8] = b"libp2p-tls-handshake:";

// =============================================================================
// ADDRESS PROTOCOL CODES
// =============================================================================

/// Mesh family: raw Ed25519 public key, fixed size, no length prefix.
pub const P_MESH: u32 = 0x3f42;

/// Anonymity family, short form: destination hash (base32).
pub const P_GARLIC32: u32 = 0x01bf;

/// Anonymity family, long form: full self-certifying destination (base64).
pub const P_GARLIC64: u32 = 0x01be;

/// IPv4 address.
pub const P_IP4: u32 = 0x04;

/// TCP port.
pub const P_TCP: u32 = 0x06;

/// IPv6 address.
pub const P_IP6: u32 = 0x29;

/// DNS name.
pub const P_DNS: u32 = 0x35;

/// UDP port.
pub const P_UDP: u32 = 0x0111;

// =============================================================================
// SECURE MULTIPLEXING TUNING
// =============================================================================

/// Maximum concurrently open incoming bidirectional streams per connection.
pub const MAX_INCOMING_STREAMS: u32 = 256;

/// Incoming unidirectional streams are disabled.
pub const MAX_INCOMING_UNI_STREAMS: u32 = 0;

/// Per-stream receive window (10 MiB).
pub const MAX_STREAM_RECEIVE_WINDOW: u64 = 10 * (1 << 20);

/// Per-connection receive window (15 MiB).
pub const MAX_CONNECTION_RECEIVE_WINDOW: u64 = 15 * (1 << 20);

// =============================================================================
// MESH PEERING
// =============================================================================

/// Deadline for the raw-socket peering key exchange.
pub const PEERING_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Link priority handed to the mesh for bootstrapped peerings.
pub const PEERING_LINK_PRIORITY: u8 = 0;

/// Only supported peering endpoint scheme.
pub const PEERING_SCHEME_TCP: &str = "tcp";

// =============================================================================
// ANONYMITY SUBSTRATE
// =============================================================================

/// Default address of the local session-bridge daemon.
pub const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:7656";

/// Size of a destination hash.
pub const DEST_HASH_SIZE: usize = 32;

/// Smallest valid full destination (256-byte encryption key, 128-byte signing
/// key, 3-byte null certificate).
pub const MIN_DESTINATION_SIZE: usize = 387;

/// Suffix of short-form destination names.
pub const B32_SUFFIX: &str = ".b32.i2p";

/// Suffix of long-form destination names.
pub const I2P_SUFFIX: &str = ".i2p";
