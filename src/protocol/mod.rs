//! Wire format
//!
//! Registrations are opaque datagrams; only the sender address matters.
//! Pings are a fixed two-byte marker.

/// Payload of every ping datagram sent to a registered client.
pub const PING_PAYLOAD: [u8; 2] = [0x75, 0x61];

/// Receive buffer size for registrations. Longer datagrams are truncated.
pub const REGISTRATION_BUFFER_SIZE: usize = 2;
