//! Server core functionality
//!
//! The dispatcher that owns the UDP socket and routes registrations to the
//! registry pool, plus the address sharding it relies on.

pub mod core;
pub mod shard;

pub use core::Server;
pub use shard::shard_index;
