//! UDP client liveness tracker
//!
//! Clients register by sending any small datagram to the server. The server
//! shards them across a pool of registries which ping every registered client
//! once per tick and forget the ones that stop registering.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod utils;

pub use config::PingerConfig;
pub use error::PingerError;
pub use server::Server;
