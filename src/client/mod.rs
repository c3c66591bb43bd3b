//! Client tracking
//!
//! Sharded registries that remember clients, ping them and forget the silent ones.

pub mod registry;
pub mod state;

pub use registry::ClientRegistry;
pub use state::RegistryState;
