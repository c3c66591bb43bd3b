//! Address sharding
//!
//! Maps a client address to a registry index. The hasher is built with fixed
//! keys, so an address always lands on the same registry for the lifetime of
//! the process.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::net::SocketAddr;

/// Returns the index of the registry that owns `address` in a pool of
/// `pool_size` registries.
///
/// # Panics
///
/// Panics if `pool_size` is zero. Callers size the pool from a validated
/// [`PingerConfig`](crate::config::PingerConfig), which rejects an empty pool.
pub fn shard_index(address: &SocketAddr, pool_size: usize) -> usize {
    assert!(pool_size > 0, "pool size must be non-zero");

    let mut hasher = DefaultHasher::new();
    address.hash(&mut hasher);
    (hasher.finish() % pool_size as u64) as usize
}
