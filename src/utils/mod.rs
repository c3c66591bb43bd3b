//! Utility functions
//!
//! Provides logging, network and signal utilities.

pub mod logging;
pub mod network;
pub mod signal;
