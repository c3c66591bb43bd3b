//! Error handling
//!
//! Defines error types and handling for the ping server.

pub mod handlers;
pub mod types;

pub use handlers::{error_to_exit_code, handle_error};
pub use types::*;
