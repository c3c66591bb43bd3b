//! Error handlers
//!
//! Reporting helpers used by the binary entry point.

use crate::error::types::PingerError;
use log::error;

/// Handle a ping server error
pub fn handle_error(err: &PingerError) {
    error!("Ping Server Error: {}", err);
}

/// Convert error to a sysexits(3) style process exit code
pub fn error_to_exit_code(err: &PingerError) -> u8 {
    match err {
        PingerError::Config(_) => 78,
        PingerError::InvalidAddress(_) => 69,
        PingerError::Bind(_, _) => 69,
        PingerError::Receive(_) => 74,
        PingerError::IoError(_) => 74,
        PingerError::Registry(_) => 70,
        PingerError::AlreadyRunning => 70,
    }
}
