//! Error types
//!
//! Defines domain-specific error types for the registries and the dispatcher.

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Client registry lifecycle errors
#[derive(Debug)]
pub enum RegistryError {
    AlreadyStarted(usize),
    Stopped(usize),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyStarted(id) => write!(f, "Worker {} is already running", id),
            RegistryError::Stopped(id) => write!(f, "Worker {} has been stopped", id),
        }
    }
}

impl std::error::Error for RegistryError {}

/// General ping server error that encompasses all error types
#[derive(Debug)]
pub enum PingerError {
    Config(config::ConfigError),
    InvalidAddress(String),
    Bind(SocketAddr, io::Error),
    Receive(io::Error),
    Registry(RegistryError),
    AlreadyRunning,
    IoError(io::Error),
}

impl fmt::Display for PingerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingerError::Config(e) => write!(f, "Configuration error: {}", e),
            PingerError::InvalidAddress(addr) => write!(f, "Invalid listen address: {}", addr),
            PingerError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
            PingerError::Receive(e) => write!(f, "Socket unusable, receive failed: {}", e),
            PingerError::Registry(e) => write!(f, "Registry error: {}", e),
            PingerError::AlreadyRunning => write!(f, "Server is already running"),
            PingerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for PingerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PingerError::Config(e) => Some(e),
            PingerError::Bind(_, e) | PingerError::Receive(e) | PingerError::IoError(e) => Some(e),
            PingerError::Registry(e) => Some(e),
            PingerError::InvalidAddress(_) | PingerError::AlreadyRunning => None,
        }
    }
}

impl From<config::ConfigError> for PingerError {
    fn from(error: config::ConfigError) -> Self {
        PingerError::Config(error)
    }
}

impl From<RegistryError> for PingerError {
    fn from(error: RegistryError) -> Self {
        PingerError::Registry(error)
    }
}

impl From<io::Error> for PingerError {
    fn from(error: io::Error) -> Self {
        PingerError::IoError(error)
    }
}
