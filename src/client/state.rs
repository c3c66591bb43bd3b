//! Registry lifecycle states

use std::fmt;

/// Lifecycle of a [`ClientRegistry`](crate::client::ClientRegistry) task.
///
/// `Created -> Running -> Stopping -> Stopped`. A registry stopped before it
/// was ever started goes straight from `Created` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Created,
    Running,
    Stopping,
    Stopped,
}

impl RegistryState {
    /// Returns whether the state is terminal.
    pub fn is_stopped(&self) -> bool {
        matches!(self, RegistryState::Stopped)
    }
}

impl fmt::Display for RegistryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryState::Created => "created",
            RegistryState::Running => "running",
            RegistryState::Stopping => "stopping",
            RegistryState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
