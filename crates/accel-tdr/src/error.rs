//! Error types for the timeout detection and recovery subsystem.
//!
//! Errors only describe registry misuse, invalid configuration and OS-level
//! thread creation failures. A liveness scan never fails: its outcomes are
//! reported through logging and [`crate::stats::TdrStats`].

use thiserror::Error;

use crate::context::{ClientId, ContextId};

/// Errors that can occur while configuring the watchdog or mutating the registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TdrError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Client not registered with the device.
    #[error("Client not found: {0}")]
    ClientNotFound(ClientId),

    /// Context not registered with its client.
    #[error("Context not found: {0}")]
    ContextNotFound(ContextId),

    /// A watchdog thread could not be spawned.
    #[error("Failed to spawn watchdog thread: {0}")]
    ThreadSpawn(String),
}

impl TdrError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a client not found error.
    #[must_use]
    pub fn client_not_found(client: ClientId) -> Self {
        Self::ClientNotFound(client)
    }

    /// Create a context not found error.
    #[must_use]
    pub fn context_not_found(context: ContextId) -> Self {
        Self::ContextNotFound(context)
    }

    /// Create a thread spawn error from the underlying I/O error.
    #[must_use]
    pub fn thread_spawn(err: &std::io::Error) -> Self {
        Self::ThreadSpawn(err.to_string())
    }
}

/// A specialized `Result` type for TDR operations.
pub type TdrResult<T> = std::result::Result<T, TdrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TdrError::context_not_found(ContextId::new(7));
        assert!(err.to_string().contains("ctx-7"));

        let err = TdrError::client_not_found(ClientId::new(3));
        assert!(err.to_string().contains("client-3"));
    }

    #[test]
    fn test_error_constructors() {
        let err = TdrError::invalid_configuration("interval too large");
        assert!(matches!(err, TdrError::InvalidConfiguration(_)));

        let io = std::io::Error::other("no threads left");
        let err = TdrError::thread_spawn(&io);
        assert!(err.to_string().contains("no threads left"));
    }
}
