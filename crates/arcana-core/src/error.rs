//! Error types for correlated requests
//!
//! Transport-level failures are not surfaced as errors; they show up as
//! `ConnectionState` changes and are retried by the connection task.
//! Only correlated requests report errors to the caller.

use thiserror::Error;

/// Fallback message when the backend reports an error without one
pub const DEFAULT_SYNC_ERROR: &str = "Repository sync failed";

/// Errors returned by correlated requests such as workspace selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport was not connected when the request was sent
    #[error("Not connected to the Arcana backend")]
    NotConnected,

    /// No terminal response arrived within the request timeout
    #[error("Request timed out")]
    Timeout,

    /// The backend reported a failure
    #[error("{0}")]
    Server(String),

    /// The connection dropped while the request was in flight
    #[error("Connection closed while the request was in flight")]
    ConnectionClosed,

    /// The client was shut down before the request settled
    #[error("Client shut down")]
    Shutdown,
}
