//! Error taxonomy for the probe runtime.
//!
//! Mirrors the shape of a driver's own error module: one `thiserror`-derived
//! enum of error *kinds*, wrapped in a single public `Error` type with a
//! crate-wide `Result` alias.

use std::net::SocketAddr;

use thiserror::Error;

/// Convenience alias used throughout the crate, matching the pattern of a
/// driver exposing `error::Result<T>` rather than the std one.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// True for errors that a probe or the resilient client should retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            *self.kind,
            ErrorKind::TransientIo { .. } | ErrorKind::Timeout { .. }
        )
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(
            *self.kind,
            ErrorKind::Authentication { .. }
                | ErrorKind::Authorization { .. }
                | ErrorKind::Validation { .. }
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    /// Invalid CLI combination, bad cron expression, nonexistent credential file.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Cannot build the initial session against any contact point.
    #[error("connection error: unable to reach any of {contact_points:?}: {message}")]
    Connection {
        contact_points: Vec<String>,
        message: String,
    },

    #[error("authentication failed: {message}")]
    Authentication { message: String },

    #[error("authorization failed: {message}")]
    Authorization { message: String },

    /// CQL probe rejected a non SELECT/INSERT/UPDATE statement pre-flight.
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Socket reset, broken pipe, and other recoverable I/O failures.
    #[error("transient I/O error against {address}: {message}")]
    TransientIo { address: SocketAddr, message: String },

    /// Resilient client only: host's breaker is open.
    #[error("circuit open for {address}, retry after {retry_after_ms}ms")]
    CircuitOpen {
        address: SocketAddr,
        retry_after_ms: u64,
    },

    /// `system.local`/`system.peers` read failed.
    #[error("discovery error: {message}")]
    Discovery { message: String },

    #[error("query error: {message}")]
    Query { message: String },

    #[error("no hosts available: {message}")]
    NoHostAvailable { message: String },
}
