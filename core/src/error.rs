//! Error types for the Streak API client.
//!
//! # Design
//! The Streak API reports most failures inside a JSON body rather than
//! through the status line, so `Api` carries the vendor's own message and
//! `HttpError` is reserved for non-2xx responses whose body is not JSON at
//! all. `Refetch` marks the gap between a write that landed and the read
//! that should have returned the written record.

use thiserror::Error;

/// Errors returned by `StreakClient` parse methods and `Connection` operations.
#[derive(Debug, Error)]
pub enum StreakError {
    /// The request never produced a response (connection refused, DNS, I/O).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response body carried the vendor error marker.
    #[error("Streak API error: {message}")]
    Api { message: String },

    /// A required argument was rejected before any request was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A delete response did not report `success: true`.
    #[error("failed to delete {resource}")]
    DeleteFailed { resource: &'static str },

    /// A non-2xx response whose body was not JSON.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request parameters could not be encoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Settings could not be read or parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The write succeeded but fetching the written record failed.
    #[error("write to {key} succeeded but refetch failed: {source}")]
    Refetch {
        key: String,
        #[source]
        source: Box<StreakError>,
    },
}

/// Result type for Streak operations.
pub type Result<T> = std::result::Result<T, StreakError>;

impl StreakError {
    /// Whether the server-side write behind this error is known to have landed.
    pub fn write_committed(&self) -> bool {
        matches!(self, StreakError::Refetch { .. })
    }
}
