//! Error types for long-running operation resolution.

use ringline_grpc::{DecodeError, GrpcError, GrpcStatus};

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, Error>;

/// Ways a resolution can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The operation finished with a non-OK error. Code and message are
    /// exactly what the service reported.
    #[error("operation completed with error: {code}: {message}")]
    RemoteOperation { code: i32, message: String },

    /// The response payload is not a valid message of the requested type.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A poll (or the call that produced the handle) failed in transport.
    #[error("transport error: {0}")]
    Transport(#[from] GrpcError),

    /// The executor refused the job because it has been shut down.
    #[error("executor is shut down")]
    Rejected,

    /// The producer of a result went away without delivering one.
    #[error("result abandoned before completion")]
    Abandoned,

    /// Invalid configuration value.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// The remote status for a [`RemoteOperation`](Self::RemoteOperation) error.
    pub fn remote_status(&self) -> Option<GrpcStatus> {
        match self {
            Self::RemoteOperation { code, .. } => Some(GrpcStatus::from_code(*code)),
            _ => None,
        }
    }
}
