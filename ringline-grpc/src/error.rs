use std::io;

/// gRPC status codes (<https://grpc.github.io/grpc/core/md_doc_statuscodes.html>).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum GrpcStatus {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl GrpcStatus {
    /// Map a wire status code to a `GrpcStatus`. Codes outside the known
    /// range map to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// The numeric wire value.
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl std::fmt::Display for GrpcStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            Self::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::AlreadyExists => write!(f, "ALREADY_EXISTS"),
            Self::PermissionDenied => write!(f, "PERMISSION_DENIED"),
            Self::ResourceExhausted => write!(f, "RESOURCE_EXHAUSTED"),
            Self::FailedPrecondition => write!(f, "FAILED_PRECONDITION"),
            Self::Aborted => write!(f, "ABORTED"),
            Self::OutOfRange => write!(f, "OUT_OF_RANGE"),
            Self::Unimplemented => write!(f, "UNIMPLEMENTED"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
            Self::DataLoss => write!(f, "DATA_LOSS"),
            Self::Unauthenticated => write!(f, "UNAUTHENTICATED"),
        }
    }
}

/// Final status of a call, as delivered to [`Listener::on_close`](crate::Listener::on_close).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: GrpcStatus,
    pub message: String,
}

impl Status {
    pub fn new(code: GrpcStatus, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(GrpcStatus::Ok, "")
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

/// A message body could not be parsed as the requested type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decode error: {reason}")]
pub struct DecodeError {
    reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors produced while issuing a call.
#[derive(Debug, thiserror::Error)]
pub enum GrpcError {
    /// The call closed with a non-OK status.
    #[error("call failed: {0}")]
    Status(Status),

    /// The response message could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transport I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The wait on an in-flight call was interrupted before it completed.
    #[error("call interrupted")]
    Interrupted,

    /// The call closed OK without delivering a response message.
    #[error("call closed without a response message")]
    MissingMessage,

    /// The transport dropped the call without closing it.
    #[error("connection closed")]
    ConnectionClosed,

    /// Protocol error (unexpected event, bad state).
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl GrpcError {
    /// Whether this error only means the caller's wait was cut short, so
    /// issuing the call again is safe.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Self::Interrupted => true,
            Self::Io(e) => e.kind() == io::ErrorKind::Interrupted,
            _ => false,
        }
    }

    /// The call status, if the call closed with one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Status(status) => Some(status),
            _ => None,
        }
    }
}

impl From<Status> for GrpcError {
    fn from(status: Status) -> Self {
        Self::Status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        for code in 0..=16 {
            let status = GrpcStatus::from_code(code);
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn unknown_status_code() {
        assert_eq!(GrpcStatus::from_code(99), GrpcStatus::Unknown);
        assert_eq!(GrpcStatus::from_code(-1), GrpcStatus::Unknown);
    }

    #[test]
    fn status_display() {
        assert_eq!(GrpcStatus::Ok.to_string(), "OK");
        assert_eq!(GrpcStatus::Internal.to_string(), "INTERNAL");
        assert_eq!(
            Status::new(GrpcStatus::NotFound, "no such operation").to_string(),
            "NOT_FOUND: no such operation"
        );
        assert_eq!(Status::ok().to_string(), "OK");
    }

    #[test]
    fn interrupted_detection() {
        assert!(GrpcError::Interrupted.is_interrupted());
        assert!(GrpcError::Io(io::Error::from(io::ErrorKind::Interrupted)).is_interrupted());
        assert!(!GrpcError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_interrupted());
        assert!(!GrpcError::ConnectionClosed.is_interrupted());
    }

    #[test]
    fn error_display() {
        let err = GrpcError::ConnectionClosed;
        assert_eq!(err.to_string(), "connection closed");

        let err = GrpcError::from(DecodeError::new("truncated varint"));
        assert_eq!(err.to_string(), "decode error: truncated varint");

        let err = GrpcError::from(Status::new(GrpcStatus::Unavailable, "backend down"));
        assert_eq!(err.to_string(), "call failed: UNAVAILABLE: backend down");
        assert_eq!(err.status().map(|s| s.code), Some(GrpcStatus::Unavailable));
    }
}
