//! # Error Types
//!
//! Transport failures carry a [`FailureCode`] that decides whether the
//! connection manager retries. Everything else is a [`ClientError`].

use thiserror::Error;

/// Why a connection attempt or an open stream failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    Unavailable,
    DeadlineExceeded,
    ResourceExhausted,
    Internal,
    Unknown,
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    NotFound,
    Cancelled,
}

impl FailureCode {
    /// Retry-worthy failures. Everything else stops reconnection.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::DeadlineExceeded
                | Self::ResourceExhausted
                | Self::Internal
                | Self::Unknown
        )
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unavailable => "UNAVAILABLE",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Internal => "INTERNAL",
            Self::Unknown => "UNKNOWN",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// A failed connect, read, or write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct TransportError {
    pub code: FailureCode,
    pub message: String,
}

impl TransportError {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }
}

/// Errors from the client API.
#[derive(Error, Debug)]
pub enum ClientError {
    /// `send` was called while the session is not `Connected`.
    #[error("not connected")]
    NotConnected,
}
