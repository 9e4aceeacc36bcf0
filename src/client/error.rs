//! Transport error types

use thiserror::Error;

/// Transport error with classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Status(code), message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Io, message)
    }

    /// Map a reqwest error into the taxonomy.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network(format!("Request timeout: {err}"))
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::network(format!("Request failed: {err}"))
        }
    }
}

/// Classification of a failed transport operation. Nothing here is retried;
/// the kinds exist for logging and tests, not for backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Network unreachable, connect failure, timeout.
    Network,
    /// Non-2xx HTTP status.
    Status(u16),
    /// Response body did not match the expected shape.
    Decode,
    /// Local file could not be read for upload.
    Io,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_message() {
        let err = TransportError::status(502, "Upload failed: 502 Bad Gateway");
        assert_eq!(err.to_string(), "Upload failed: 502 Bad Gateway");
        assert_eq!(err.kind, TransportErrorKind::Status(502));
    }
}
