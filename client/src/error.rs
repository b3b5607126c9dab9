//! Error types for the content API client

use thiserror::Error;

/// Errors that can occur when talking to the content API or the email relay
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never got an HTTP response (DNS, refused connection, timeout)
    #[error("API unreachable: {0}")]
    Unreachable(String),

    /// The API answered 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// The API answered with another non-success status
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Response body did not match the expected shape
    #[error("Response parsing failed: {0}")]
    Decode(String),

    /// Base URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether the failure happened before any response was received
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Whether the API is down rather than the record missing
    ///
    /// True when no response arrived, when the server failed (5xx), or when
    /// the body could not be read. Callers fall back to degraded data in
    /// these cases only.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Decode(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// HTTP status carried by the error, if any
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}
