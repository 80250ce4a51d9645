//! Error types for the agent bot

use std::fmt;

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Where in the login handshake a session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    NoSession,
    TicketRequested,
    Signed,
    LoggedIn,
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthStage::NoSession => "no-session",
            AuthStage::TicketRequested => "ticket-requested",
            AuthStage::Signed => "signed",
            AuthStage::LoggedIn => "logged-in",
        };
        f.write_str(name)
    }
}

/// Main error type for the agent bot
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    #[error("Auth rejected at {stage}: {message}")]
    Auth { stage: AuthStage, message: String },

    #[error("Signing failed: {0}")]
    Signing(String),

    // Network errors
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Rate limited (status {status}): {detail}")]
    RateLimit { status: u16, detail: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Short category used as the log prefix for this error
    pub fn category(&self) -> &'static str {
        match self {
            Error::Auth { .. } => "auth",
            Error::Signing(_) => "signing",
            Error::Timeout(_) => "timeout",
            Error::RateLimit { .. } => "rate-limit",
            Error::Transport(_) | Error::UnexpectedStatus { .. } => "transport",
            Error::Config(_) | Error::InvalidProxy(_) => "config",
            Error::Serialization(_) | Error::Io(_) | Error::Anyhow(_) => "internal",
        }
    }

    /// Check if the remote side asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Check if this error is transient at the connection level
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Transport(_))
    }
}

impl Error {
    /// Map a reqwest failure, keeping timeouts distinct from other transport errors
    pub fn from_reqwest(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            Error::Timeout(timeout_ms)
        } else if e.is_decode() {
            Error::Serialization(e.to_string())
        } else {
            Error::Transport(e.to_string())
        }
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        let auth = Error::Auth {
            stage: AuthStage::TicketRequested,
            message: "nope".to_string(),
        };
        assert_eq!(auth.category(), "auth");
        assert_eq!(Error::Timeout(60000).category(), "timeout");
        assert_eq!(
            Error::UnexpectedStatus {
                status: 500,
                body: String::new()
            }
            .category(),
            "transport"
        );
    }

    #[test]
    fn test_rate_limit_is_not_transport_retryable() {
        let err = Error::RateLimit {
            status: 429,
            detail: "Rate limit exceeded".to_string(),
        };
        assert!(err.is_rate_limited());
        assert!(!err.is_retryable());
        assert!(Error::Transport("reset".to_string()).is_retryable());
        assert!(!Error::Signing("bad key".to_string()).is_retryable());
    }

    #[test]
    fn test_auth_stage_display() {
        let err = Error::Auth {
            stage: AuthStage::Signed,
            message: "login rejected".to_string(),
        };
        assert_eq!(err.to_string(), "Auth rejected at signed: login rejected");
    }
}
