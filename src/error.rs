// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for cspinject
//!
//! Most failures inside a page request are local: a script that cannot be
//! fetched is skipped, a malformed policy clause is dropped. Only
//! configuration errors are meant to reach the caller, and they surface
//! before any page is processed.

use thiserror::Error;

/// Result type alias for cspinject operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for cspinject
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// HTML parsing or serialization failed
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// Selector parsing error
    #[error("Invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },

    /// A script resource could not be fetched
    #[error("Failed to fetch {url}{}", .status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    ResourceFetch { url: String, status: Option<u16> },

    /// Inline method names a digest we cannot compute
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedDigestAlgorithm(String),

    /// Policy clause could not be interpreted
    #[error("Malformed policy clause: {0}")]
    MalformedPolicy(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout { operation: String, duration_ms: u64 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a fetch failure for a URL
    pub fn fetch(url: impl Into<String>, status: Option<u16>) -> Self {
        Error::ResourceFetch {
            url: url.into(),
            status,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create an HTML error
    pub fn html<S: Into<String>>(msg: S) -> Self {
        Error::HtmlParse(msg.into())
    }

    /// Create a selector error
    pub fn selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Selector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Check if this error means a resource branch should be skipped
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::ResourceFetch { .. } | Error::Http(_))
    }

    /// Check if this error was raised while validating configuration
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::UnsupportedDigestAlgorithm(_)
        )
    }

    /// Get HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::ResourceFetch { status, .. } => *status,
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::ResourceFetch { url, .. } => Some(url),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add operation context to error
    fn context(self, msg: &str) -> Result<T>;
}

impl<T, E: Into<Error>> ErrorContext<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            match err {
                // Keep the variant so callers can still classify it
                Error::Config(inner) => Error::Config(format!("{}: {}", msg, inner)),
                keep @ (Error::UnsupportedDigestAlgorithm(_) | Error::ResourceFetch { .. }) => keep,
                other => Error::Other(format!("{}: {}", msg, other)),
            }
        })
    }
}
