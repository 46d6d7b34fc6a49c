//! Error types for the registry client

use std::fmt;
use thiserror::Error;

/// Registry client error type
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid client parameters, detected when the client is built
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input rejected locally, before any request was issued
    #[error("Invalid {field}: {rule}")]
    Validation {
        /// Name of the offending field
        field: &'static str,
        /// Rule the field violated
        rule: Rule,
    },

    /// Input rejected by the registry (status 400)
    #[error("{0}")]
    BadRequest(String),

    /// Shared secret missing or rejected (status 401)
    #[error("Unauthorized")]
    Authentication,

    /// Service or node does not exist (status 404)
    #[error("Not Found")]
    NotFound,

    /// Registry failed internally (status 500)
    #[error("Internal Server Error")]
    Internal,

    /// Capability not implemented by the registry (status 501)
    #[error("Not Implemented")]
    NotImplemented,

    /// Connection failure, deadline exceeded or unreadable response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Status code outside the known set
    #[error("Unexpected response status: {status}")]
    UnexpectedResponse {
        /// Raw status code returned by the registry
        status: u16,
    },

    /// I/O error while loading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error while loading configuration
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Validation rule a field failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Value must be present and non-empty
    Required,
    /// Value must be one of a fixed set
    OneOf(&'static [&'static str]),
    /// Value must be an IPv4 or IPv6 literal
    IpAddress,
    /// Value must be a port in `1..=65535`
    PortRange,
    /// Value must be syntactically valid JSON
    Json,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "value is required"),
            Rule::OneOf(allowed) => write!(f, "must be one of {}", allowed.join(", ")),
            Rule::IpAddress => write!(f, "not a valid IP address"),
            Rule::PortRange => write!(f, "port must be between 1 and 65535"),
            Rule::Json => write!(f, "not valid JSON"),
        }
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid client parameters
    Configuration,
    /// Bad input, local or reported by the registry
    Validation,
    /// Shared secret rejected
    Authentication,
    /// Target absent
    NotFound,
    /// Registry failure or missing capability
    Server,
    /// Request never produced a classifiable response
    Transport,
    /// Status code outside the known set
    UnexpectedResponse,
}

impl Error {
    /// Create a validation error
    pub fn validation(field: &'static str, rule: Rule) -> Self {
        Self::Validation { field, rule }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl fmt::Display) -> Self {
        Self::Transport(message.to_string())
    }

    /// HTTP-equivalent status code, for callers that branch on status.
    ///
    /// Transport failures report 503 (unavailable).
    pub fn status(&self) -> u16 {
        match self {
            Error::Validation { .. } | Error::BadRequest(_) => 400,
            Error::Authentication => 401,
            Error::NotFound => 404,
            Error::Internal => 500,
            Error::NotImplemented => 501,
            Error::Transport(_) => 503,
            Error::UnexpectedResponse { status } => *status,
            Error::Configuration(_) | Error::Io(_) | Error::Json(_) | Error::Yaml(_) => 500,
        }
    }

    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration(_) | Error::Io(_) | Error::Json(_) | Error::Yaml(_) => {
                ErrorKind::Configuration
            }
            Error::Validation { .. } | Error::BadRequest(_) => ErrorKind::Validation,
            Error::Authentication => ErrorKind::Authentication,
            Error::NotFound => ErrorKind::NotFound,
            Error::Internal | Error::NotImplemented => ErrorKind::Server,
            Error::Transport(_) => ErrorKind::Transport,
            Error::UnexpectedResponse { .. } => ErrorKind::UnexpectedResponse,
        }
    }
}
