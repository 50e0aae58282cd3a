//! Error types for the configuration query engine.

use thiserror::Error;

/// Protocol error-tag vocabulary shared with the session layer and the
/// edit collaborator. The wire string is what ends up in an rpc-error
/// element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorTag {
    InUse,
    InvalidValue,
    MissingElement,
    BadElement,
    UnknownElement,
    UnknownNamespace,
    DataExists,
    DataMissing,
    OperationNotSupported,
    OperationFailed,
    MalformedMessage,
}

impl ErrorTag {
    /// The machine-readable tag string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTag::InUse => "in-use",
            ErrorTag::InvalidValue => "invalid-value",
            ErrorTag::MissingElement => "missing-element",
            ErrorTag::BadElement => "bad-element",
            ErrorTag::UnknownElement => "unknown-element",
            ErrorTag::UnknownNamespace => "unknown-namespace",
            ErrorTag::DataExists => "data-exists",
            ErrorTag::DataMissing => "data-missing",
            ErrorTag::OperationNotSupported => "operation-not-supported",
            ErrorTag::OperationFailed => "operation-failed",
            ErrorTag::MalformedMessage => "malformed-message",
        }
    }

    /// Fallback human-readable message for the tag.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorTag::InUse => "Resource is already in use",
            ErrorTag::InvalidValue => "Unacceptable value for one or more parameters",
            ErrorTag::MissingElement => "An expected element is missing",
            ErrorTag::BadElement => "An element value is not correct",
            ErrorTag::UnknownElement => "An unexpected element is present",
            ErrorTag::UnknownNamespace => "An unexpected namespace is present",
            ErrorTag::DataExists => "Requested data model content already exists",
            ErrorTag::DataMissing => "Requested data model content does not exist",
            ErrorTag::OperationNotSupported => {
                "Requested operation is not supported by this implementation"
            }
            ErrorTag::OperationFailed => "Requested operation failed due to some reason",
            ErrorTag::MalformedMessage => "Failed to parse message",
        }
    }
}

impl std::fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Datastore-level errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Errors raised while forwarding a query branch to a remote store.
///
/// These are recovered locally (the branch renders empty) and never
/// fail the enclosing query.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Remote {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Remote {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Remote {endpoint} returned a bad response: {reason}")]
    BadResponse { endpoint: String, reason: String },
}

/// Request-fatal query errors, each carrying a protocol error-tag.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Datastore \"{0}\" not supported")]
    UnsupportedDatastore(String),

    #[error("No support for with-defaults query type \"{0}\"")]
    UnsupportedMode(String),

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Map the error to its protocol error-tag.
    pub fn tag(&self) -> ErrorTag {
        match self {
            QueryError::UnsupportedDatastore(_) => ErrorTag::OperationNotSupported,
            QueryError::UnsupportedMode(_) => ErrorTag::OperationNotSupported,
            QueryError::MalformedFilter(_) => ErrorTag::MalformedMessage,
            QueryError::Store(_) => ErrorTag::OperationFailed,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
