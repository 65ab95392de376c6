//! Error types for the resource layer.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Result type for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One field-level problem reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    /// Error constant the server used (e.g. `USERNAME_ALREADY_EXISTS`).
    pub code: String,
    pub field: Option<String>,
    pub message: Option<String>,
}

/// Error types for the resource layer.
///
/// Every network-path operation returns `Result<T>`. The type is `Clone` because
/// collapsed requests hand the identical outcome to every waiter.
#[derive(Debug, Clone)]
pub enum Error {
    /// The transport failed before any response arrived.
    ///
    /// Common causes:
    /// - Connection refused or reset
    /// - DNS failure
    /// - Timeout inside the transport
    Network(String),

    /// The server answered with a non-2xx status.
    ///
    /// Unrecognised shapes are meant for the application's generic error
    /// handler; the core never swallows them.
    Server { status: u16, body: Value },

    /// A `Server` error whose body lists field problems with codes from
    /// `ClientConfig::validation_codes`.
    Validation {
        status: u16,
        problems: Vec<FieldProblem>,
        body: Value,
    },

    /// A declared identifier (or the id of a detail operation) was not supplied.
    ///
    /// Programmer error: raised before any request is issued.
    MissingIdentifier { resource: String, identifier: String },

    /// `define_resource` was called twice with the same name.
    DuplicateResource(String),

    /// No resource with this name has been defined.
    UnknownResource(String),

    /// The resource has no operation with this name.
    UnknownOperation { resource: String, operation: String },

    /// The response body did not have the shape the operation needs.
    ///
    /// Common causes:
    /// - Detail endpoint returned a non-object
    /// - Entity payload without the resource's id key
    MalformedResponse(String),

    /// `CacheStrategy::Fresh` found nothing cached.
    CacheMiss,

    /// Invalid configuration or resource definition.
    ConfigError(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Classify a non-2xx response.
    ///
    /// Bodies shaped as `[{ "id": CODE, "metadata": { "field": .., "message": .. } }]`
    /// where at least one `CODE` is in `codes` become [`Error::Validation`].
    pub fn from_response(status: u16, body: Value, codes: &BTreeSet<String>) -> Self {
        let problems: Vec<FieldProblem> = body
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let code = item.get("id")?.as_str()?;
                        if !codes.contains(code) {
                            return None;
                        }
                        let metadata = item.get("metadata");
                        let text = |name: &str| {
                            metadata
                                .and_then(|m| m.get(name))
                                .and_then(Value::as_str)
                                .map(str::to_string)
                        };
                        Some(FieldProblem {
                            code: code.to_string(),
                            field: text("field"),
                            message: text("message"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if problems.is_empty() {
            Error::Server { status, body }
        } else {
            Error::Validation {
                status,
                problems,
                body,
            }
        }
    }

    /// HTTP status carried by server-side errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } | Error::Validation { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for errors that indicate a programming mistake rather than a runtime condition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingIdentifier { .. }
                | Error::DuplicateResource(_)
                | Error::UnknownResource(_)
                | Error::UnknownOperation { .. }
                | Error::ConfigError(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Server { status, body } => write!(f, "Server error {}: {}", status, body),
            Error::Validation {
                status, problems, ..
            } => {
                let codes: Vec<&str> = problems.iter().map(|p| p.code.as_str()).collect();
                write!(f, "Validation error {}: {}", status, codes.join(", "))
            }
            Error::MissingIdentifier {
                resource,
                identifier,
            } => write!(f, "Missing identifier `{}` for {}", identifier, resource),
            Error::DuplicateResource(name) => write!(f, "Resource already defined: {}", name),
            Error::UnknownResource(name) => write!(f, "Unknown resource: {}", name),
            Error::UnknownOperation {
                resource,
                operation,
            } => write!(f, "Unknown operation `{}` on {}", operation, resource),
            Error::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            Error::CacheMiss => write!(f, "Cache miss"),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedResponse(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
