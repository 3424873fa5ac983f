//! Error taxonomy shared by every Cosmo crate.
//!
//! Library code returns [`CosmoError`]; the MCP executor converts it into a
//! uniform tool error at the outermost boundary so nothing crosses into the
//! transport as a panic.

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type CosmoResult<T> = Result<T, CosmoError>;

/// Errors raised by configuration, registry, policy, analysis and backends.
#[derive(Debug, Error)]
pub enum CosmoError {
    /// A configuration source was malformed or unreadable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Missing or invalid fields on a registration or a write payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// A connection id that was never registered.
    #[error("connection '{id}' not found. Available connections: {}", list_or_none(.known))]
    ConnectionNotFound { id: String, known: Vec<String> },

    /// An unknown container, document or other backend resource.
    #[error("{0}")]
    NotFound(String),

    /// A registered connection that has no live handle.
    #[error("connection '{id}' is not active. Active connections: {}", list_or_none(.active))]
    NotActive { id: String, active: Vec<String> },

    /// No connection id was given and no default is registered.
    #[error("no connection id given and no default connection is configured")]
    NoDefault,

    /// A write was blocked by the modification policy.
    #[error(
        "modifications are disabled for connection '{connection_id}': operation '{operation}' is not allowed. \
         Set allowModifications=true on the connection or COSMOS_ALLOW_MODIFICATIONS=true"
    )]
    ModificationsDisabled {
        connection_id: String,
        operation: String,
    },

    /// The container lacks structure a request depends on (e.g. a partition key).
    #[error("schema error: {0}")]
    Schema(String),

    /// The underlying driver failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl CosmoError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a not-found error for a resource.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Map a backend failure on a container, turning a 404 into a
    /// not-found error that names the container.
    pub fn container(container_id: &str, err: BackendError) -> Self {
        if err.is_not_found() {
            Self::not_found(format!("container '{}' not found", container_id))
        } else {
            Self::Backend(err)
        }
    }

    /// Short machine-readable code, used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::ConnectionNotFound { .. } | Self::NotFound(_) => "NOT_FOUND",
            Self::NotActive { .. } => "NOT_ACTIVE",
            Self::NoDefault => "NO_DEFAULT",
            Self::ModificationsDisabled { .. } => "MODIFICATIONS_DISABLED",
            Self::Schema(_) => "SCHEMA_ERROR",
            Self::Backend(_) => "BACKEND_ERROR",
        }
    }
}

fn list_or_none(ids: &[String]) -> String {
    if ids.is_empty() {
        "(none)".to_string()
    } else {
        ids.join(", ")
    }
}

/// Failure reported by a backend driver.
///
/// The status is the HTTP status code when the driver speaks HTTP; it is
/// only inspected for a handful of well-known cases (409 on create, 404 on
/// update/delete) to produce friendlier messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub status: Option<u16>,
    pub message: String,
}

impl BackendError {
    /// Create an error without a status code (connectivity, decoding, ...).
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    /// Create an error carrying a status code.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status == Some(409)
    }

    pub fn is_throttled(&self) -> bool {
        self.status == Some(429)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "backend error ({}): {}", status, self.message),
            None => write!(f, "backend error: {}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}
