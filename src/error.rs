//! Error types for systemsp.
//!
//! Every failure path is typed with thiserror so callers can match on the
//! exact condition. The layering follows the error taxonomy of the emitter:
//! a [`ConfigError`] aborts a whole configuration import, a
//! [`DescriptorError`] only skips one datapoint, a [`NotificationError`]
//! rejects one inbound notification and a [`RenderError`] drops a reading.

use thiserror::Error;

/// Errors that abort a whole configuration import.
///
/// After any of these the registry is left empty.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Parsing error in data exchange configuration: {message}")]
    Parse {
        message: String,
    },

    #[error("Root element is not an object")]
    RootNotObject,

    #[error("'{section}' not found in {parent} or is not {expected}")]
    MissingSection {
        section: &'static str,
        parent: &'static str,
        expected: &'static str,
    },

    #[error("Invalid plugin category: {reason}")]
    InvalidCategory {
        reason: String,
    },

    #[error("Failed to read configuration file '{path}': {message}")]
    Io {
        path: String,
        message: String,
    },
}

/// Errors that cause a single datapoint descriptor to be skipped.
#[allow(missing_docs)]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("datapoint is not an object")]
    NotAnObject,

    #[error("{field} not found in datapoint or is not a string")]
    MissingField {
        field: &'static str,
    },

    #[error("Configuration access on {label}, but no {field} found")]
    MissingCycle {
        label: String,
        field: &'static str,
    },

    #[error("Configuration access on {label}, but {field} must be a positive integer (got {value})")]
    InvalidCycle {
        label: String,
        field: &'static str,
        value: i64,
    },
}

/// Errors raised while interpreting an inbound notification.
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Invalid JSON: {message}")]
    Parse {
        message: String,
    },

    #[error("Received notification with no '{field}' attribute or of unknown type")]
    MissingField {
        field: &'static str,
    },

    #[error("Received notification with unhandled 'reason' value: {reason}")]
    UnhandledReason {
        reason: String,
    },
}

/// Errors raised while rendering a reading from its template.
#[allow(missing_docs)]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Invalid data type: {policy}")]
    UnknownPolicy {
        policy: String,
    },

    #[error("Invalid pivot type: {pivot_type}, message not sent")]
    UnsupportedPivotType {
        pivot_type: String,
    },
}

/// Top-level error type for systemsp.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SystemSpError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Datapoint error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SystemSpError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error aborted a configuration import.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this error only skipped one datapoint.
    #[must_use]
    pub const fn is_descriptor(&self) -> bool {
        matches!(self, Self::Descriptor(_))
    }

    /// Returns true if this error rejected a notification.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        matches!(self, Self::Notification(_))
    }

    /// Returns true if this error dropped a reading at render time.
    #[must_use]
    pub const fn is_render(&self) -> bool {
        matches!(self, Self::Render(_))
    }
}

/// Result type alias for systemsp operations.
pub type SpResult<T> = Result<T, SystemSpError>;
