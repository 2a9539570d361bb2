//! Error Types
//!
//! Komposer separates three kinds of failure:
//!
//! - Configuration errors (a missing child component, a missing store, a
//!   data source of the wrong shape). These are returned synchronously from
//!   composition or construction.
//! - Data errors. These are legitimate failures of the data source, carried
//!   as a [`LoadError`] through the result callback and rendered by the
//!   configured error handler.
//! - Protocol violations (a malformed error payload, a callback delivered
//!   after unmount). These point at a bug in a loader or adapter and are
//!   always returned as [`ComposeError::InvariantViolation`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// An error delivered by a data source through the result callback.
///
/// Errors are compared by identity when deciding whether a pure container
/// must re-render, so they are shared behind an `Arc`.
pub type LoadError = Arc<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ComposeError>;

/// Errors raised by the composer, its containers and adapters.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// A required argument was missing or unusable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A data source produced a value of the wrong shape.
    #[error("invalid return type: {0}")]
    InvalidReturnType(String),

    /// The store adapter could not locate its store.
    #[error("no store found under `{0}`")]
    StoreNotFound(String),

    /// A loader or adapter broke the callback protocol.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A data error reached a container that has no error handler.
    #[error("unhandled data error in {container}: {source}")]
    Unhandled {
        /// Display name of the container that rendered the error.
        container: String,
        /// The error delivered by the data source.
        #[source]
        source: LoadError,
    },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl ComposeError {
    /// Wrap this error so it can be delivered through a result callback.
    pub fn into_load_error(self) -> LoadError {
        Arc::new(self)
    }
}

/// A plain message error for data sources that have no error type of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataError {
    message: String,
}

impl DataError {
    /// Create a new data error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Create a data error already wrapped as a [`LoadError`].
    pub fn shared(message: impl Into<String>) -> LoadError {
        Arc::new(Self::new(message))
    }

    /// The error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for DataError {}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
