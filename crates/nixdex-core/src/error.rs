//! Error types for nixdex.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for nixdex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building and publishing catalog indexes.
///
/// Variants fall into three families:
/// - transient failures of external collaborators (`Io`, `Http`, `Command`),
///   the only ones [`Error::is_retryable`] reports as retryable;
/// - schema violations (`UnsupportedFieldType`, `UnsupportedValueType`,
///   `SchemaViolation`), which abort the run;
/// - everything else (`Store`, `Config`, `NotFound`, ...), which is fatal but
///   not a data problem.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// I/O error, optionally tied to a path.
    #[error("I/O error{}: {source}", path_suffix(.path))]
    Io {
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path involved, if any
        path: Option<PathBuf>,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request to an external collaborator failed.
    #[error("HTTP error: {message}")]
    Http {
        /// What failed
        message: String,
        /// Response status, when one was received
        status: Option<u16>,
    },

    /// External command (evaluator, converter) failed.
    #[error("Command `{program}` failed: {message}")]
    Command {
        /// Program that was run
        program: String,
        /// Exit status or spawn failure
        message: String,
    },

    /// Field reversal received a value it cannot reverse.
    #[error("Don't know how to reverse {0}")]
    UnsupportedFieldType(String),

    /// Pretty-printing received a value it cannot render.
    #[error("Don't know how to pretty-print {0}")]
    UnsupportedValueType(String),

    /// A raw catalog record no longer matches the expected shape.
    #[error("Schema violation in `{field}`: {message}")]
    SchemaViolation {
        /// Catalog field that was malformed
        field: String,
        /// What was found
        message: String,
    },

    /// The index store rejected an operation.
    #[error("Index store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// A named resource does not exist.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Resource name
        name: String,
        /// Resource kind (channel, evaluation, index, ...)
        kind: String,
    },

    /// Generic operation failure.
    #[error("{0}")]
    Operation(String),
}

impl Error {
    /// Returns whether this error is retryable.
    ///
    /// Only failures of external collaborators are transient. The
    /// tokenization, normalization and index-lifecycle code never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Io { source, .. } => !matches!(
                source.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidData
            ),
            Error::Http { status, .. } => match status {
                Some(code) => *code == 429 || *code >= 500,
                None => true,
            },
            Error::Command { .. } => true,
            Error::Serialization(_) => false,
            Error::UnsupportedFieldType(_) => false,
            Error::UnsupportedValueType(_) => false,
            Error::SchemaViolation { .. } => false,
            Error::Store(_) => false,
            Error::Config { .. } => false,
            Error::NotFound { .. } => false,
            Error::Operation(_) => false,
        }
    }

    /// Returns whether this error means the raw catalog changed shape.
    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedFieldType(_)
                | Error::UnsupportedValueType(_)
                | Error::SchemaViolation { .. }
        )
    }

    /// Creates an I/O error tied to a path.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::Io {
            source,
            path: Some(path.as_ref().to_path_buf()),
        }
    }

    /// Creates an HTTP error.
    pub fn http<S: Into<String>>(message: S, status: Option<u16>) -> Self {
        Error::Http {
            message: message.into(),
            status,
        }
    }

    /// Creates a command failure.
    pub fn command<P, M>(program: P, message: M) -> Self
    where
        P: Into<String>,
        M: Into<String>,
    {
        Error::Command {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Creates a schema violation for a catalog field.
    pub fn schema_violation<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::SchemaViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an index store error.
    pub fn store<S: Into<String>>(message: S) -> Self {
        Error::Store(message.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found<N, K>(name: N, kind: K) -> Self
    where
        N: Into<String>,
        K: Into<String>,
    {
        Error::NotFound {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Creates a generic operation error.
    pub fn operation<S: Into<String>>(message: S) -> Self {
        Error::Operation(message.into())
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" at {}", p.display()))
        .unwrap_or_default()
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source, path: None }
    }
}
