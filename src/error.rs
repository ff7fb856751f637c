//! Error types and handling infrastructure for zsift.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! custom error types. The binary layers `anyhow` on top for top-level context.
//!
//! ## Error Taxonomy
//!
//! - **Traversal**: a path could not be stat-ed or listed
//! - **Decode**: a container header or compressed stream is malformed
//! - **Engine**: the external search engine could not be run or timed out
//! - **Rotation**: a stale log could not be compressed or removed
//!
//! Only errors on the root directory and invalid configuration abort a run; everything
//! else is attributed to the file or archive member that caused it.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for zsift operations.
#[derive(Error, Debug)]
pub enum ZsiftError {
    /// File system related errors without a more specific category
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// A path could not be stat-ed, opened or listed during a walk
    #[error("Cannot access {}: {source}", path.display())]
    Traversal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad compression header or truncated stream
    #[error("Failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Zip archive structure could not be read
    #[error("Failed to read archive {name}: {source}")]
    Archive {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// The search engine process could not be started or driven
    #[error("Search engine failure: {message}")]
    Engine {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// The search engine exceeded its execution bound and was killed
    #[error("Search engine timed out after {after:?} on {target}")]
    EngineTimeout { target: String, after: Duration },

    /// A stale log could not be rotated
    #[error("Failed to rotate {}: {message}", path.display())]
    Rotation {
        path: PathBuf,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Invalid command line arguments
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Generic error for cases not covered by specific variants
    #[error("Operation failed: {message}")]
    Other { message: String },
}

/// Standard Result type for zsift operations.
pub type Result<T> = std::result::Result<T, ZsiftError>;

impl ZsiftError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Create a Traversal error for a path that could not be visited
    pub fn traversal(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Traversal {
            path: path.into(),
            source,
        }
    }

    /// Create a Decode error attributed to a file or archive member
    pub fn decode(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Decode {
            name: name.into(),
            source,
        }
    }

    /// Create an Archive error from a zip failure
    pub fn archive(name: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            name: name.into(),
            source,
        }
    }

    /// Create an Engine error with a descriptive message
    pub fn engine(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Engine {
            message: message.into(),
            source,
        }
    }

    /// Create a Rotation error for a log file
    pub fn rotation(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Rotation {
            path: path.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a generic Other error with a descriptive message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Whether this error means the content itself was unreadable (as opposed to the engine)
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Archive { .. })
    }
}

// Automatic conversion from io::Error to ZsiftError
impl From<std::io::Error> for ZsiftError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}
