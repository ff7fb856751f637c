//! # zsift - Archive-Aware Recursive Search
//!
//! Walks a directory tree and hands every file to an external search engine, looking inside
//! gzip, zip, zstd and tar-gzip containers on the way. After the search, log files older than
//! the retention window are compressed with zstd and the originals removed.
//!
//! ## Architecture
//!
//! - [`archive`] - Suffix classification and transparent decoding into content units
//! - [`search`] - Search engine capability, subprocess and fake engines, dispatch and reports
//! - [`walker`] - Directory traversal and the primary search pass
//! - [`rotate`] - Stale log compression
//! - [`config`] - Run configuration with documented defaults
//! - [`app`] - Orchestration of both passes
//! - [`error`] - Centralized error types

pub mod app;
pub mod archive;
pub mod cancel;
pub mod config;
pub mod error;
pub mod rotate;
pub mod search;
pub mod walker;

// Re-export commonly used types for convenience
pub use error::{Result, ZsiftError};

// Public API surface for external usage
pub use app::{Application, RunSummary, SearchRequest};
pub use archive::{ArchiveExpander, ContentUnit, FileCandidate, FileKind};
pub use cancel::CancellationToken;
pub use config::{Config, SpoolMode};
pub use rotate::{LogRotator, RotationSummary};
pub use search::{ExitClass, FakeEngine, ProcessEngine, SearchDispatcher, SearchEngine};
pub use walker::{DirectoryWalker, WalkSummary};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
