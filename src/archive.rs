//! Container classification and transparent decoding.
//!
//! A file's kind is decided from its name alone ([`FileKind::classify`]). Compressed kinds are
//! opened by [`ArchiveExpander`], which yields one [`ContentUnit`] per logical byte sequence:
//! the whole decompressed file for gzip and zstd, one unit per member for zip.

pub mod expander;
pub mod kind;
pub mod spool;

pub use expander::{ArchiveExpander, ContentUnit, ContentUnits};
pub use kind::{FileCandidate, FileKind};
pub use spool::SpooledUnit;
