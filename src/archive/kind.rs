//! Suffix-driven file classification.
//!
//! Classification is a pure function of the path's name; content is never inspected here.

use std::path::{Path, PathBuf};

/// Closed set of file kinds the walker routes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Searched directly by path
    Plain,
    /// Gzip stream (.gz files)
    Gzip,
    /// Zip archive, searched member by member (.zip files)
    Zip,
    /// Zstandard stream (.zstd files)
    Zstd,
    /// Gzip-compressed tarball (.tgz files); decoded as a single gzip stream
    TarGzip,
    /// Never searched; the walker skips it with a diagnostic. Name classification alone
    /// does not produce it, since every unknown suffix is plain text to the engine.
    Unsupported,
}

/// Suffix table, checked in order. Matching is case-sensitive; anything else is plain.
const SUFFIXES: &[(&str, FileKind)] = &[
    (".gz", FileKind::Gzip),
    (".tgz", FileKind::TarGzip),
    (".zip", FileKind::Zip),
    (".zstd", FileKind::Zstd),
];

impl FileKind {
    /// Classify a path by its suffix
    pub fn classify(path: &Path) -> Self {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return Self::Plain,
        };

        SUFFIXES
            .iter()
            .find(|(suffix, _)| name.ends_with(*suffix))
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Plain)
    }

    /// Get human-readable name for the kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Gzip => "gzip",
            Self::Zip => "zip",
            Self::Zstd => "zstd",
            Self::TarGzip => "tar+gzip",
            Self::Unsupported => "unsupported",
        }
    }

    /// Check if this kind goes through the archive expander
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Gzip | Self::Zip | Self::Zstd | Self::TarGzip)
    }
}

/// A path found during the walk together with its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub is_regular: bool,
    pub kind: FileKind,
}

impl FileCandidate {
    pub fn new(path: impl Into<PathBuf>, is_regular: bool) -> Self {
        let path = path.into();
        let kind = FileKind::classify(&path);
        Self {
            path,
            is_regular,
            kind,
        }
    }

    /// Display name used in diagnostics and headers
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }
}
