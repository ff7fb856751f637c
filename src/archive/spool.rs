//! Materializing one-shot content streams as path-addressable temp files.

use crate::archive::expander::ContentUnit;
use crate::error::{Result, ZsiftError};
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};

/// A content unit written out to a uniquely named temporary file.
///
/// The file is removed when this value is dropped, on every exit path.
#[derive(Debug)]
pub struct SpooledUnit {
    display_name: String,
    file: NamedTempFile,
    len: u64,
}

impl SpooledUnit {
    /// Drain `unit` into a fresh temp file under `dir`.
    ///
    /// Decode failures surface here, before any search is attempted.
    pub async fn spool(unit: ContentUnit, dir: &Path) -> Result<Self> {
        let (display_name, mut stream, _backing) = unit.into_parts();

        let file = tempfile::Builder::new()
            .prefix("zsift-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(|e| ZsiftError::file_error("Failed to create spool file", e))?;

        let handle = file
            .as_file()
            .try_clone()
            .map_err(|e| ZsiftError::file_error("Failed to open spool file for writing", e))?;
        let mut writer = BufWriter::new(tokio::fs::File::from_std(handle));

        let len = tokio::io::copy(&mut stream, &mut writer)
            .await
            .map_err(|e| ZsiftError::decode(display_name.clone(), e))?;

        writer
            .flush()
            .await
            .map_err(|e| ZsiftError::file_error("Failed to flush spool file", e))?;

        Ok(Self {
            display_name,
            file,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Number of decompressed bytes written
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_spool_writes_content_and_removes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let unit = ContentUnit::new(
            "member.txt",
            Some(dir.path().join("data.zip")),
            Box::new(Cursor::new(b"needle in a haystack\n".to_vec())),
        );

        let spooled = SpooledUnit::spool(unit, dir.path()).await.unwrap();
        let path = spooled.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"needle in a haystack\n");
        assert_eq!(spooled.len(), 21);
        assert!(spooled.display_name().ends_with("data.zip:member.txt"));

        drop(spooled);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_spool_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let first = ContentUnit::new("a", None, Box::new(Cursor::new(Vec::new())));
        let second = ContentUnit::new("a", None, Box::new(Cursor::new(Vec::new())));

        let first = SpooledUnit::spool(first, dir.path()).await.unwrap();
        let second = SpooledUnit::spool(second, dir.path()).await.unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.is_empty());
    }

    #[tokio::test]
    async fn test_decode_failure_leaves_no_spool_file() {
        let dir = tempfile::tempdir().unwrap();
        // Gzip magic followed by garbage
        let broken = vec![0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad, 0xbe, 0xef];
        let decoder = async_compression::tokio::bufread::GzipDecoder::new(
            tokio::io::BufReader::new(Cursor::new(broken)),
        );
        let unit = ContentUnit::new("broken.gz", None, Box::new(decoder));

        let err = SpooledUnit::spool(unit, dir.path()).await.unwrap_err();
        assert!(err.is_decode());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
