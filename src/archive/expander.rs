//! Transparent decompression of containers into searchable content units.
//!
//! Gzip and zstd files are decoded lazily with `async-compression`; nothing is read until the
//! unit's stream is consumed. Zip archives are read with the `zip` crate on the blocking pool,
//! one member at a time, in member-table order.

use crate::archive::kind::{FileCandidate, FileKind};
use crate::error::{Result, ZsiftError};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Gzip magic number (RFC 1952)
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
/// Zstd frame magic number
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Single-pass byte source handed to the search engine
pub type UnitStream = Box<dyn AsyncRead + Unpin + Send>;

/// One logical byte sequence to be searched: a whole decompressed file or one archive member.
///
/// The stream can be consumed once. Dropping the unit releases the stream and any temporary
/// file backing it.
pub struct ContentUnit {
    logical_name: String,
    source_archive: Option<PathBuf>,
    stream: UnitStream,
    /// Keeps a spilled zip member alive until the stream is dropped
    _backing: Option<NamedTempFile>,
}

impl ContentUnit {
    pub fn new(
        logical_name: impl Into<String>,
        source_archive: Option<PathBuf>,
        stream: UnitStream,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            source_archive,
            stream,
            _backing: None,
        }
    }

    fn with_backing(mut self, backing: NamedTempFile) -> Self {
        self._backing = Some(backing);
        self
    }

    /// Path for whole-file units, member name for archive members
    pub fn logical_name(&self) -> &str {
        &self.logical_name
    }

    pub fn source_archive(&self) -> Option<&Path> {
        self.source_archive.as_deref()
    }

    /// Name used in headers and diagnostics.
    ///
    /// Archive members are shown as `archive:member`; whole-file units by their path.
    pub fn display_name(&self) -> String {
        match &self.source_archive {
            Some(archive) if archive.as_os_str() != self.logical_name.as_str() => {
                format!("{}:{}", archive.display(), self.logical_name)
            }
            _ => self.logical_name.clone(),
        }
    }

    /// Split into the display name and the stream for a single consumer
    pub fn into_parts(self) -> (String, UnitStream, Option<NamedTempFile>) {
        let name = self.display_name();
        (name, self.stream, self._backing)
    }
}

impl std::fmt::Debug for ContentUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentUnit")
            .field("logical_name", &self.logical_name)
            .field("source_archive", &self.source_archive)
            .finish_non_exhaustive()
    }
}

/// Lazy, finite sequence of units produced from one container
pub struct ContentUnits {
    inner: UnitsInner,
}

enum UnitsInner {
    Single(Option<ContentUnit>),
    Zip(ZipMembers),
}

impl std::fmt::Debug for ContentUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentUnits").finish_non_exhaustive()
    }
}

impl ContentUnits {
    /// Produce the next unit, or `None` when the container is exhausted.
    ///
    /// An `Err` is attributed to a single member; callers may keep iterating.
    pub async fn next_unit(&mut self) -> Option<Result<ContentUnit>> {
        match &mut self.inner {
            UnitsInner::Single(unit) => unit.take().map(Ok),
            UnitsInner::Zip(members) => members.next_member().await,
        }
    }
}

/// Opens compressed candidates and yields their content units
#[derive(Debug, Clone)]
pub struct ArchiveExpander {
    /// Zip members at least this large are spilled to a temp file instead of memory
    memory_threshold: u64,
    spill_dir: PathBuf,
}

impl ArchiveExpander {
    pub fn new(memory_threshold: u64, spill_dir: impl Into<PathBuf>) -> Self {
        Self {
            memory_threshold,
            spill_dir: spill_dir.into(),
        }
    }

    /// Open a compressed candidate.
    ///
    /// Fails without producing any unit when the container header is malformed.
    pub async fn open(&self, candidate: &FileCandidate) -> Result<ContentUnits> {
        let inner = match candidate.kind {
            FileKind::Gzip | FileKind::TarGzip => {
                // The tar layer of .tgz is not unpacked; the tarball is searched as one stream
                let reader = open_with_magic(&candidate.path, GZIP_MAGIC, "gzip").await?;
                let mut decoder = GzipDecoder::new(reader);
                decoder.multiple_members(true);
                UnitsInner::Single(Some(whole_file_unit(candidate, Box::new(decoder))))
            }
            FileKind::Zstd => {
                let reader = open_with_magic(&candidate.path, ZSTD_MAGIC, "zstd").await?;
                let mut decoder = ZstdDecoder::new(reader);
                decoder.multiple_members(true);
                UnitsInner::Single(Some(whole_file_unit(candidate, Box::new(decoder))))
            }
            FileKind::Zip => UnitsInner::Zip(
                ZipMembers::open(
                    candidate.path.clone(),
                    self.memory_threshold,
                    self.spill_dir.clone(),
                )
                .await?,
            ),
            FileKind::Plain | FileKind::Unsupported => {
                return Err(ZsiftError::other(format!(
                    "{} is not a container ({})",
                    candidate.name(),
                    candidate.kind.name()
                )));
            }
        };

        Ok(ContentUnits { inner })
    }
}

fn whole_file_unit(candidate: &FileCandidate, stream: UnitStream) -> ContentUnit {
    ContentUnit::new(candidate.name(), Some(candidate.path.clone()), stream)
}

/// Open a file and check its leading bytes without consuming them
async fn open_with_magic(path: &Path, magic: &[u8], format: &str) -> Result<BufReader<File>> {
    let name = path.display().to_string();
    let file = File::open(path)
        .await
        .map_err(|e| ZsiftError::traversal(path, e))?;
    let mut reader = BufReader::new(file);

    let header = reader
        .fill_buf()
        .await
        .map_err(|e| ZsiftError::decode(name.clone(), e))?;

    if !header.starts_with(magic) {
        return Err(ZsiftError::decode(
            name,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("missing {} header", format),
            ),
        ));
    }

    Ok(reader)
}

/// Member cursor over a zip archive.
///
/// The archive moves into the blocking pool for each read and comes back with the result.
struct ZipMembers {
    archive_path: PathBuf,
    archive: Option<zip::ZipArchive<std::fs::File>>,
    next_index: usize,
    len: usize,
    memory_threshold: u64,
    spill_dir: PathBuf,
}

/// Result of reading one member on the blocking pool
enum MemberRead {
    Directory,
    Buffered { name: String, data: Vec<u8> },
    Spilled { name: String, file: NamedTempFile },
}

impl ZipMembers {
    async fn open(
        archive_path: PathBuf,
        memory_threshold: u64,
        spill_dir: PathBuf,
    ) -> Result<Self> {
        let path = archive_path.clone();
        let archive = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&path).map_err(|e| ZsiftError::traversal(&path, e))?;
            zip::ZipArchive::new(file)
                .map_err(|e| ZsiftError::archive(path.display().to_string(), e))
        })
        .await
        .map_err(|e| ZsiftError::other(format!("zip reader task failed: {}", e)))??;

        let len = archive.len();
        Ok(Self {
            archive_path,
            archive: Some(archive),
            next_index: 0,
            len,
            memory_threshold,
            spill_dir,
        })
    }

    async fn next_member(&mut self) -> Option<Result<ContentUnit>> {
        while self.next_index < self.len {
            let index = self.next_index;
            self.next_index += 1;

            let mut archive = self.archive.take()?;
            let archive_name = self.archive_path.display().to_string();
            let threshold = self.memory_threshold;
            let spill_dir = self.spill_dir.clone();

            let joined = tokio::task::spawn_blocking(move || {
                let read = read_member(&mut archive, index, &archive_name, threshold, &spill_dir);
                (archive, read)
            })
            .await;

            let read = match joined {
                Ok((archive, read)) => {
                    self.archive = Some(archive);
                    read
                }
                Err(e) => {
                    // The archive handle is lost with the task; nothing more can be read
                    self.next_index = self.len;
                    return Some(Err(ZsiftError::other(format!(
                        "zip reader task failed: {}",
                        e
                    ))));
                }
            };

            let unit = match read {
                Ok(MemberRead::Directory) => continue,
                Ok(MemberRead::Buffered { name, data }) => ContentUnit::new(
                    name,
                    Some(self.archive_path.clone()),
                    Box::new(Cursor::new(data)),
                ),
                Ok(MemberRead::Spilled { name, file }) => match reopen_spill(&file) {
                    Ok(stream) => ContentUnit::new(name, Some(self.archive_path.clone()), stream)
                        .with_backing(file),
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            };
            return Some(Ok(unit));
        }
        None
    }
}

/// Decompress member `index`, in memory or into a spill file depending on its size
fn read_member(
    archive: &mut zip::ZipArchive<std::fs::File>,
    index: usize,
    archive_name: &str,
    memory_threshold: u64,
    spill_dir: &Path,
) -> Result<MemberRead> {
    let mut member = archive
        .by_index(index)
        .map_err(|e| ZsiftError::archive(format!("{} (member #{})", archive_name, index), e))?;

    if member.is_dir() {
        return Ok(MemberRead::Directory);
    }

    let name = member.name().to_string();
    let qualified = format!("{}:{}", archive_name, name);

    if member.size() < memory_threshold {
        let mut data = Vec::with_capacity(member.size() as usize);
        member
            .read_to_end(&mut data)
            .map_err(|e| ZsiftError::decode(qualified, e))?;
        Ok(MemberRead::Buffered { name, data })
    } else {
        let mut file = tempfile::Builder::new()
            .prefix("zsift-member-")
            .suffix(".tmp")
            .tempfile_in(spill_dir)
            .map_err(|e| ZsiftError::file_error("Failed to create spill file", e))?;
        std::io::copy(&mut member, file.as_file_mut())
            .map_err(|e| ZsiftError::decode(qualified, e))?;
        Ok(MemberRead::Spilled { name, file })
    }
}

fn reopen_spill(file: &NamedTempFile) -> Result<UnitStream> {
    let handle = file
        .reopen()
        .map_err(|e| ZsiftError::file_error("Failed to reopen spill file", e))?;
    Ok(Box::new(BufReader::new(File::from_std(handle))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tokio::io::AsyncReadExt;
    use zip::write::SimpleFileOptions;

    const TEXT: &str = "first line\nsecond line with needle\nthird line\n";

    fn gzip_bytes(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in members {
            if name.ends_with('/') {
                writer
                    .add_directory(*name, SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(data).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn expander(dir: &Path) -> ArchiveExpander {
        ArchiveExpander::new(1024 * 1024, dir)
    }

    async fn collect(units: &mut ContentUnits) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        while let Some(unit) = units.next_unit().await {
            let unit = unit.unwrap();
            let name = unit.logical_name().to_string();
            let (_, mut stream, _backing) = unit.into_parts();
            let mut data = Vec::new();
            stream.read_to_end(&mut data).await.unwrap();
            out.push((name, data));
        }
        out
    }

    #[tokio::test]
    async fn test_gzip_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.gz");
        std::fs::write(&path, gzip_bytes(TEXT.as_bytes())).unwrap();

        let candidate = FileCandidate::new(&path, true);
        let mut units = expander(dir.path()).open(&candidate).await.unwrap();
        let units = collect(&mut units).await;

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].0, path.display().to_string());
        assert_eq!(units[0].1, TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_concatenated_gzip_members_decode_as_one_unit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joined.gz");
        let mut bytes = gzip_bytes(b"part one\n");
        bytes.extend(gzip_bytes(b"part two\n"));
        std::fs::write(&path, bytes).unwrap();

        let candidate = FileCandidate::new(&path, true);
        let mut units = expander(dir.path()).open(&candidate).await.unwrap();
        let units = collect(&mut units).await;
        assert_eq!(units[0].1, b"part one\npart two\n");
    }

    #[tokio::test]
    async fn test_tgz_is_decoded_as_plain_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.tgz");
        std::fs::write(&path, gzip_bytes(TEXT.as_bytes())).unwrap();

        let candidate = FileCandidate::new(&path, true);
        assert_eq!(candidate.kind, FileKind::TarGzip);
        let mut units = expander(dir.path()).open(&candidate).await.unwrap();
        let units = collect(&mut units).await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].1, TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_zstd_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.log.zstd");
        std::fs::write(&path, zstd::encode_all(TEXT.as_bytes(), 3).unwrap()).unwrap();

        let candidate = FileCandidate::new(&path, true);
        let mut units = expander(dir.path()).open(&candidate).await.unwrap();
        let units = collect(&mut units).await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].1, TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_zip_members_in_table_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.zip");
        std::fs::write(
            &path,
            zip_bytes(&[
                ("b.txt", &b"bravo\n"[..]),
                ("nested/", &b""[..]),
                ("nested/a.txt", &b"alpha\n"[..]),
                ("c.txt", &b"charlie\n"[..]),
            ]),
        )
        .unwrap();

        let candidate = FileCandidate::new(&path, true);
        let mut units = expander(dir.path()).open(&candidate).await.unwrap();
        let units = collect(&mut units).await;

        let names: Vec<&str> = units.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "nested/a.txt", "c.txt"]);
        assert_eq!(units[1].1, b"alpha\n");
    }

    #[tokio::test]
    async fn test_large_zip_member_is_spilled_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let spill = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.zip");
        let payload = b"needle ".repeat(512);
        std::fs::write(&path, zip_bytes(&[("big.txt", &payload[..])])).unwrap();

        let candidate = FileCandidate::new(&path, true);
        let mut units = ArchiveExpander::new(16, spill.path())
            .open(&candidate)
            .await
            .unwrap();

        let unit = units.next_unit().await.unwrap().unwrap();
        assert_eq!(std::fs::read_dir(spill.path()).unwrap().count(), 1);

        let (name, mut stream, backing) = unit.into_parts();
        assert_eq!(name, format!("{}:big.txt", path.display()));
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, payload);

        drop(stream);
        drop(backing);
        assert_eq!(std::fs::read_dir(spill.path()).unwrap().count(), 0);
        assert!(units.next_unit().await.is_none());
    }

    #[tokio::test]
    async fn test_bad_headers_produce_no_units() {
        let dir = tempfile::tempdir().unwrap();
        let exp = expander(dir.path());

        let gz = dir.path().join("fake.gz");
        std::fs::write(&gz, b"plain text pretending").unwrap();
        let err = exp.open(&FileCandidate::new(&gz, true)).await.unwrap_err();
        assert!(err.is_decode());

        let empty = dir.path().join("empty.zstd");
        std::fs::write(&empty, b"").unwrap();
        let err = exp.open(&FileCandidate::new(&empty, true)).await.unwrap_err();
        assert!(err.is_decode());

        let zip = dir.path().join("broken.zip");
        std::fs::write(&zip, b"PK but not really").unwrap();
        let err = exp.open(&FileCandidate::new(&zip, true)).await.unwrap_err();
        assert!(matches!(err, ZsiftError::Archive { .. }));
    }

    #[tokio::test]
    async fn test_truncated_gzip_fails_while_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.gz");
        let bytes = gzip_bytes(TEXT.repeat(50).as_bytes());
        std::fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

        let candidate = FileCandidate::new(&path, true);
        let mut units = expander(dir.path()).open(&candidate).await.unwrap();
        let unit = units.next_unit().await.unwrap().unwrap();
        let (_, mut stream, _) = unit.into_parts();
        let mut data = Vec::new();
        assert!(stream.read_to_end(&mut data).await.is_err());
    }

    #[tokio::test]
    async fn test_plain_candidate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, TEXT).unwrap();

        let result = expander(dir.path())
            .open(&FileCandidate::new(&path, true))
            .await;
        assert!(matches!(result, Err(ZsiftError::Other { .. })));
    }
}
