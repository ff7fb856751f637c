//! Depth-first enumeration of regular files under a root.
//!
//! Built on `walkdir`. Symlinks are not followed and non-regular entries are skipped. Failures
//! below the root are yielded per path; only the root itself can fail construction. The
//! directory iterator is synchronous, so each step runs on the blocking pool.

use crate::error::{Result, ZsiftError};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A regular file found by the walk
#[derive(Debug)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub metadata: Metadata,
}

/// Pull-based directory walk
pub struct TreeWalk {
    /// `None` once the blocking task running the iterator has been lost
    entries: Option<walkdir::IntoIter>,
    /// First result, pulled early to surface root errors from `new`
    peeked: Option<Result<WalkEntry>>,
}

impl TreeWalk {
    /// Start a walk, failing if the root cannot be stat-ed or listed
    pub async fn new(root: &Path, sort_entries: bool) -> Result<Self> {
        let mut walker = WalkDir::new(root).follow_links(false);
        if sort_entries {
            walker = walker.sort_by_file_name();
        }

        let (entries, first) = pull_blocking(walker.into_iter()).await?;
        let peeked = match first {
            // Depth 0 is the root itself
            Some((0, Err(e))) => return Err(e),
            other => other.map(|(_, result)| result),
        };

        Ok(Self {
            entries: Some(entries),
            peeked,
        })
    }

    /// Next regular file, or a per-path error; `None` when the walk is complete
    pub async fn next_entry(&mut self) -> Option<Result<WalkEntry>> {
        if let Some(result) = self.peeked.take() {
            return Some(result);
        }

        let entries = self.entries.take()?;
        match pull_blocking(entries).await {
            Ok((entries, next)) => {
                self.entries = Some(entries);
                next.map(|(_, result)| result)
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for TreeWalk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeWalk")
            .field("finished", &self.entries.is_none())
            .finish_non_exhaustive()
    }
}

type Pulled = Option<(usize, Result<WalkEntry>)>;

/// Advance the iterator on the blocking pool, handing it back with the result
async fn pull_blocking(mut entries: walkdir::IntoIter) -> Result<(walkdir::IntoIter, Pulled)> {
    tokio::task::spawn_blocking(move || {
        let next = pull(&mut entries);
        (entries, next)
    })
    .await
    .map_err(|e| ZsiftError::other(format!("directory walk task failed: {}", e)))
}

/// Next regular file or error, with the depth it was found at
fn pull(entries: &mut walkdir::IntoIter) -> Pulled {
    loop {
        let entry = match entries.next()? {
            Ok(entry) => entry,
            Err(e) => return Some((e.depth(), Err(walk_error(e)))),
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            log::debug!("skipping non-regular entry {}", entry.path().display());
            continue;
        }

        let depth = entry.depth();
        let result = match entry.metadata() {
            Ok(metadata) => Ok(WalkEntry {
                path: entry.into_path(),
                metadata,
            }),
            Err(e) => Err(walk_error(e)),
        };
        return Some((depth, result));
    }
}

fn walk_error(error: walkdir::Error) -> ZsiftError {
    let path = error.path().map(Path::to_path_buf).unwrap_or_default();
    ZsiftError::traversal(path, std::io::Error::from(error))
}
