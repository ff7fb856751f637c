//! The primary search pass over a directory tree.
//!
//! Every regular file is classified by name and routed: plain files go to the engine by path,
//! compressed files are expanded and each unit is searched on its own. Per-file failures are
//! logged and counted; only an unreadable root stops the pass.

pub mod tree;

pub use tree::{TreeWalk, WalkEntry};

use crate::archive::{ArchiveExpander, FileCandidate, FileKind};
use crate::cancel::CancellationToken;
use crate::error::{Result, ZsiftError};
use crate::search::{ExitClass, SearchDispatcher};
use std::path::Path;

/// Counters for one search pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub files_visited: usize,
    /// Engine invocations that produced a result
    pub units_searched: usize,
    pub matched: usize,
    pub no_match: usize,
    pub tool_errors: usize,
    /// Containers or members that could not be decoded
    pub decode_errors: usize,
    /// Engine could not be run, timed out, or its report could not be written
    pub engine_errors: usize,
    pub traversal_errors: usize,
    pub unsupported: usize,
    pub cancelled: bool,
}

impl WalkSummary {
    fn record(&mut self, class: ExitClass) {
        self.units_searched += 1;
        match class {
            ExitClass::Matched => self.matched += 1,
            ExitClass::NoMatch => self.no_match += 1,
            ExitClass::ToolError => self.tool_errors += 1,
        }
    }

    fn record_error(&mut self, error: &ZsiftError) {
        if error.is_decode() {
            self.decode_errors += 1;
        } else if matches!(error, ZsiftError::Traversal { .. }) {
            self.traversal_errors += 1;
        } else {
            self.engine_errors += 1;
        }
    }

    /// Total failures of any kind
    pub fn errors(&self) -> usize {
        self.tool_errors + self.decode_errors + self.engine_errors + self.traversal_errors
    }
}

/// Drives the search pass
pub struct DirectoryWalker {
    expander: ArchiveExpander,
    dispatcher: SearchDispatcher,
    sort_entries: bool,
    cancel: CancellationToken,
}

impl DirectoryWalker {
    pub fn new(
        expander: ArchiveExpander,
        dispatcher: SearchDispatcher,
        sort_entries: bool,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            expander,
            dispatcher,
            sort_entries,
            cancel,
        }
    }

    /// Search every regular file under `root`
    pub async fn walk(&mut self, root: &Path) -> Result<WalkSummary> {
        let mut walk = TreeWalk::new(root, self.sort_entries).await?;
        let mut summary = WalkSummary::default();

        while let Some(entry) = walk.next_entry().await {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("{}", e);
                    summary.traversal_errors += 1;
                    continue;
                }
            };

            summary.files_visited += 1;
            let candidate = FileCandidate::new(entry.path, entry.metadata.is_file());
            self.visit(&candidate, &mut summary).await;
        }

        Ok(summary)
    }

    async fn visit(&mut self, candidate: &FileCandidate, summary: &mut WalkSummary) {
        if candidate.kind.is_compressed() {
            self.visit_container(candidate, summary).await;
            return;
        }

        if candidate.kind == FileKind::Unsupported {
            log::warn!("skipping {}: unsupported format", candidate.path.display());
            summary.unsupported += 1;
            return;
        }

        match self.dispatcher.search_path(&candidate.path).await {
            Ok(class) => summary.record(class),
            Err(e) => {
                log::warn!("{}", e);
                summary.record_error(&e);
            }
        }
    }

    async fn visit_container(&mut self, candidate: &FileCandidate, summary: &mut WalkSummary) {
        log::debug!(
            "expanding {} as {}",
            candidate.path.display(),
            candidate.kind.name()
        );

        let mut units = match self.expander.open(candidate).await {
            Ok(units) => units,
            Err(e) => {
                log::warn!("{}", e);
                summary.record_error(&e);
                return;
            }
        };

        while let Some(unit) = units.next_unit().await {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return;
            }

            let result = match unit {
                Ok(unit) => self.dispatcher.search_unit(unit).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(class) => summary.record(class),
                Err(e) => {
                    log::warn!("{}", e);
                    summary.record_error(&e);
                }
            }
        }
    }
}
