//! Deterministic in-process search engine.
//!
//! A target matches when its bytes contain the pattern literally. The output lists the
//! matching lines, one per line, the way a line-oriented engine would print them.

use crate::error::{Result, ZsiftError};
use crate::search::engine::{SearchEngine, SearchInvocation, SearchTarget};
use async_trait::async_trait;
use bstr::ByteSlice;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// What the fake engine saw for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub label: String,
    pub pattern: String,
    pub options: Vec<String>,
    pub content: Vec<u8>,
    /// Whether the content arrived on stdin rather than by path
    pub streamed: bool,
}

/// In-process engine for tests; clones share their recording
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    runs: Arc<Mutex<Vec<RecordedRun>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make runs whose label contains `label` exit with status 2
    pub fn fail_on(&self, label: impl Into<String>) {
        self.failing.lock().insert(label.into());
    }

    /// Every run so far, in order
    pub fn runs(&self) -> Vec<RecordedRun> {
        self.runs.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    fn should_fail(&self, label: &str) -> bool {
        self.failing
            .lock()
            .iter()
            .any(|needle| label.contains(needle.as_str()))
    }
}

/// Lines of `content` that contain `pattern`, newline-terminated
fn matching_lines(content: &[u8], pattern: &[u8]) -> Vec<u8> {
    let finder = memchr::memmem::Finder::new(pattern);
    let mut out = Vec::new();
    for line in content.lines() {
        if finder.find(line).is_some() {
            out.extend_from_slice(line);
            out.push(b'\n');
        }
    }
    out
}

#[async_trait]
impl SearchEngine for FakeEngine {
    async fn run(
        &self,
        pattern: &str,
        options: &[String],
        target: SearchTarget<'_>,
    ) -> Result<SearchInvocation> {
        let label = target.label().to_string();

        let (content, streamed) = match target {
            SearchTarget::Path { path, .. } => {
                let content = tokio::fs::read(path)
                    .await
                    .map_err(|e| ZsiftError::traversal(path, e))?;
                (content, false)
            }
            SearchTarget::Stream { reader, .. } => {
                let mut content = Vec::new();
                reader
                    .read_to_end(&mut content)
                    .await
                    .map_err(|e| ZsiftError::decode(label.clone(), e))?;
                (content, true)
            }
        };

        let (code, output) = if self.should_fail(&label) {
            (2, format!("fake engine failure on {}\n", label).into_bytes())
        } else {
            let output = matching_lines(&content, pattern.as_bytes());
            if output.is_empty() {
                (1, output)
            } else {
                (0, output)
            }
        };

        self.runs.lock().push(RecordedRun {
            label: label.clone(),
            pattern: pattern.to_string(),
            options: options.to_vec(),
            content,
            streamed,
        });

        Ok(SearchInvocation::new(
            pattern,
            options,
            &label,
            Some(code),
            output,
        ))
    }
}
