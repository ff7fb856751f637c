//! Search engine capability and invocation results.

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::io::AsyncRead;

/// Outcome class derived from the engine's exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitClass {
    /// Status 0: the output is a match report
    Matched,
    /// Status 1: nothing found, nothing to print
    NoMatch,
    /// Any other status, or termination by signal
    ToolError,
}

impl ExitClass {
    /// Classify a process exit code; `None` means killed by a signal
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Matched,
            Some(1) => Self::NoMatch,
            _ => Self::ToolError,
        }
    }
}

/// What the engine is pointed at
pub enum SearchTarget<'a> {
    /// A path argument appended after the pattern
    Path { label: &'a str, path: &'a Path },
    /// Content supplied on standard input
    Stream {
        label: &'a str,
        reader: &'a mut (dyn AsyncRead + Unpin + Send),
    },
}

impl SearchTarget<'_> {
    /// Logical name the results are attributed to
    pub fn label(&self) -> &str {
        match self {
            Self::Path { label, .. } | Self::Stream { label, .. } => label,
        }
    }
}

/// Record of one completed engine run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchInvocation {
    pub pattern: String,
    /// Options exactly as forwarded to the engine
    pub options: Vec<String>,
    pub target: String,
    pub exit_code: Option<i32>,
    pub exit_class: ExitClass,
    /// Combined standard output and standard error
    pub output: Vec<u8>,
}

impl SearchInvocation {
    pub fn new(
        pattern: &str,
        options: &[String],
        target: &str,
        exit_code: Option<i32>,
        output: Vec<u8>,
    ) -> Self {
        Self {
            pattern: pattern.to_string(),
            options: options.to_vec(),
            target: target.to_string(),
            exit_code,
            exit_class: ExitClass::from_code(exit_code),
            output,
        }
    }
}

/// Capability to run one search.
///
/// Implementations block (asynchronously) until the search has finished and must consume a
/// stream target to its end.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn run(
        &self,
        pattern: &str,
        options: &[String],
        target: SearchTarget<'_>,
    ) -> Result<SearchInvocation>;
}
