//! Application orchestration layer
//!
//! Wires the configured engine, expander and reporter into the search pass, then runs the
//! rotation pass over the same root.

use crate::archive::ArchiveExpander;
use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::{Result, ZsiftError};
use crate::rotate::{LogRotator, RotationSummary};
use crate::search::{ProcessEngine, Reporter, SearchDispatcher, SearchEngine};
use crate::walker::{DirectoryWalker, WalkSummary};
use std::path::Path;
use std::sync::Arc;

/// What the caller asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub pattern: String,
    /// Forwarded to the engine verbatim, in order
    pub options: Vec<String>,
}

impl SearchRequest {
    pub fn new(pattern: impl Into<String>, options: Vec<String>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(ZsiftError::invalid_argument("search pattern must not be empty"));
        }
        Ok(Self { pattern, options })
    }
}

/// Outcome of a full run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub search: WalkSummary,
    /// `None` when rotation is disabled or the search pass was cancelled
    pub rotation: Option<RotationSummary>,
}

/// Application orchestrator
pub struct Application {
    config: Config,
    engine: Arc<dyn SearchEngine>,
    cancel: CancellationToken,
}

impl Application {
    /// Create an application driving the configured external engine
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let engine = Arc::new(ProcessEngine::new(&config.engine));
        Ok(Self::with_engine(config, engine))
    }

    /// Create an application around any engine implementation
    pub fn with_engine(config: Config, engine: Arc<dyn SearchEngine>) -> Self {
        Self {
            config,
            engine,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops both passes at the next file boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Search `root`, then rotate stale logs under it
    pub async fn run(
        &self,
        request: &SearchRequest,
        root: &Path,
        reporter: Reporter,
    ) -> Result<RunSummary> {
        let spool_dir = self.config.spool_dir();

        let dispatcher = SearchDispatcher::new(
            Arc::clone(&self.engine),
            request.pattern.clone(),
            request.options.clone(),
            reporter,
        )
        .with_spooling(self.config.spool_mode, spool_dir.clone());
        let expander = ArchiveExpander::new(self.config.memory_threshold, spool_dir);

        let mut walker = DirectoryWalker::new(
            expander,
            dispatcher,
            self.config.sort_entries,
            self.cancel.clone(),
        );
        let search = walker.walk(root).await?;

        let rotation = if self.config.rotate_logs && !search.cancelled {
            let rotator = LogRotator::new(&self.config, self.cancel.clone());
            Some(rotator.rotate_all(root).await?)
        } else {
            None
        };

        Ok(RunSummary { search, rotation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_is_rejected() {
        assert!(matches!(
            SearchRequest::new("", Vec::new()),
            Err(ZsiftError::InvalidArgument { .. })
        ));
        assert!(SearchRequest::new("needle", vec!["-i".to_string()]).is_ok());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.engine.program.clear();
        assert!(Application::new(config).is_err());
    }
}
