//! Routes paths and content units to the search engine and acts on the result.

use crate::archive::{ContentUnit, SpooledUnit};
use crate::config::SpoolMode;
use crate::error::Result;
use crate::search::engine::{ExitClass, SearchEngine, SearchInvocation, SearchTarget};
use crate::search::report::Reporter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Invokes the engine with a fixed pattern and option list
pub struct SearchDispatcher {
    engine: Arc<dyn SearchEngine>,
    pattern: String,
    options: Vec<String>,
    reporter: Reporter,
    spool_mode: SpoolMode,
    spool_dir: PathBuf,
}

impl SearchDispatcher {
    pub fn new(
        engine: Arc<dyn SearchEngine>,
        pattern: impl Into<String>,
        options: Vec<String>,
        reporter: Reporter,
    ) -> Self {
        Self {
            engine,
            pattern: pattern.into(),
            options,
            reporter,
            spool_mode: SpoolMode::default(),
            spool_dir: std::env::temp_dir(),
        }
    }

    /// Choose how content units reach the engine
    pub fn with_spooling(mut self, mode: SpoolMode, dir: impl Into<PathBuf>) -> Self {
        self.spool_mode = mode;
        self.spool_dir = dir.into();
        self
    }

    /// Search a plain file by path
    pub async fn search_path(&mut self, path: &Path) -> Result<ExitClass> {
        let label = path.display().to_string();
        let invocation = self
            .engine
            .run(
                &self.pattern,
                &self.options,
                SearchTarget::Path {
                    label: &label,
                    path,
                },
            )
            .await?;
        self.report(&invocation)
    }

    /// Search one decoded unit, consuming it.
    ///
    /// In spool mode decode errors are raised before the engine runs. In stream mode they
    /// are raised after it, and the engine's result is discarded.
    pub async fn search_unit(&mut self, unit: ContentUnit) -> Result<ExitClass> {
        match self.spool_mode {
            SpoolMode::Spool => {
                let spooled = SpooledUnit::spool(unit, &self.spool_dir).await?;
                log::debug!(
                    "spooled {} bytes of {} to {}",
                    spooled.len(),
                    spooled.display_name(),
                    spooled.path().display()
                );
                let invocation = self
                    .engine
                    .run(
                        &self.pattern,
                        &self.options,
                        SearchTarget::Path {
                            label: spooled.display_name(),
                            path: spooled.path(),
                        },
                    )
                    .await?;
                self.report(&invocation)
            }
            SpoolMode::Stream => {
                let (name, mut stream, _backing) = unit.into_parts();
                let label = format!("{} (from stream)", name);
                let invocation = self
                    .engine
                    .run(
                        &self.pattern,
                        &self.options,
                        SearchTarget::Stream {
                            label: &label,
                            reader: &mut *stream,
                        },
                    )
                    .await?;
                self.report(&invocation)
            }
        }
    }

    fn report(&mut self, invocation: &SearchInvocation) -> Result<ExitClass> {
        match invocation.exit_class {
            ExitClass::Matched => {
                self.reporter
                    .report_match(&invocation.target, &invocation.output)?;
            }
            ExitClass::NoMatch => {}
            ExitClass::ToolError => {
                log::warn!(
                    "search engine failed on {} (status {}): {}",
                    invocation.target,
                    invocation
                        .exit_code
                        .map_or_else(|| "signal".to_string(), |code| code.to_string()),
                    String::from_utf8_lossy(&invocation.output).trim_end()
                );
            }
        }
        Ok(invocation.exit_class)
    }
}
