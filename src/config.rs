//! Run configuration.
//!
//! All tunables live in [`Config`] and are handed explicitly to the walker, dispatcher and
//! rotator. With the `config` feature enabled, overrides can be read from a TOML file.

use crate::error::{Result, ZsiftError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default retention window for log files: 7 days
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(168 * 60 * 60);

/// Default bound on a single search engine invocation
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(300);

/// Archive members below this size are buffered in memory, larger ones go to a temp file
pub const DEFAULT_MEMORY_THRESHOLD: u64 = 10_000_000; // 10MB

/// Convert a count of hours, `None` if it does not fit in a `Duration`
pub fn duration_from_hours(hours: u64) -> Option<Duration> {
    hours.checked_mul(60 * 60).map(Duration::from_secs)
}

/// How decoded archive content is handed to the search engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpoolMode {
    /// Materialize each unit in a uniquely named temp file and pass its path
    #[default]
    Spool,
    /// Pipe each unit into the engine's standard input
    Stream,
}

/// When match headers are highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Highlight only when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Parse `auto`, `always` or `never`
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(ZsiftError::invalid_argument(format!(
                "unknown color choice '{}' (expected auto, always or never)",
                other
            ))),
        }
    }

    /// Resolve against the actual output stream
    pub fn enabled(&self) -> bool {
        use std::io::IsTerminal;
        match self {
            Self::Auto => std::io::stdout().is_terminal(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// External search engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Program to execute
    pub program: String,
    /// Arguments placed before the caller's pass-through options
    pub base_args: Vec<String>,
    /// Upper bound on one invocation; the process is killed when exceeded
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "ag".to_string(),
            base_args: vec!["--color".to_string()],
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }
}

/// Complete configuration for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub engine: EngineConfig,
    pub spool_mode: SpoolMode,
    /// Directory for spool files; the system temp directory when `None`
    pub spool_dir: Option<PathBuf>,
    pub memory_threshold: u64,
    /// Logs older than this are rotated
    pub retention: Duration,
    pub log_suffix: String,
    pub rotated_suffix: String,
    /// zstd level for rotated logs; the codec default when `None`
    pub zstd_level: Option<i32>,
    /// Visit directory entries in lexical order
    pub sort_entries: bool,
    pub rotate_logs: bool,
    pub color: ColorChoice,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            spool_mode: SpoolMode::default(),
            spool_dir: None,
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            retention: DEFAULT_RETENTION,
            log_suffix: ".log".to_string(),
            rotated_suffix: ".zstd".to_string(),
            zstd_level: None,
            sort_entries: true,
            rotate_logs: true,
            color: ColorChoice::default(),
        }
    }
}

impl Config {
    /// Directory spool files are created in
    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Check the values that would make a run misbehave
    pub fn validate(&self) -> Result<()> {
        if self.engine.program.trim().is_empty() {
            return Err(ZsiftError::config("search engine program must not be empty"));
        }
        if self.engine.timeout.is_zero() {
            return Err(ZsiftError::config("search engine timeout must be positive"));
        }
        if self.log_suffix.is_empty() || self.rotated_suffix.is_empty() {
            return Err(ZsiftError::config("log and rotated suffixes must not be empty"));
        }
        // A rotated artifact that still looks like a log would be rotated again on every run
        if self.rotated_suffix.ends_with(&self.log_suffix) {
            return Err(ZsiftError::config(format!(
                "rotated suffix '{}' must not end with the log suffix '{}'",
                self.rotated_suffix, self.log_suffix
            )));
        }
        if let Some(level) = self.zstd_level {
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(ZsiftError::config(format!(
                    "zstd level {} outside supported range {}..={}",
                    level,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }

    /// Load configuration, applying overrides from a TOML file.
    ///
    /// With an explicit `path` the file must exist. Without one, the default location
    /// (`<config dir>/zsift/config.toml`) is used when present.
    #[cfg(feature = "config")]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let source = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|candidate| candidate.is_file()),
        };

        if let Some(source) = source {
            let text = std::fs::read_to_string(&source).map_err(|e| {
                ZsiftError::file_error(
                    format!("Failed to read config file {}", source.display()),
                    e,
                )
            })?;
            file::ConfigFile::parse(&text)?.apply(&mut config)?;
            log::debug!("loaded configuration from {}", source.display());
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration; only defaults are available without the `config` feature.
    #[cfg(not(feature = "config"))]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Err(ZsiftError::config(format!(
                "cannot read {}: built without the `config` feature",
                path.display()
            )));
        }
        Ok(Self::default())
    }
}

/// Default location of the configuration file
#[cfg(feature = "config")]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zsift").join("config.toml"))
}

#[cfg(feature = "config")]
mod file {
    use super::{duration_from_hours, ColorChoice, Config, SpoolMode};
    use crate::error::{Result, ZsiftError};
    use serde::Deserialize;
    use std::path::PathBuf;
    use std::time::Duration;

    /// On-disk shape of the configuration; every field is optional
    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    pub(super) struct ConfigFile {
        engine: Option<String>,
        engine_args: Option<Vec<String>>,
        engine_timeout_secs: Option<u64>,
        stream: Option<bool>,
        spool_dir: Option<PathBuf>,
        memory_threshold: Option<u64>,
        retention_hours: Option<u64>,
        log_suffix: Option<String>,
        rotated_suffix: Option<String>,
        zstd_level: Option<i32>,
        sort_entries: Option<bool>,
        rotate_logs: Option<bool>,
        color: Option<String>,
    }

    impl ConfigFile {
        pub(super) fn parse(text: &str) -> Result<Self> {
            toml::from_str(text).map_err(|e| ZsiftError::config(e.to_string()))
        }

        pub(super) fn apply(self, config: &mut Config) -> Result<()> {
            if let Some(program) = self.engine {
                config.engine.program = program;
            }
            if let Some(args) = self.engine_args {
                config.engine.base_args = args;
            }
            if let Some(secs) = self.engine_timeout_secs {
                config.engine.timeout = Duration::from_secs(secs);
            }
            if let Some(stream) = self.stream {
                config.spool_mode = if stream {
                    SpoolMode::Stream
                } else {
                    SpoolMode::Spool
                };
            }
            if self.spool_dir.is_some() {
                config.spool_dir = self.spool_dir;
            }
            if let Some(threshold) = self.memory_threshold {
                config.memory_threshold = threshold;
            }
            if let Some(hours) = self.retention_hours {
                config.retention = duration_from_hours(hours).ok_or_else(|| {
                    ZsiftError::config(format!("retention_hours {} is too large", hours))
                })?;
            }
            if let Some(suffix) = self.log_suffix {
                config.log_suffix = suffix;
            }
            if let Some(suffix) = self.rotated_suffix {
                config.rotated_suffix = suffix;
            }
            if self.zstd_level.is_some() {
                config.zstd_level = self.zstd_level;
            }
            if let Some(sort) = self.sort_entries {
                config.sort_entries = sort;
            }
            if let Some(rotate) = self.rotate_logs {
                config.rotate_logs = rotate;
            }
            if let Some(color) = self.color {
                config.color = ColorChoice::parse(&color)?;
            }
            Ok(())
        }
    }
}
