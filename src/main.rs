//! zsift - Archive-Aware Recursive Search
//!
//! Searches a directory tree through an external search engine, looking inside compressed
//! containers, then rotates stale logs.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;
use zsift::config::{duration_from_hours, ColorChoice, SpoolMode};
use zsift::search::Reporter;
use zsift::{Application, Config, SearchRequest, ZsiftError};

fn cli() -> Command {
    Command::new("zsift")
        .version(zsift::VERSION)
        .about("Recursively search files and compressed archives with an external search engine")
        .long_about(
            "zsift walks DIR and runs the search engine (ag by default) on every file. \
             Gzip (.gz, .tgz), zip (.zip) and zstd (.zstd) files are decompressed \
             transparently; zip archives are searched member by member. Afterwards, .log \
             files older than the retention window are compressed to .log.zstd.\n\n\
             Arguments after `--` are passed to the search engine unchanged.",
        )
        .arg(
            Arg::new("pattern")
                .help("Pattern handed to the search engine")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("dir")
                .help("Directory to search")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .index(2),
        )
        .arg(
            Arg::new("engine_args")
                .help("Options forwarded verbatim to the search engine")
                .num_args(0..)
                .index(3)
                .last(true)
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("Read configuration from this TOML file")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("engine")
                .long("engine")
                .help("Search engine program to run"),
        )
        .arg(
            Arg::new("stream")
                .long("stream")
                .help("Pipe decompressed content to the engine instead of spooling temp files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_rotate")
                .long("no-rotate")
                .help("Skip compressing stale log files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("retention_hours")
                .long("retention-hours")
                .help("Age in hours after which .log files are rotated [default: 168]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("timeout_secs")
                .long("timeout-secs")
                .help("Kill a search engine run after this many seconds [default: 300]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .help("Highlight result headers: auto, always or never"),
        )
}

/// Layer command-line flags over the loaded configuration
fn apply_overrides(config: &mut Config, matches: &ArgMatches) -> zsift::Result<()> {
    if let Some(engine) = matches.get_one::<String>("engine") {
        config.engine.program = engine.clone();
    }
    if matches.get_flag("stream") {
        config.spool_mode = SpoolMode::Stream;
    }
    if matches.get_flag("no_rotate") {
        config.rotate_logs = false;
    }
    if let Some(&hours) = matches.get_one::<u64>("retention_hours") {
        config.retention = duration_from_hours(hours).ok_or_else(|| {
            ZsiftError::invalid_argument(format!("--retention-hours {} is too large", hours))
        })?;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout_secs") {
        config.engine.timeout = Duration::from_secs(*secs);
    }
    if let Some(color) = matches.get_one::<String>("color") {
        config.color = ColorChoice::parse(color)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; warnings are shown unless RUST_LOG says otherwise
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let matches = cli().get_matches();

    let pattern = matches
        .get_one::<String>("pattern")
        .context("pattern argument is required")?;
    let root = matches
        .get_one::<PathBuf>("dir")
        .context("dir argument is required")?;
    let options: Vec<String> = matches
        .get_many::<String>("engine_args")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    let mut config = Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    apply_overrides(&mut config, &matches)?;

    let request = SearchRequest::new(pattern.clone(), options)?;
    let color = config.color.enabled();
    // `colored` otherwise decides on its own from the environment
    colored::control::set_override(color);
    let reporter = Reporter::stdout(color);
    let app = Application::new(config)?;

    let cancel = app.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted; stopping after the current file");
            cancel.cancel();
        }
    });

    let summary = app
        .run(&request, root, reporter)
        .await
        .with_context(|| format!("Error walking the path {}", root.display()))?;

    let search = &summary.search;
    log::info!(
        "searched {} units in {} files: {} matched, {} without matches, {} errors",
        search.units_searched,
        search.files_visited,
        search.matched,
        search.no_match,
        search.errors()
    );
    if let Some(rotation) = &summary.rotation {
        log::info!(
            "rotated {} of {} log files ({} failed)",
            rotation.rotated,
            rotation.examined,
            rotation.failed
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert!(!zsift::VERSION.is_empty());
    }

    #[test]
    fn test_cli_forwards_engine_args() {
        let matches = cli()
            .try_get_matches_from(["zsift", "needle", "/srv", "--", "--ignore-case", "-w"])
            .unwrap();
        let forwarded: Vec<&String> = matches.get_many::<String>("engine_args").unwrap().collect();
        assert_eq!(forwarded, ["--ignore-case", "-w"]);
        assert_eq!(
            matches.get_one::<PathBuf>("dir").unwrap(),
            &PathBuf::from("/srv")
        );
    }

    #[test]
    fn test_cli_requires_pattern_and_dir() {
        assert!(cli().try_get_matches_from(["zsift"]).is_err());
        assert!(cli().try_get_matches_from(["zsift", "needle"]).is_err());
    }

    #[test]
    fn test_overrides_apply_flags() {
        let matches = cli()
            .try_get_matches_from([
                "zsift",
                "needle",
                "/srv",
                "--stream",
                "--no-rotate",
                "--retention-hours",
                "24",
                "--engine",
                "rg",
            ])
            .unwrap();
        let mut config = Config::default();
        apply_overrides(&mut config, &matches).unwrap();

        assert_eq!(config.spool_mode, SpoolMode::Stream);
        assert!(!config.rotate_logs);
        assert_eq!(config.retention, Duration::from_secs(24 * 3600));
        assert_eq!(config.engine.program, "rg");
    }

    #[test]
    fn test_oversized_retention_is_rejected() {
        let matches = cli()
            .try_get_matches_from([
                "zsift",
                "needle",
                "/srv",
                "--retention-hours",
                "18446744073709551615",
            ])
            .unwrap();
        let mut config = Config::default();
        assert!(matches!(
            apply_overrides(&mut config, &matches),
            Err(ZsiftError::InvalidArgument { .. })
        ));
        assert_eq!(config.retention, zsift::config::DEFAULT_RETENTION);
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }
}
