//! Subprocess-backed search engine.
//!
//! The argument list is `base_args ++ options ++ [pattern]`, followed by the path for path
//! targets. Stream targets are pumped into the child's standard input while its output is
//! collected, so neither side can fill a pipe and stall the other.

use crate::config::EngineConfig;
use crate::error::{Result, ZsiftError};
use crate::search::engine::{SearchEngine, SearchInvocation, SearchTarget};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};

const PUMP_CHUNK: usize = 64 * 1024;

/// Runs the configured program once per search
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl ProcessEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            program: config.program.clone(),
            base_args: config.base_args.clone(),
            timeout: config.timeout,
        }
    }
}

#[async_trait]
impl SearchEngine for ProcessEngine {
    async fn run(
        &self,
        pattern: &str,
        options: &[String],
        target: SearchTarget<'_>,
    ) -> Result<SearchInvocation> {
        let label = target.label().to_string();

        let mut command = Command::new(&self.program);
        command
            .args(&self.base_args)
            .args(options)
            .arg(pattern)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let reader = match target {
            SearchTarget::Path { path, .. } => {
                command.arg(path).stdin(Stdio::null());
                None
            }
            SearchTarget::Stream { reader, .. } => {
                command.stdin(Stdio::piped());
                Some(reader)
            }
        };

        let mut child = command.spawn().map_err(|e| {
            ZsiftError::engine(format!("failed to start `{}` for {}", self.program, label), e)
        })?;

        let stdin = child.stdin.take();
        let pump_label = label.clone();
        let pump = async move {
            match (reader, stdin) {
                (Some(reader), Some(stdin)) => pump_stream(reader, stdin, &pump_label).await,
                _ => Ok(()),
            }
        };
        let wait = child.wait_with_output();

        // Dropping the joined future on timeout drops the child, which kills it
        let joined = async { tokio::join!(pump, wait) };
        let (pumped, output) = tokio::time::timeout(self.timeout, joined)
            .await
            .map_err(|_| ZsiftError::EngineTimeout {
                target: label.clone(),
                after: self.timeout,
            })?;

        // A content failure invalidates whatever the engine reported
        pumped?;

        let output = output.map_err(|e| {
            ZsiftError::engine(format!("failed to collect output of `{}`", self.program), e)
        })?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Ok(SearchInvocation::new(
            pattern,
            options,
            &label,
            output.status.code(),
            combined,
        ))
    }
}

/// Copy the unit into the engine's stdin.
///
/// Read errors are decode errors of the unit. If the engine stops reading early the rest of
/// the unit is still drained so that truncation is detected.
async fn pump_stream(
    reader: &mut (dyn AsyncRead + Unpin + Send),
    mut stdin: ChildStdin,
    label: &str,
) -> Result<()> {
    let mut buf = vec![0u8; PUMP_CHUNK];
    loop {
        let n = reader
            .read(&mut buf)
            .await
            .map_err(|e| ZsiftError::decode(label, e))?;
        if n == 0 {
            break;
        }
        if let Err(e) = stdin.write_all(&buf[..n]).await {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                drop(stdin);
                tokio::io::copy(reader, &mut tokio::io::sink())
                    .await
                    .map_err(|e| ZsiftError::decode(label, e))?;
                return Ok(());
            }
            return Err(ZsiftError::engine("failed to write to engine stdin", e));
        }
    }
    // Closing stdin signals end of input
    drop(stdin);
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::search::engine::ExitClass;
    use std::io::Cursor;

    /// `sh -c SCRIPT` receives the pattern as `$0` and the path as `$1`
    fn shell(script: &str) -> ProcessEngine {
        ProcessEngine::new(&EngineConfig {
            program: "sh".to_string(),
            base_args: vec!["-c".to_string(), script.to_string()],
            timeout: Duration::from_secs(10),
        })
    }

    #[tokio::test]
    async fn test_path_target_match_and_no_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "alpha\nneedle here\nomega\n").unwrap();
        let engine = shell(r#"grep -n "$0" "$1""#);

        let hit = engine
            .run("needle", &[], SearchTarget::Path { label: "notes.txt", path: &path })
            .await
            .unwrap();
        assert_eq!(hit.exit_class, ExitClass::Matched);
        assert_eq!(hit.output, b"2:needle here\n");
        assert_eq!(hit.target, "notes.txt");

        let miss = engine
            .run("absent", &[], SearchTarget::Path { label: "notes.txt", path: &path })
            .await
            .unwrap();
        assert_eq!(miss.exit_class, ExitClass::NoMatch);
        assert!(miss.output.is_empty());
    }

    #[tokio::test]
    async fn test_stream_target_reads_stdin() {
        let engine = shell(r#"grep "$0""#);
        let mut reader = Cursor::new(b"one\ntwo needle\nthree\n".to_vec());

        let invocation = engine
            .run(
                "needle",
                &[],
                SearchTarget::Stream { label: "member.txt", reader: &mut reader },
            )
            .await
            .unwrap();
        assert_eq!(invocation.exit_class, ExitClass::Matched);
        assert_eq!(invocation.output, b"two needle\n");
    }

    #[tokio::test]
    async fn test_options_precede_pattern() {
        // $0 is the first forwarded option, $1 the pattern
        let engine = shell(r#"echo "$0|$1""#);
        let mut reader = Cursor::new(Vec::new());
        let options = vec!["--literal".to_string()];

        let invocation = engine
            .run("needle", &options, SearchTarget::Stream { label: "x", reader: &mut reader })
            .await
            .unwrap();
        assert_eq!(invocation.output, b"--literal|needle\n");
        assert_eq!(invocation.options, options);
    }

    #[tokio::test]
    async fn test_engine_that_ignores_stdin_still_drains_stream() {
        let engine = shell("exit 1");
        let mut reader = Cursor::new(vec![b'x'; 4 * PUMP_CHUNK]);

        let invocation = engine
            .run("needle", &[], SearchTarget::Stream { label: "x", reader: &mut reader })
            .await
            .unwrap();
        assert_eq!(invocation.exit_class, ExitClass::NoMatch);
        assert_eq!(reader.position(), (4 * PUMP_CHUNK) as u64);
    }

    #[tokio::test]
    async fn test_tool_error_combines_output() {
        let engine = shell("echo out; echo err >&2; exit 3");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();

        let invocation = engine
            .run("p", &[], SearchTarget::Path { label: "a.txt", path: &path })
            .await
            .unwrap();
        assert_eq!(invocation.exit_class, ExitClass::ToolError);
        assert_eq!(invocation.exit_code, Some(3));
        assert_eq!(invocation.output, b"out\nerr\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_engine() {
        let mut engine = shell("sleep 5");
        engine.timeout = Duration::from_millis(100);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x").unwrap();

        let started = std::time::Instant::now();
        let err = engine
            .run("p", &[], SearchTarget::Path { label: "a.txt", path: &path })
            .await
            .unwrap_err();
        assert!(matches!(err, ZsiftError::EngineTimeout { ref target, .. } if target == "a.txt"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_program_is_engine_error() {
        let engine = ProcessEngine::new(&EngineConfig {
            program: "zsift-no-such-engine".to_string(),
            base_args: Vec::new(),
            timeout: Duration::from_secs(1),
        });
        let dir = tempfile::tempdir().unwrap();

        let err = engine
            .run("p", &[], SearchTarget::Path { label: "d", path: dir.path() })
            .await
            .unwrap_err();
        assert!(matches!(err, ZsiftError::Engine { .. }));
    }

    #[tokio::test]
    async fn test_decode_failure_discards_result() {
        let broken = vec![0x1f, 0x8b, 0x08, 0x00, 0x00];
        let mut decoder = async_compression::tokio::bufread::GzipDecoder::new(
            tokio::io::BufReader::new(Cursor::new(broken)),
        );
        let engine = shell("cat >/dev/null; echo matched; exit 0");

        let err = engine
            .run("p", &[], SearchTarget::Stream { label: "bad.gz", reader: &mut decoder })
            .await
            .unwrap_err();
        assert!(err.is_decode());
    }
}
