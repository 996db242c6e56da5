//! Running external extraction tools (tesseract, pdftoppm, soffice).
//!
//! Tools read and write files inside a caller-owned temp directory; their
//! stderr goes to a log file there, so nothing is piped and no buffer can
//! fill up. A run is killed once its deadline passes.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Why a tool run did not succeed.
#[derive(Debug, Error)]
pub(crate) enum ToolError {
    /// The executable could not be found.
    #[error("executable not found")]
    Missing,
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(String),
}

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Run `command` to completion inside `work_dir`, killing it after `timeout`.
pub(crate) fn run(command: &mut Command, work_dir: &Path, timeout: Duration) -> Result<(), ToolError> {
    let log_path = work_dir.join("stderr.log");
    let log = File::create(&log_path).map_err(|e| ToolError::Failed(e.to_string()))?;

    debug!(command = ?command, "running extraction tool");
    let mut child = command
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log))
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ToolError::Missing,
            _ => ToolError::Failed(e.to_string()),
        })?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::TimedOut(timeout));
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(ToolError::Failed(e.to_string())),
        }
    };

    if status.success() {
        Ok(())
    } else {
        let stderr = std::fs::read_to_string(&log_path).unwrap_or_default();
        Err(ToolError::Failed(format!(
            "{} ({})",
            stderr.trim(),
            status
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            &mut Command::new("docqa-definitely-not-installed"),
            dir.path(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Missing));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            Command::new("sh").args(["-c", "echo boom >&2; exit 3"]),
            dir.path(),
            Duration::from_secs(5),
        )
        .unwrap_err();
        match err {
            ToolError::Failed(msg) => assert!(msg.contains("boom")),
            other => panic!("unexpected: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_tool_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(
            Command::new("sleep").arg("5"),
            dir.path(),
            Duration::from_millis(100),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut(_)));
        assert_eq!(err.to_string(), "timed out after 0s");
    }

    #[test]
    fn errors_display_for_callers() {
        assert_eq!(ToolError::Missing.to_string(), "executable not found");
        assert_eq!(
            ToolError::TimedOut(Duration::from_secs(120)).to_string(),
            "timed out after 120s"
        );
        assert_eq!(
            ToolError::Failed("exit status 3: boom".to_string()).to_string(),
            "exit status 3: boom"
        );
    }
}
