//! Process-backed tool runner

use common::{Error, Result, ToolOutput, ToolRunner};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Runs the real sharing tool as a child process
///
/// The child is killed when its timeout fires.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    async fn execute(&self, args: Vec<String>, timeout: Duration) -> Result<ToolOutput> {
        let command_line = format!("{} {}", self.program.display(), args.join(" "));
        debug!("Running {}", command_line);

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::ToolNotFound {
                    path: self.program.clone(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout {
                command: command_line.clone(),
                timeout,
            })??;

        let result = ToolOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!("{} exited with {}", command_line, result.status);
        Ok(result)
    }
}

impl ToolRunner for ProcessRunner {
    fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> impl Future<Output = Result<ToolOutput>> + Send {
        self.execute(args, timeout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use common::tool::args;

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let runner = ProcessRunner::new("/nonexistent/usbipd");
        let err = runner
            .run(args(&["list"]), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported_as_output() {
        let runner = ProcessRunner::new("sh");
        let output = runner
            .run(args(&["-c", "echo boom >&2; exit 3"]), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.status, 3);
        assert_eq!(output.message(), "boom");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let runner = ProcessRunner::new("sh");
        let err = runner
            .run(args(&["-c", "sleep 10"]), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
