//! Seam for invoking the external sharing tool
//!
//! The bridge talks to `usbipd` only through [`ToolRunner`], so the whole
//! reconciliation core can be driven by a scripted runner in tests.

use std::future::Future;
use std::time::Duration;

/// Captured result of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    /// Process exit code (-1 when killed by a signal)
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Most informative text: trimmed stderr, else trimmed stdout
    pub fn message(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }

    /// Combined stdout and stderr, trimmed
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// Runs the sharing tool with arguments under a timeout
///
/// A non-zero exit is reported as `Ok` with the exit code in
/// [`ToolOutput::status`]. `Err` is reserved for failures to run at all:
/// [`crate::Error::ToolNotFound`], [`crate::Error::Timeout`] and
/// [`crate::Error::Io`].
pub trait ToolRunner: Send + Sync + 'static {
    fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> impl Future<Output = crate::Result<ToolOutput>> + Send;
}

/// Build an argument vector from string slices
pub fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
