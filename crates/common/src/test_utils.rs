//! Test utilities for the token bridge
//!
//! Provides a scripted [`ToolRunner`] and helpers for building `usbipd list`
//! output, so the reconciliation core can be exercised without the real tool.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{ScriptedRunner, Scripted, render_table};
//! use protocol::DeviceRecord;
//!
//! let runner = ScriptedRunner::new();
//! runner.on("list", Scripted::ok(render_table(&[
//!     DeviceRecord::new("2-4", "1050:0407", "YubiKey OTP+FIDO+CCID", "Shared"),
//! ])));
//! assert_eq!(runner.call_count("list"), 0);
//! ```

use crate::tool::{ToolOutput, ToolRunner};
use protocol::DeviceRecord;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One scripted reply of the fake tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    /// Process ran and produced this output
    Output(ToolOutput),
    /// Process exceeded its timeout
    Timeout,
    /// Tool executable missing
    NotFound,
}

impl Scripted {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Scripted::Output(ToolOutput::ok(stdout))
    }

    pub fn fail(stderr: impl Into<String>) -> Self {
        Scripted::Output(ToolOutput::failed(1, stderr))
    }
}

/// Scripted stand-in for the sharing tool
///
/// Replies are keyed by the subcommand (first argument). Queued replies from
/// [`ScriptedRunner::push`] are consumed first; after that the standing reply
/// from [`ScriptedRunner::on`] is used. Unscripted subcommands succeed with
/// empty output. Every invocation is recorded.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    standing: Mutex<HashMap<String, Scripted>>,
    queued: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the standing reply for a subcommand
    pub fn on(&self, subcommand: &str, reply: Scripted) {
        lock(&self.standing).insert(subcommand.to_string(), reply);
    }

    /// Queue a one-shot reply for a subcommand
    pub fn push(&self, subcommand: &str, reply: Scripted) {
        lock(&self.queued)
            .entry(subcommand.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every invocation so far, in order
    pub fn calls(&self) -> Vec<Vec<String>> {
        lock(&self.calls).clone()
    }

    /// Invocations of one subcommand
    pub fn calls_to(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|args| args.first().map(String::as_str) == Some(subcommand))
            .collect()
    }

    pub fn call_count(&self, subcommand: &str) -> usize {
        self.calls_to(subcommand).len()
    }

    /// Forget recorded invocations
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn reply_for(&self, subcommand: &str) -> Scripted {
        if let Some(reply) = lock(&self.queued)
            .get_mut(subcommand)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        lock(&self.standing)
            .get(subcommand)
            .cloned()
            .unwrap_or_else(|| Scripted::ok(""))
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
    ) -> impl Future<Output = crate::Result<ToolOutput>> + Send {
        let subcommand = args.first().cloned().unwrap_or_default();
        let reply = self.reply_for(&subcommand);
        let command = format!("usbipd {}", args.join(" "));
        lock(&self.calls).push(args);

        async move {
            match reply {
                Scripted::Output(output) => Ok(output),
                Scripted::Timeout => Err(crate::Error::Timeout { command, timeout }),
                Scripted::NotFound => Err(crate::Error::ToolNotFound {
                    path: "usbipd".into(),
                }),
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Render records as `usbipd list` output
pub fn render_table(records: &[DeviceRecord]) -> String {
    let mut out = String::from("Connected:\nBUSID  VID:PID    DEVICE                                STATE\n");
    for r in records {
        out.push_str(&format!(
            "{:<6} {:<10} {:<37} {}\n",
            r.busid, r.vidpid, r.descriptor, r.raw_state
        ));
    }
    out.push_str("\nPersisted:\nGUID                                  DEVICE\n");
    out
}

/// An eligible Yubico record in the given raw state
pub fn token(busid: &str, raw_state: &str) -> DeviceRecord {
    DeviceRecord::new(busid, "1050:0407", "YubiKey OTP+FIDO+CCID", raw_state)
}

/// A non-token record in the given raw state
pub fn other_device(busid: &str, raw_state: &str) -> DeviceRecord {
    DeviceRecord::new(busid, "046d:c52b", "USB Input Device", raw_state)
}

/// Timeout wrapper for async tests
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
