//! Device snapshot fetcher

use common::tool::args;
use common::{Error, Result, ToolRunner};
use protocol::{DeviceRecord, parse_device_table};
use std::time::Duration;
use tracing::debug;

const LIST_FAILED: &str = "usbipd list failed";

/// Enumerate devices and parse them in tool order
pub async fn fetch_snapshot<R: ToolRunner>(
    runner: &R,
    timeout: Duration,
) -> Result<Vec<DeviceRecord>> {
    let output = runner.run(args(&["list"]), timeout).await?;

    if !output.success() {
        let message = match output.message() {
            "" => LIST_FAILED.to_string(),
            text => text.to_string(),
        };
        return Err(Error::Enumeration { message });
    }

    let snapshot = parse_device_table(&output.stdout);
    debug!("Enumerated {} device(s)", snapshot.len());
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ToolOutput;
    use common::test_utils::{Scripted, ScriptedRunner, render_table, token};

    const TIMEOUT: Duration = Duration::from_secs(20);

    #[tokio::test]
    async fn test_fetch_parses_output() {
        let runner = ScriptedRunner::new();
        runner.on("list", Scripted::ok(render_table(&[token("2-4", "Shared")])));

        let snapshot = fetch_snapshot(&runner, TIMEOUT).await.unwrap();
        assert_eq!(snapshot, vec![token("2-4", "Shared")]);
        assert_eq!(runner.calls(), vec![vec!["list".to_string()]]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_uses_stderr() {
        let runner = ScriptedRunner::new();
        runner.on("list", Scripted::fail("usbipd: error: access denied\n"));

        let err = fetch_snapshot(&runner, TIMEOUT).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Device enumeration failed: usbipd: error: access denied"
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_falls_back_to_stdout_then_fixed_text() {
        let runner = ScriptedRunner::new();
        runner.push(
            "list",
            Scripted::Output(ToolOutput {
                status: 2,
                stdout: "service not running".to_string(),
                stderr: String::new(),
            }),
        );
        runner.push("list", Scripted::Output(ToolOutput::failed(1, "")));

        let first = fetch_snapshot(&runner, TIMEOUT).await.unwrap_err();
        assert!(matches!(first, Error::Enumeration { ref message } if message == "service not running"));

        let second = fetch_snapshot(&runner, TIMEOUT).await.unwrap_err();
        assert!(matches!(second, Error::Enumeration { ref message } if message == LIST_FAILED));
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let runner = ScriptedRunner::new();
        runner.on("list", Scripted::Timeout);

        let err = fetch_snapshot(&runner, TIMEOUT).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
