//! External operation gateway
//!
//! Each operation is one bounded call to the sharing tool (attach is bind
//! followed by attach). The gateway keeps no state between calls.

use common::tool::args;
use common::{Error, OperationStage, Result, ToolOutput, ToolRunner};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const ALREADY_BOUND: &str = "already bound";

/// Bind, unbind, attach and detach against single devices
pub struct Gateway<R> {
    runner: Arc<R>,
    timeout: Duration,
}

impl<R> Clone for Gateway<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            timeout: self.timeout,
        }
    }
}

impl<R: ToolRunner> Gateway<R> {
    /// Create a gateway whose calls are each bounded by `timeout`
    pub fn new(runner: Arc<R>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    /// Enable sharing; an "already bound" reply counts as success
    pub async fn bind(&self, busid: &str) -> Result<String> {
        let output = self.call(&["bind", "--busid", busid]).await?;
        let already_bound = output.combined().to_lowercase().contains(ALREADY_BOUND);

        if !output.success() && !already_bound {
            return Err(failure(OperationStage::Bind, busid, &output));
        }
        if already_bound {
            debug!("{} already bound", busid);
        }
        Ok(detail(&output, "Sharing enabled (bind OK)."))
    }

    /// Disable sharing
    pub async fn unbind(&self, busid: &str) -> Result<String> {
        let output = self.call(&["unbind", "--busid", busid]).await?;
        if !output.success() {
            return Err(failure(OperationStage::Unbind, busid, &output));
        }
        Ok(detail(&output, "Sharing disabled (unbind OK)."))
    }

    /// Bind, then attach to the guest
    ///
    /// A bind failure is reported with [`OperationStage::Bind`] and the
    /// attach call is not made.
    pub async fn attach(&self, busid: &str) -> Result<String> {
        self.bind(busid).await?;

        let output = self.call(&["attach", "--wsl", "--busid", busid]).await?;
        if !output.success() {
            return Err(failure(OperationStage::Attach, busid, &output));
        }
        Ok(detail(&output, "Attach OK."))
    }

    /// Detach from the guest
    pub async fn detach(&self, busid: &str) -> Result<String> {
        let output = self.call(&["detach", "--busid", busid]).await?;
        if !output.success() {
            return Err(failure(OperationStage::Detach, busid, &output));
        }
        Ok(detail(&output, "Detach OK."))
    }

    async fn call(&self, parts: &[&str]) -> Result<ToolOutput> {
        self.runner.run(args(parts), self.timeout).await
    }
}

fn detail(output: &ToolOutput, default: &str) -> String {
    match output.stdout.trim() {
        "" => default.to_string(),
        text => text.to_string(),
    }
}

fn failure(stage: OperationStage, busid: &str, output: &ToolOutput) -> Error {
    let message = match output.message() {
        "" => format!("exit code {}", output.status),
        text => text.to_string(),
    };
    Error::Operation {
        stage,
        busid: busid.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{Scripted, ScriptedRunner};

    fn gateway() -> Gateway<ScriptedRunner> {
        Gateway::new(Arc::new(ScriptedRunner::new()), Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_default_success_messages() {
        let gw = gateway();
        assert_eq!(gw.bind("1-1").await.unwrap(), "Sharing enabled (bind OK).");
        assert_eq!(gw.unbind("1-1").await.unwrap(), "Sharing disabled (unbind OK).");
        assert_eq!(gw.attach("1-1").await.unwrap(), "Attach OK.");
        assert_eq!(gw.detach("1-1").await.unwrap(), "Detach OK.");
    }

    #[tokio::test]
    async fn test_tool_output_is_returned() {
        let gw = gateway();
        gw.runner().on(
            "attach",
            Scripted::ok("usbipd: info: Using IP address 172.22.0.1 to reach the host.\n"),
        );
        assert_eq!(
            gw.attach("2-4").await.unwrap(),
            "usbipd: info: Using IP address 172.22.0.1 to reach the host."
        );
    }

    #[tokio::test]
    async fn test_failure_without_text_reports_exit_code() {
        let gw = gateway();
        gw.runner().on(
            "detach",
            Scripted::Output(ToolOutput::failed(5, "")),
        );
        let err = gw.detach("2-4").await.unwrap_err();
        assert_eq!(err.to_string(), "detach failed for 2-4: exit code 5");
    }
}
