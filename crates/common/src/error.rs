//! Common error types

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Device operation that an [`Error::Operation`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationStage {
    /// Enable host-side sharing
    Bind,
    /// Disable host-side sharing
    Unbind,
    /// Attach to the guest environment
    Attach,
    /// Detach from the guest environment
    Detach,
}

impl fmt::Display for OperationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStage::Bind => write!(f, "bind"),
            OperationStage::Unbind => write!(f, "unbind"),
            OperationStage::Attach => write!(f, "attach"),
            OperationStage::Detach => write!(f, "detach"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Device enumeration failed: {message}")]
    Enumeration { message: String },

    #[error("{stage} failed for {busid}: {message}")]
    Operation {
        stage: OperationStage,
        busid: String,
        message: String,
    },

    #[error("Command `{command}` timed out after {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("Sharing tool not found: {}", .path.display())]
    ToolNotFound { path: PathBuf },

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stage of a failed device operation, if this is one
    pub fn stage(&self) -> Option<OperationStage> {
        match self {
            Error::Operation { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the error came from an external call exceeding its bound
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
