// ABOUTME: Remote executor boundary - run commands and transfer files on one host.
// ABOUTME: Modules only ever see these traits; SSH is one implementation behind them.

mod error;
mod ssh;

pub use error::{ExecError, Result};
pub use ssh::SshConnector;

use crate::inventory::HostTarget;
use async_trait::async_trait;
use std::path::Path;

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Command execution and file transfer against one connected host.
///
/// Every call is blocking from the pipeline's point of view: the engine does
/// not proceed past it until a typed result is known. Failures surface as
/// `ExecError`, never as a panic, and are never retried here - retry policy
/// belongs to the module that knows whether its operation is safe to repeat.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a command, capturing exit code, stdout, and stderr.
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    /// Upload a local file to a remote path, creating parent directories.
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;

    /// Cleanly disconnect. Called once at the end of a host pipeline;
    /// failures here are non-fatal and surface as diagnostics.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Produces one connected `Executor` per host pipeline.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &HostTarget) -> Result<Box<dyn Executor>>;
}
