// ABOUTME: Module contract - pluggable units of deployment logic with fixed lifecycle hooks.
// ABOUTME: Hooks are idempotent by contract and report whether they changed the host.

mod certs;
mod core;
mod deploy_files;
mod registry;
mod systemd;

pub use certs::CertsModule;
pub use core::CoreModule;
pub use deploy_files::DeployFilesModule;
pub use registry::{Registry, RegistryError};
pub use systemd::SystemdModule;

use crate::artifact::Artifact;
use crate::config::ProjectConfig;
use crate::exec::{CommandOutput, ExecError, Executor};
use crate::inventory::HostTarget;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Everything a hook may touch on one host.
pub struct HostContext<'a> {
    pub target: &'a HostTarget,
    pub config: &'a ProjectConfig,
    pub project_dir: &'a Path,
    pub exec: &'a dyn Executor,
}

/// The idempotency signal: did this hook alter host state?
///
/// Invoking the same hook twice against a host already in the target state
/// must yield `Unchanged` the second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Changed,
    Unchanged,
}

impl Change {
    /// Combine step outcomes: a hook changed the host if any step did.
    pub fn merge(self, other: Change) -> Change {
        if self == Change::Changed || other == Change::Changed {
            Change::Changed
        } else {
            Change::Unchanged
        }
    }
}

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("`{command}` exited with {exit_code}: {stderr}")]
    CommandExit {
        command: String,
        exit_code: u32,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

pub type HookResult = std::result::Result<Change, ModuleError>;

/// A unit of deployment logic.
///
/// Modules implement only the hooks they care about; every hook defaults to a
/// no-op. Within a phase, modules run strictly in registration order, so a
/// module may rely on filesystem or service state left by an earlier module
/// in the same phase.
#[async_trait]
pub trait Module: Send + Sync {
    /// Name used in reports and ordering diagnostics.
    fn name(&self) -> &'static str;

    async fn configure(&self, _ctx: &HostContext<'_>) -> HookResult {
        Ok(Change::Unchanged)
    }

    async fn deploy_before(&self, _ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        Ok(Change::Unchanged)
    }

    async fn deploy(&self, _ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        Ok(Change::Unchanged)
    }

    async fn deploy_after(&self, _ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        Ok(Change::Unchanged)
    }

    async fn verify(&self, _ctx: &HostContext<'_>) -> HookResult {
        Ok(Change::Unchanged)
    }

    /// Renew certificates out of band. Only runs in cert-sync invocations.
    async fn sync_certs(&self, _ctx: &HostContext<'_>) -> HookResult {
        Ok(Change::Unchanged)
    }
}

/// Run a command and require exit 0.
///
/// Any non-zero exit is a module failure unless the module tolerates the
/// specific code itself (use `exec` directly for that).
pub(crate) async fn run_checked(
    exec: &dyn Executor,
    command: &str,
) -> std::result::Result<CommandOutput, ModuleError> {
    let output = exec.exec(command).await?;
    if !output.success() {
        return Err(ModuleError::CommandExit {
            command: command.to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Probe host state without failing: nonzero exit means "not in state".
pub(crate) async fn probe(
    exec: &dyn Executor,
    command: &str,
) -> std::result::Result<bool, ModuleError> {
    let output = exec.exec(command).await?;
    Ok(output.success())
}
