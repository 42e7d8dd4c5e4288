// ABOUTME: Systemd module - enables, restarts, and verifies the host's services.
// ABOUTME: The deploy-after restart is an always-runs step, not a convergence check.

use super::{probe, run_checked, Change, HookResult, HostContext, Module, ModuleError};
use crate::artifact::Artifact;
use async_trait::async_trait;

pub struct SystemdModule;

#[async_trait]
impl Module for SystemdModule {
    fn name(&self) -> &'static str {
        "systemd"
    }

    async fn configure(&self, ctx: &HostContext<'_>) -> HookResult {
        let mut change = Change::Unchanged;
        for service in &ctx.target.services {
            if !probe(ctx.exec, &format!("systemctl is-enabled --quiet {service}")).await? {
                run_checked(ctx.exec, &format!("sudo systemctl enable {service}")).await?;
                change = Change::Changed;
            }
        }
        Ok(change)
    }

    async fn deploy_after(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        if ctx.target.services.is_empty() {
            return Ok(Change::Unchanged);
        }

        // Unit files may have just been replaced by the overlay copy.
        run_checked(ctx.exec, "sudo systemctl daemon-reload").await?;

        for service in &ctx.target.services {
            tracing::info!(host = %ctx.target.name, service = %service, "restarting service");
            run_checked(ctx.exec, &format!("sudo systemctl restart {service}")).await?;
        }
        Ok(Change::Changed)
    }

    async fn verify(&self, ctx: &HostContext<'_>) -> HookResult {
        for service in &ctx.target.services {
            if !probe(ctx.exec, &format!("systemctl is-active --quiet {service}")).await? {
                return Err(ModuleError::Failed(format!(
                    "service '{service}' is not active"
                )));
            }
        }
        Ok(Change::Unchanged)
    }
}
