// ABOUTME: Certs module - tailscale certificate issuance for a host's domains.
// ABOUTME: Deploy issues missing certificates; sync-certs force-renews them all.

use super::{probe, run_checked, Change, HookResult, HostContext, Module, ModuleError};
use crate::artifact::Artifact;
use async_trait::async_trait;

pub struct CertsModule;

impl CertsModule {
    fn ssl_dir(ctx: &HostContext<'_>) -> String {
        format!("/home/{}/.ssl", ctx.target.app_user)
    }
}

#[async_trait]
impl Module for CertsModule {
    fn name(&self) -> &'static str {
        "certs"
    }

    async fn configure(&self, ctx: &HostContext<'_>) -> HookResult {
        if ctx.target.domains.is_empty() {
            return Ok(Change::Unchanged);
        }

        let app_user = &ctx.target.app_user;
        let ssl_dir = Self::ssl_dir(ctx);
        if probe(ctx.exec, &format!("test -d {ssl_dir}")).await? {
            return Ok(Change::Unchanged);
        }
        run_checked(ctx.exec, &format!("sudo mkdir -p {ssl_dir}")).await?;
        run_checked(
            ctx.exec,
            &format!("sudo chown {app_user}:{app_user} {ssl_dir}"),
        )
        .await?;
        Ok(Change::Changed)
    }

    async fn deploy(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        let ssl_dir = Self::ssl_dir(ctx);
        let mut change = Change::Unchanged;
        for domain in &ctx.target.domains {
            if probe(ctx.exec, &format!("test -f {ssl_dir}/{domain}.crt")).await? {
                continue;
            }
            tracing::info!(host = %ctx.target.name, domain = %domain, "issuing certificate");
            run_checked(
                ctx.exec,
                &format!("cd {ssl_dir} && sudo tailscale cert {domain}"),
            )
            .await?;
            change = Change::Changed;
        }
        Ok(change)
    }

    async fn verify(&self, ctx: &HostContext<'_>) -> HookResult {
        let ssl_dir = Self::ssl_dir(ctx);
        for domain in &ctx.target.domains {
            if !probe(ctx.exec, &format!("test -f {ssl_dir}/{domain}.crt")).await? {
                return Err(ModuleError::Failed(format!(
                    "missing certificate for '{domain}'"
                )));
            }
        }
        Ok(Change::Unchanged)
    }

    async fn sync_certs(&self, ctx: &HostContext<'_>) -> HookResult {
        if ctx.target.domains.is_empty() {
            return Ok(Change::Unchanged);
        }

        let ssl_dir = Self::ssl_dir(ctx);
        for domain in &ctx.target.domains {
            tracing::info!(host = %ctx.target.name, domain = %domain, "renewing certificate");
            run_checked(
                ctx.exec,
                &format!("cd {ssl_dir} && sudo tailscale cert {domain}"),
            )
            .await?;
        }
        Ok(Change::Changed)
    }
}
