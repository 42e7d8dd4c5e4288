// ABOUTME: Core module - application user, base packages, artifact upload and extraction.
// ABOUTME: Every step probes host state first so converged hosts report Unchanged.

use super::{probe, run_checked, Change, HookResult, HostContext, Module};
use crate::artifact::Artifact;
use async_trait::async_trait;

const BASE_PACKAGES: &[&str] = &["git", "curl", "wget"];

/// Marker file recording which artifact identity is extracted in the app
/// tree. This is the module's own bookkeeping, kept on the host; the engine
/// itself stays stateless between invocations.
fn revision_marker(app_path: &str) -> String {
    format!("{app_path}/.caravel-revision")
}

pub struct CoreModule;

#[async_trait]
impl Module for CoreModule {
    fn name(&self) -> &'static str {
        "core"
    }

    async fn configure(&self, ctx: &HostContext<'_>) -> HookResult {
        let app_user = &ctx.target.app_user;
        let mut change = Change::Unchanged;

        // Application user with home and shell.
        if !probe(ctx.exec, &format!("id -u {app_user}")).await? {
            run_checked(
                ctx.exec,
                &format!("sudo useradd --create-home --shell /bin/bash {app_user}"),
            )
            .await?;
            change = Change::Changed;
        }

        // Base packages, installed in one go when any is missing.
        let mut missing = Vec::new();
        for package in BASE_PACKAGES {
            if !probe(ctx.exec, &format!("command -v {package}")).await? {
                missing.push(*package);
            }
        }
        if !missing.is_empty() {
            run_checked(ctx.exec, "sudo apt-get update -q").await?;
            run_checked(
                ctx.exec,
                &format!("sudo apt-get install -y -q {}", missing.join(" ")),
            )
            .await?;
            change = Change::Changed;
        }

        if let Some(version) = &ctx.config.python_version {
            change = change.merge(self.install_python(ctx, version).await?);
        }

        Ok(change)
    }

    async fn deploy_before(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        let app_user = &ctx.target.app_user;
        let tars = ctx.config.tars_path();
        let app_path = ctx.config.app_path();
        let mut change = Change::Unchanged;

        if !probe(ctx.exec, &format!("test -d {tars}")).await? {
            run_checked(ctx.exec, &format!("mkdir -p {tars}")).await?;
            change = Change::Changed;
        }

        if !probe(ctx.exec, &format!("test -d {app_path}")).await? {
            run_checked(ctx.exec, &format!("sudo mkdir -p {app_path}")).await?;
            run_checked(
                ctx.exec,
                &format!("sudo chown {app_user}:{app_user} {app_path}"),
            )
            .await?;
            change = Change::Changed;
        }

        Ok(change)
    }

    async fn deploy(&self, ctx: &HostContext<'_>, artifact: &Artifact) -> HookResult {
        let app_user = &ctx.target.app_user;
        let app_path = ctx.config.app_path();
        let remote_bundle = format!("{}/{}", ctx.config.tars_path(), artifact.file_name());
        let marker = revision_marker(&app_path);

        // Converged when the extracted revision matches and the uploaded
        // bundle is byte-identical to the one we built.
        let deployed = ctx
            .exec
            .exec(&format!("cat {marker} 2>/dev/null"))
            .await?;
        if deployed.success() && deployed.stdout.trim() == artifact.identity {
            let sum = ctx.exec.exec(&format!("sha256sum {remote_bundle}")).await?;
            if sum.success() && sum.stdout.starts_with(&artifact.checksum) {
                return Ok(Change::Unchanged);
            }
        }

        ctx.exec.upload(&artifact.path, &remote_bundle).await?;

        run_checked(
            ctx.exec,
            &format!("sudo tar -xzf {remote_bundle} -C {app_path}"),
        )
        .await?;
        run_checked(
            ctx.exec,
            &format!("sudo chown -R {app_user}:{app_user} {app_path}"),
        )
        .await?;
        run_checked(
            ctx.exec,
            &format!("echo '{}' | sudo tee {marker} > /dev/null", artifact.identity),
        )
        .await?;

        Ok(Change::Changed)
    }

    async fn verify(&self, ctx: &HostContext<'_>) -> HookResult {
        let app_path = ctx.config.app_path();
        let marker = revision_marker(&app_path);
        if !probe(ctx.exec, &format!("test -s {marker}")).await? {
            return Err(super::ModuleError::Failed(format!(
                "no deployed revision recorded at {marker}"
            )));
        }
        Ok(Change::Unchanged)
    }
}

impl CoreModule {
    async fn install_python(&self, ctx: &HostContext<'_>, version: &str) -> HookResult {
        if probe(ctx.exec, &format!("command -v python{version}")).await? {
            return Ok(Change::Unchanged);
        }
        run_checked(
            ctx.exec,
            &format!(
                "sudo apt-get install -y -q python{version} python{version}-venv python3-pip"
            ),
        )
        .await?;
        Ok(Change::Changed)
    }
}
