// ABOUTME: Deploy-files module - copies the environment overlay tree onto host root paths.
// ABOUTME: Per-file checksum comparison keeps re-runs upload-free.

use super::{run_checked, Change, HookResult, HostContext, Module, ModuleError};
use crate::artifact::Artifact;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub struct DeployFilesModule;

#[async_trait]
impl Module for DeployFilesModule {
    fn name(&self) -> &'static str {
        "deploy-files"
    }

    async fn deploy_after(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        let overlay = ctx
            .project_dir
            .join(&ctx.config.deploy_files_dir)
            .join(&ctx.target.env);

        if !overlay.is_dir() {
            // No overlay for this environment.
            return Ok(Change::Unchanged);
        }

        let mut files = Vec::new();
        collect_files(&overlay, &overlay, &mut files)?;
        files.sort();

        let mut change = Change::Unchanged;
        for rel in &files {
            change = change.merge(self.place_file(ctx, &overlay, rel).await?);
        }
        Ok(change)
    }
}

impl DeployFilesModule {
    /// Copy one overlay file to its absolute destination (the overlay tree
    /// mirrors the host root). Uploads go through the ssh user's staging
    /// area, then move into place with sudo.
    async fn place_file(
        &self,
        ctx: &HostContext<'_>,
        overlay: &Path,
        rel: &Path,
    ) -> HookResult {
        let local = overlay.join(rel);
        let dest = format!("/{}", rel.display());

        let checksum = hex::encode(Sha256::digest(std::fs::read(&local)?));
        let current = ctx
            .exec
            .exec(&format!("sha256sum {dest} 2>/dev/null"))
            .await?;
        if current.success() && current.stdout.starts_with(&checksum) {
            return Ok(Change::Unchanged);
        }

        let staged = format!(
            "/home/{}/.caravel/overlay/{}",
            ctx.target.ssh_user,
            rel.display()
        );
        ctx.exec.upload(&local, &staged).await?;
        run_checked(ctx.exec, &format!("sudo install -D -m 0644 {staged} {dest}")).await?;

        tracing::debug!(host = %ctx.target.name, dest = %dest, "placed overlay file");
        Ok(Change::Changed)
    }
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<PathBuf>,
) -> std::result::Result<(), ModuleError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}
