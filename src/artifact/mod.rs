// ABOUTME: Artifact builder - turns a source checkout state into one immutable bundle.
// ABOUTME: Shells out to git/tar; the bundle is built once and shared by every host.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

use crate::config::ProjectConfig;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown release '{0}': tag does not exist")]
    UnknownRelease(String),

    #[error("working tree has no commits to archive")]
    EmptyTree,

    #[error("{tool} failed: {message}")]
    Tool { tool: &'static str, message: String },

    #[error("built bundle is empty: {0}")]
    EmptyBundle(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// What source state the artifact is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Current on-disk working tree, uncommitted changes included.
    Local,
    /// The current branch tip; uncommitted changes are ignored.
    Latest,
    /// A pre-existing release tag.
    Release(String),
}

/// An immutable, content-identified deployment bundle.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Source identity: abbreviated commit hash, release tag, or a
    /// timestamp-based identity for local snapshots.
    pub identity: String,
    pub built_at: DateTime<Utc>,
    pub path: PathBuf,
    /// Hex sha256 of the bundle file. Used by modules to skip re-uploads
    /// and by tests to assert byte-identical delivery across hosts.
    pub checksum: String,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Build one artifact for the invocation. Never touches a remote host.
pub async fn build(config: &ProjectConfig, project_dir: &Path, mode: &BuildMode) -> Result<Artifact> {
    let staging = project_dir.join(&config.artifact_dir);
    std::fs::create_dir_all(&staging)?;

    let identity = match mode {
        BuildMode::Local => format!("local-{}", Utc::now().format("%Y%m%dT%H%M%SZ")),
        BuildMode::Latest => head_revision(project_dir).await?,
        BuildMode::Release(tag) => {
            verify_tag(project_dir, tag).await?;
            tag.replace('/', "-")
        }
    };

    let path = staging.join(format!("{}-{}.tar.gz", config.project, identity));

    match mode {
        BuildMode::Local => snapshot_working_tree(config, project_dir, &path).await?,
        BuildMode::Latest => archive_rev(project_dir, "HEAD", &path).await?,
        BuildMode::Release(tag) => archive_rev(project_dir, tag, &path).await?,
    }

    let bytes = std::fs::read(&path)?;
    if bytes.is_empty() {
        return Err(BuildError::EmptyBundle(path));
    }
    let checksum = hex::encode(Sha256::digest(&bytes));

    tracing::info!(identity = %identity, path = %path.display(), "built artifact");

    Ok(Artifact {
        identity,
        built_at: Utc::now(),
        path,
        checksum,
    })
}

/// Abbreviated hash of the current branch tip.
async fn head_revision(project_dir: &Path) -> Result<String> {
    let output = git(project_dir, &["rev-parse", "--short=12", "HEAD"]).await?;
    if !output.status.success() {
        // A repo with no commits cannot resolve HEAD.
        return Err(BuildError::EmptyTree);
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn verify_tag(project_dir: &Path, tag: &str) -> Result<()> {
    let refname = format!("refs/tags/{tag}");
    let output = git(project_dir, &["rev-parse", "--verify", "--quiet", &refname]).await?;
    if !output.status.success() {
        return Err(BuildError::UnknownRelease(tag.to_string()));
    }
    Ok(())
}

/// Export exactly one revision's tree. Version control metadata and anything
/// untracked (caches, local state) never ends up in the bundle.
async fn archive_rev(project_dir: &Path, rev: &str, out: &Path) -> Result<()> {
    let out_arg = out.to_string_lossy().into_owned();
    let output = git(
        project_dir,
        &["archive", "--format=tar.gz", "-o", &out_arg, rev],
    )
    .await?;
    if !output.status.success() {
        return Err(BuildError::Tool {
            tool: "git",
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Tarball of the working tree as it sits on disk. The exclude list is fixed
/// per invocation so the bundle content is deterministic for a given tree.
async fn snapshot_working_tree(
    config: &ProjectConfig,
    project_dir: &Path,
    out: &Path,
) -> Result<()> {
    let mut cmd = Command::new("tar");
    cmd.arg("-czf").arg(out);
    cmd.arg("--exclude=.git");
    cmd.arg(format!("--exclude=./{}", config.artifact_dir.display()));
    for exclude in &config.excludes {
        cmd.arg(format!("--exclude={exclude}"));
    }
    cmd.arg("-C").arg(project_dir).arg(".");
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = cmd.output().await.map_err(|e| BuildError::Tool {
        tool: "tar",
        message: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(BuildError::Tool {
            tool: "tar",
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

async fn git(project_dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .arg("-C")
        .arg(project_dir)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| BuildError::Tool {
            tool: "git",
            message: e.to_string(),
        })
}
