// ABOUTME: Built-in module tests over a scripted executor.
// ABOUTME: Focus is idempotency: fresh hosts change, converged hosts do not.

mod support;

use caravel::config::ProjectConfig;
use caravel::module::{
    Change, CertsModule, CoreModule, DeployFilesModule, HostContext, Module, ModuleError,
    SystemdModule,
};
use sha2::{Digest, Sha256};
use support::{host, output, project_config, test_artifact, ScriptedExecutor};
use tempfile::TempDir;

fn ctx<'a>(
    target: &'a caravel::inventory::HostTarget,
    config: &'a ProjectConfig,
    project_dir: &'a std::path::Path,
    exec: &'a ScriptedExecutor,
) -> HostContext<'a> {
    HostContext {
        target,
        config,
        project_dir,
        exec,
    }
}

/// Test: on a fresh host the core module creates the user and installs the
/// missing base packages.
#[tokio::test]
async fn core_configure_provisions_fresh_host() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let exec = ScriptedExecutor::new("web-1")
        .on("id -u", output(1, ""))
        .on("command -v", output(1, ""));

    let change = CoreModule
        .configure(&ctx(&target, &config, dir.path(), &exec))
        .await
        .unwrap();

    assert_eq!(change, Change::Changed);
    assert!(exec.ran("sudo useradd --create-home --shell /bin/bash app"));
    assert!(exec.ran("sudo apt-get install -y -q git curl wget"));
}

/// Test: rerunning configure against a converged host reports Unchanged and
/// issues no mutating command.
#[tokio::test]
async fn core_configure_converged_host_is_unchanged() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let exec = ScriptedExecutor::new("web-1");

    let change = CoreModule
        .configure(&ctx(&target, &config, dir.path(), &exec))
        .await
        .unwrap();

    assert_eq!(change, Change::Unchanged);
    assert!(!exec.ran("sudo"));
}

/// Test: deploy skips upload and extraction when the recorded revision and
/// the remote bundle checksum both match the artifact.
#[tokio::test]
async fn core_deploy_skips_when_revision_and_checksum_match() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());
    let exec = ScriptedExecutor::new("web-1")
        .on(".caravel-revision", output(0, "abc123def456\n"))
        .on(
            "sha256sum",
            output(0, "f00dfeed  /home/deploy/tars/testapp-abc123def456.tar.gz"),
        );

    let change = CoreModule
        .deploy(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Unchanged);
    assert!(exec.uploads.lock().is_empty());
    assert!(!exec.ran("tar -xzf"));
}

/// Test: deploy on a stale host uploads the bundle, extracts it into the app
/// tree, and records the new revision.
#[tokio::test]
async fn core_deploy_uploads_and_extracts_stale_host() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());
    let exec = ScriptedExecutor::new("web-1").on(".caravel-revision", output(1, ""));

    let change = CoreModule
        .deploy(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Changed);
    let uploads = exec.uploads.lock();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].1, "/home/deploy/tars/testapp-abc123def456.tar.gz");
    drop(uploads);
    assert!(exec.ran("sudo tar -xzf"));
    assert!(exec.ran("sudo chown -R app:app /home/app/apps/testapp"));
    assert!(exec.ran("echo 'abc123def456' | sudo tee"));
}

/// Test: verify fails when no revision marker exists on the host.
#[tokio::test]
async fn core_verify_fails_without_revision_marker() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let exec = ScriptedExecutor::new("web-1").on("test -s", output(1, ""));

    let err = CoreModule
        .verify(&ctx(&target, &config, dir.path(), &exec))
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Failed(ref m) if m.contains(".caravel-revision")));
}

/// Test: the systemd restart after deploy always runs, reloading unit
/// definitions first.
#[tokio::test]
async fn systemd_deploy_after_restarts_services() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());
    let exec = ScriptedExecutor::new("web-1");

    let change = SystemdModule
        .deploy_after(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Changed);
    assert!(exec.ran("sudo systemctl daemon-reload"));
    assert!(exec.ran("sudo systemctl restart testapp"));
}

/// Test: systemd verify reports the inactive service by name.
#[tokio::test]
async fn systemd_verify_fails_on_inactive_service() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let exec = ScriptedExecutor::new("web-1").on("is-active", output(3, ""));

    let err = SystemdModule
        .verify(&ctx(&target, &config, dir.path(), &exec))
        .await
        .unwrap_err();

    assert!(matches!(err, ModuleError::Failed(ref m) if m.contains("testapp")));
}

/// Test: sync-certs renews every domain unconditionally.
#[tokio::test]
async fn certs_sync_renews_all_domains() {
    let mut target = host("web-1");
    target.domains = vec!["web-1.tail.net".to_string(), "alt.tail.net".to_string()];
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let exec = ScriptedExecutor::new("web-1");

    let change = CertsModule
        .sync_certs(&ctx(&target, &config, dir.path(), &exec))
        .await
        .unwrap();

    assert_eq!(change, Change::Changed);
    assert!(exec.ran("sudo tailscale cert web-1.tail.net"));
    assert!(exec.ran("sudo tailscale cert alt.tail.net"));
}

/// Test: certs deploy only issues certificates that are missing on the host.
#[tokio::test]
async fn certs_deploy_issues_only_missing_certificates() {
    let mut target = host("web-1");
    target.domains = vec!["web-1.tail.net".to_string(), "alt.tail.net".to_string()];
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());
    let exec = ScriptedExecutor::new("web-1").on("alt.tail.net.crt", output(1, ""));

    let change = CertsModule
        .deploy(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Changed);
    assert!(!exec.ran("sudo tailscale cert web-1.tail.net"));
    assert!(exec.ran("sudo tailscale cert alt.tail.net"));
}

/// Test: overlay files whose remote checksum differs are staged and installed
/// at their absolute destination.
#[tokio::test]
async fn deploy_files_places_changed_overlay_file() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());

    let overlay = dir.path().join("deploy_files/staging/etc/testapp");
    std::fs::create_dir_all(&overlay).unwrap();
    std::fs::write(overlay.join("app.conf"), b"listen = 8080\n").unwrap();

    let exec = ScriptedExecutor::new("web-1");
    let change = DeployFilesModule
        .deploy_after(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Changed);
    let uploads = exec.uploads.lock();
    assert_eq!(
        uploads[0].1,
        "/home/deploy/.caravel/overlay/etc/testapp/app.conf"
    );
    drop(uploads);
    assert!(exec.ran(
        "sudo install -D -m 0644 /home/deploy/.caravel/overlay/etc/testapp/app.conf /etc/testapp/app.conf"
    ));
}

/// Test: overlay files already matching the remote checksum are not
/// re-uploaded.
#[tokio::test]
async fn deploy_files_skips_unchanged_overlay_file() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());

    let payload = b"listen = 8080\n";
    let overlay = dir.path().join("deploy_files/staging/etc/testapp");
    std::fs::create_dir_all(&overlay).unwrap();
    std::fs::write(overlay.join("app.conf"), payload).unwrap();

    let checksum = hex::encode(Sha256::digest(payload));
    let exec = ScriptedExecutor::new("web-1").on(
        "sha256sum /etc/testapp/app.conf",
        output(0, &format!("{checksum}  /etc/testapp/app.conf")),
    );

    let change = DeployFilesModule
        .deploy_after(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Unchanged);
    assert!(exec.uploads.lock().is_empty());
}

/// Test: a missing overlay directory for the environment is a quiet no-op.
#[tokio::test]
async fn deploy_files_without_overlay_is_unchanged() {
    let target = host("web-1");
    let config = project_config();
    let dir = TempDir::new().unwrap();
    let artifact = test_artifact(dir.path());
    let exec = ScriptedExecutor::new("web-1");

    let change = DeployFilesModule
        .deploy_after(&ctx(&target, &config, dir.path(), &exec), &artifact)
        .await
        .unwrap();

    assert_eq!(change, Change::Unchanged);
    assert!(exec.commands.lock().is_empty());
}
