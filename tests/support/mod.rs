// ABOUTME: Shared test support - scripted executors, recording modules, fixtures.
// ABOUTME: No network: the executor boundary is replaced with in-memory fakes.

#![allow(dead_code)]

use async_trait::async_trait;
use caravel::artifact::Artifact;
use caravel::config::ProjectConfig;
use caravel::engine::Phase;
use caravel::exec::{CommandOutput, Connector, ExecError, Executor};
use caravel::inventory::HostTarget;
use caravel::module::{Change, HookResult, HostContext, Module, ModuleError};
use chrono::Utc;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

pub fn host(name: &str) -> HostTarget {
    HostTarget {
        name: name.to_string(),
        ssh_host: format!("{name}.example.test"),
        ssh_port: 22,
        ssh_user: "deploy".to_string(),
        app_user: "app".to_string(),
        env: "staging".to_string(),
        services: vec!["testapp".to_string()],
        domains: vec![],
    }
}

pub fn project_config() -> ProjectConfig {
    ProjectConfig::from_yaml("project: testapp").unwrap()
}

pub fn test_artifact(dir: &Path) -> Artifact {
    let path = dir.join("testapp-abc123def456.tar.gz");
    std::fs::write(&path, b"bundle-bytes").unwrap();
    Artifact {
        identity: "abc123def456".to_string(),
        built_at: Utc::now(),
        path,
        checksum: "f00dfeed".to_string(),
    }
}

fn ok_output() -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

pub fn output(exit_code: u32, stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// Executor answering from a substring-matched script; everything else
/// succeeds with empty output. Records every command and upload.
pub struct ScriptedExecutor {
    host: String,
    rules: Vec<(String, CommandOutput)>,
    pub commands: Arc<Mutex<Vec<(String, String)>>>,
    pub uploads: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedExecutor {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            rules: Vec::new(),
            commands: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// First rule whose needle appears in the command wins.
    pub fn on(mut self, needle: &str, response: CommandOutput) -> Self {
        self.rules.push((needle.to_string(), response));
        self
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands
            .lock()
            .iter()
            .any(|(_, c)| c.contains(needle))
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput, ExecError> {
        self.commands
            .lock()
            .push((self.host.clone(), command.to_string()));
        for (needle, response) in &self.rules {
            if command.contains(needle) {
                return Ok(response.clone());
            }
        }
        Ok(ok_output())
    }

    async fn upload(&self, _local: &Path, remote: &str) -> Result<(), ExecError> {
        self.uploads
            .lock()
            .push((self.host.clone(), remote.to_string()));
        Ok(())
    }
}

/// Connector handing out scripted executors, optionally refusing some hosts.
pub struct ScriptedConnector {
    refuse: Vec<String>,
    pub connects: Arc<Mutex<Vec<String>>>,
    pub uploads: Arc<Mutex<Vec<(String, String)>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            refuse: Vec::new(),
            connects: Arc::new(Mutex::new(Vec::new())),
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn refuse(mut self, host: &str) -> Self {
        self.refuse.push(host.to_string());
        self
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, target: &HostTarget) -> Result<Box<dyn Executor>, ExecError> {
        self.connects.lock().push(target.name.clone());
        if self.refuse.contains(&target.name) {
            return Err(ExecError::Connection(format!(
                "{}: connection refused",
                target.ssh_host
            )));
        }
        let mut executor = ScriptedExecutor::new(&target.name);
        executor.uploads = Arc::clone(&self.uploads);
        Ok(Box::new(executor))
    }
}

pub type Trace = Arc<Mutex<Vec<(String, Phase, &'static str)>>>;

/// Module that records every hook invocation and fails on request.
pub struct RecordingModule {
    name: &'static str,
    trace: Trace,
    fail_at: Option<(String, Phase)>,
}

impl RecordingModule {
    pub fn new(name: &'static str, trace: &Trace) -> Self {
        Self {
            name,
            trace: Arc::clone(trace),
            fail_at: None,
        }
    }

    pub fn fail_at(mut self, host: &str, phase: Phase) -> Self {
        self.fail_at = Some((host.to_string(), phase));
        self
    }

    fn record(&self, ctx: &HostContext<'_>, phase: Phase) -> HookResult {
        self.trace
            .lock()
            .push((ctx.target.name.clone(), phase, self.name));
        if let Some((host, fail_phase)) = &self.fail_at {
            if host == &ctx.target.name && *fail_phase == phase {
                return Err(ModuleError::Failed("simulated nonzero exit".to_string()));
            }
        }
        Ok(Change::Changed)
    }
}

#[async_trait]
impl Module for RecordingModule {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn configure(&self, ctx: &HostContext<'_>) -> HookResult {
        self.record(ctx, Phase::Configure)
    }

    async fn deploy_before(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        self.record(ctx, Phase::DeployBefore)
    }

    async fn deploy(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        self.record(ctx, Phase::Deploy)
    }

    async fn deploy_after(&self, ctx: &HostContext<'_>, _artifact: &Artifact) -> HookResult {
        self.record(ctx, Phase::DeployAfter)
    }

    async fn verify(&self, ctx: &HostContext<'_>) -> HookResult {
        self.record(ctx, Phase::Verify)
    }

    async fn sync_certs(&self, ctx: &HostContext<'_>) -> HookResult {
        self.record(ctx, Phase::CertSync)
    }
}

pub fn new_trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

/// Trace entries for one host and phase, in invocation order.
pub fn trace_for(trace: &Trace, host: &str, phase: Phase) -> Vec<&'static str> {
    trace
        .lock()
        .iter()
        .filter(|(h, p, _)| h == host && *p == phase)
        .map(|(_, _, m)| *m)
        .collect()
}
