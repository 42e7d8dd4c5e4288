// ABOUTME: Orchestration engine - fans out per-host pipelines over the module registry.
// ABOUTME: Hosts are independent; phases and modules within a host are strictly sequential.

mod phase;
mod report;

pub use phase::Phase;
pub use report::{
    HostReport, HostStatus, InvocationResult, InvocationStatus, ModuleOutcome, ModuleReport,
    PhaseReport,
};

use crate::artifact::Artifact;
use crate::config::ProjectConfig;
use crate::exec::Connector;
use crate::inventory::HostTarget;
use crate::module::{Change, HostContext, Module, ModuleError, Registry};
use futures::stream::{self, StreamExt};
use nonempty::NonEmpty;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_HOST_LIMIT: usize = 4;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a deploy phase was selected but no artifact was built")]
    ArtifactRequired,
}

/// Operator intent, mapped onto a phase subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Configure,
    Deploy,
    Verify,
    CertSync,
}

impl Mode {
    /// Active phases for this mode, always in global pipeline order.
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Mode::Configure => &[Phase::Configure],
            Mode::Deploy => &[
                Phase::DeployBefore,
                Phase::Deploy,
                Phase::DeployAfter,
                Phase::Verify,
            ],
            Mode::Verify => &[Phase::Verify],
            Mode::CertSync => &[Phase::CertSync],
        }
    }
}

/// A validated invocation plan: which phases run, with which artifact.
///
/// The artifact, when present, is shared read-only by every host pipeline
/// and is never mutated after the build.
#[derive(Debug)]
pub struct Plan {
    phases: &'static [Phase],
    artifact: Option<Arc<Artifact>>,
}

impl Plan {
    pub fn for_mode(mode: Mode, artifact: Option<Arc<Artifact>>) -> Result<Self, EngineError> {
        let phases = mode.phases();
        if phases.iter().any(|p| p.requires_artifact()) && artifact.is_none() {
            return Err(EngineError::ArtifactRequired);
        }
        Ok(Self { phases, artifact })
    }

    pub fn phases(&self) -> &[Phase] {
        self.phases
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_deref()
    }
}

/// Operator-initiated cancellation.
///
/// Once triggered, no new host pipeline starts; an in-flight pipeline
/// finishes its current module invocation (never killed mid-command) and
/// halts before the next phase transition.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct Engine {
    config: Arc<ProjectConfig>,
    project_dir: PathBuf,
    registry: Arc<Registry>,
    connector: Arc<dyn Connector>,
    limit: usize,
    cancel: CancelFlag,
    fail_fast: bool,
}

impl Engine {
    pub fn new(
        config: Arc<ProjectConfig>,
        project_dir: PathBuf,
        registry: Arc<Registry>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let fail_fast = config.fail_fast;
        Self {
            config,
            project_dir,
            registry,
            connector,
            limit: DEFAULT_HOST_LIMIT,
            cancel: CancelFlag::new(),
            fail_fast,
        }
    }

    /// Cap on concurrently running host pipelines.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run the plan against every target. One host's failure never blocks or
    /// alters another host's pipeline; the result is the same whether hosts
    /// run concurrently or one after another.
    pub async fn run(&self, targets: NonEmpty<HostTarget>, plan: &Plan) -> InvocationResult {
        let reports: Vec<HostReport> = stream::iter(
            targets
                .into_iter()
                .map(|target| self.run_host(target, plan)),
        )
        .buffer_unordered(self.limit)
        .collect()
        .await;

        InvocationResult {
            hosts: reports.into_iter().map(|r| (r.host.clone(), r)).collect(),
            cancelled: self.cancel.is_cancelled(),
        }
    }

    async fn run_host(&self, target: HostTarget, plan: &Plan) -> HostReport {
        let first_phase = plan.phases()[0];

        if self.cancel.is_cancelled() {
            return HostReport {
                host: target.name,
                phases: vec![],
                status: HostStatus::Aborted { phase: first_phase },
                error: Some("cancelled before pipeline start".to_string()),
            };
        }

        tracing::info!(host = %target.name, "starting pipeline");

        let exec = match self.connector.connect(&target).await {
            Ok(exec) => exec,
            Err(e) => {
                tracing::error!(host = %target.name, error = %e, "connection failed");
                return HostReport {
                    host: target.name,
                    phases: vec![],
                    status: HostStatus::Aborted { phase: first_phase },
                    error: Some(e.to_string()),
                };
            }
        };

        let ctx = HostContext {
            target: &target,
            config: &self.config,
            project_dir: &self.project_dir,
            exec: exec.as_ref(),
        };

        let mut phases = Vec::with_capacity(plan.phases().len());
        let mut status = HostStatus::Done;

        for &phase in plan.phases() {
            if self.cancel.is_cancelled() {
                status = HostStatus::Aborted { phase };
                break;
            }

            tracing::debug!(host = %target.name, phase = %phase, "entering phase");
            let report = self.run_phase(&ctx, phase, plan.artifact()).await;
            let stop = report.failed() || report.has_skipped();
            phases.push(report);

            if stop {
                status = HostStatus::Aborted { phase };
                break;
            }
        }

        if let Err(e) = exec.close().await {
            tracing::warn!(host = %target.name, error = %e, "unclean disconnect");
        }

        match &status {
            HostStatus::Done => tracing::info!(host = %target.name, "pipeline done"),
            HostStatus::Aborted { phase } => {
                tracing::warn!(host = %target.name, phase = %phase, "pipeline aborted")
            }
        }

        HostReport {
            host: target.name,
            phases,
            status,
            error: None,
        }
    }

    /// Run one phase: every registered module in order. After a failure the
    /// remaining modules of the phase still run so all problems surface in
    /// one report; `fail_fast` switches that to stop-at-first-failure.
    /// Either way no later phase executes for this host.
    async fn run_phase(
        &self,
        ctx: &HostContext<'_>,
        phase: Phase,
        artifact: Option<&Artifact>,
    ) -> PhaseReport {
        let mut modules = Vec::with_capacity(self.registry.len());
        let mut failed = false;

        for module in self.registry.modules() {
            if self.cancel.is_cancelled() || (failed && self.fail_fast) {
                modules.push(ModuleReport {
                    module: module.name().to_string(),
                    outcome: ModuleOutcome::Skipped,
                });
                continue;
            }

            let outcome = match invoke(module.as_ref(), ctx, phase, artifact).await {
                Ok(Change::Changed) => ModuleOutcome::Changed,
                Ok(Change::Unchanged) => ModuleOutcome::Unchanged,
                Err(e) => {
                    failed = true;
                    tracing::error!(
                        host = %ctx.target.name,
                        phase = %phase,
                        module = module.name(),
                        error = %e,
                        "module failed"
                    );
                    ModuleOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            tracing::debug!(
                host = %ctx.target.name,
                phase = %phase,
                module = module.name(),
                ?outcome,
                "module finished"
            );

            modules.push(ModuleReport {
                module: module.name().to_string(),
                outcome,
            });
        }

        PhaseReport { phase, modules }
    }
}

async fn invoke(
    module: &dyn Module,
    ctx: &HostContext<'_>,
    phase: Phase,
    artifact: Option<&Artifact>,
) -> crate::module::HookResult {
    match phase {
        Phase::Configure => module.configure(ctx).await,
        Phase::Verify => module.verify(ctx).await,
        Phase::CertSync => module.sync_certs(ctx).await,
        Phase::DeployBefore | Phase::Deploy | Phase::DeployAfter => match artifact {
            Some(artifact) => match phase {
                Phase::DeployBefore => module.deploy_before(ctx, artifact).await,
                Phase::Deploy => module.deploy(ctx, artifact).await,
                _ => module.deploy_after(ctx, artifact).await,
            },
            // Plan validation makes this unreachable in practice.
            None => Err(ModuleError::Failed(
                "no artifact available for deploy phase".to_string(),
            )),
        },
    }
}
