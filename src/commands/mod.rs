// ABOUTME: Command implementations mapping operator intent onto engine invocations.
// ABOUTME: Shared here: config discovery, inventory resolution, engine setup.

mod configure;
mod deploy;
mod sync_certs;
mod verify;

pub use configure::configure;
pub use deploy::deploy;
pub use sync_certs::sync_certs;
pub use verify::verify;

use crate::cli::TargetArgs;
use caravel::config::ProjectConfig;
use caravel::engine::{Engine, Mode, Plan};
use caravel::error::Result;
use caravel::exec::SshConnector;
use caravel::inventory::{self, HostTarget};
use caravel::module::Registry;
use caravel::output::Output;
use nonempty::NonEmpty;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything resolved before any host is touched.
///
/// Resolution happens before the artifact build: an empty host selection
/// must fail without building anything.
pub(crate) struct Prepared {
    pub config: Arc<ProjectConfig>,
    pub project_dir: PathBuf,
    pub targets: NonEmpty<HostTarget>,
    pub registry: Arc<Registry>,
}

pub(crate) fn prepare(target: &TargetArgs) -> Result<Prepared> {
    let project_dir = env::current_dir()?;
    let config = Arc::new(ProjectConfig::discover(&project_dir)?);
    let targets = inventory::resolve(&config, &project_dir, &target.env, target.hosts.as_deref())?;
    let registry = Arc::new(Registry::from_identifiers(config.modules.iter())?);
    Ok(Prepared {
        config,
        project_dir,
        targets,
        registry,
    })
}

/// Run one engine invocation and print the summary.
///
/// Returns the process exit code derived from the invocation status.
pub(crate) async fn run_engine(
    prepared: Prepared,
    mode: Mode,
    plan: Plan,
    limit: usize,
    output: &Output,
) -> Result<i32> {
    let connector = Arc::new(SshConnector::from_config(&prepared.config));
    let engine = Engine::new(
        prepared.config,
        prepared.project_dir,
        prepared.registry,
        connector,
    )
    .limit(limit);

    // Ctrl-C stops launching new host pipelines; in-flight pipelines finish
    // their current module invocation and report Aborted.
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested");
            cancel.trigger();
        }
    });

    output.progress(&format!(
        "Running {:?} on {} host(s)",
        mode,
        prepared.targets.len()
    ));

    let result = engine.run(prepared.targets, &plan).await;
    output.summary(&result);
    Ok(result.exit_code())
}
