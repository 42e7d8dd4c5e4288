// ABOUTME: Sync-certs command - renew certificates on an environment's hosts.

use super::{prepare, run_engine};
use crate::cli::TargetArgs;
use caravel::engine::{Mode, Plan};
use caravel::error::Result;
use caravel::output::Output;

pub async fn sync_certs(target: &TargetArgs, output: &Output) -> Result<i32> {
    let prepared = prepare(target)?;
    let plan = Plan::for_mode(Mode::CertSync, None).map_err(caravel::error::Error::from)?;
    run_engine(prepared, Mode::CertSync, plan, target.limit, output).await
}
