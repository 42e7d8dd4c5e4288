// ABOUTME: Configure command - prepare an environment's hosts for deployment.

use super::{prepare, run_engine};
use crate::cli::TargetArgs;
use caravel::engine::{Mode, Plan};
use caravel::error::Result;
use caravel::output::Output;

pub async fn configure(target: &TargetArgs, output: &Output) -> Result<i32> {
    let prepared = prepare(target)?;
    let plan = Plan::for_mode(Mode::Configure, None).map_err(caravel::error::Error::from)?;
    run_engine(prepared, Mode::Configure, plan, target.limit, output).await
}
