// ABOUTME: Verify command - check deployed state without changing anything.

use super::{prepare, run_engine};
use crate::cli::TargetArgs;
use caravel::engine::{Mode, Plan};
use caravel::error::Result;
use caravel::output::Output;

pub async fn verify(target: &TargetArgs, output: &Output) -> Result<i32> {
    let prepared = prepare(target)?;
    let plan = Plan::for_mode(Mode::Verify, None).map_err(caravel::error::Error::from)?;
    run_engine(prepared, Mode::Verify, plan, target.limit, output).await
}
