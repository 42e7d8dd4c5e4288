// ABOUTME: Deploy command - build one artifact, then fan it out to every selected host.

use super::{prepare, run_engine};
use crate::cli::{DeploySource, TargetArgs};
use caravel::artifact::{self, BuildMode};
use caravel::engine::{Mode, Plan};
use caravel::error::{Error, Result};
use caravel::output::Output;
use std::sync::Arc;

pub async fn deploy(target: &TargetArgs, source: &DeploySource, output: &Output) -> Result<i32> {
    // Hosts resolve first: an empty selection fails before anything is built.
    let prepared = prepare(target)?;

    let mode = build_mode(source)?;
    output.progress(&format!("Building artifact ({mode:?})..."));
    let artifact = artifact::build(&prepared.config, &prepared.project_dir, &mode).await?;
    output.progress(&format!(
        "Built {} ({})",
        artifact.file_name(),
        &artifact.checksum[..12]
    ));

    let plan = Plan::for_mode(Mode::Deploy, Some(Arc::new(artifact)))
        .map_err(caravel::error::Error::from)?;
    run_engine(prepared, Mode::Deploy, plan, target.limit, output).await
}

fn build_mode(source: &DeploySource) -> Result<BuildMode> {
    if source.local {
        Ok(BuildMode::Local)
    } else if source.latest {
        Ok(BuildMode::Latest)
    } else if let Some(tag) = &source.release {
        Ok(BuildMode::Release(tag.clone()))
    } else {
        // clap's arg group requires one of the three; reaching this arm means
        // the CLI definition regressed, and that must not turn into a build
        // against an empty tag.
        Err(Error::InvalidConfig(
            "deploy requires one of --local, --latest, --release".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(local: bool, latest: bool, release: Option<&str>) -> DeploySource {
        DeploySource {
            local,
            latest,
            release: release.map(String::from),
        }
    }

    #[test]
    fn source_flags_map_to_build_modes() {
        assert_eq!(
            build_mode(&source(true, false, None)).unwrap(),
            BuildMode::Local
        );
        assert_eq!(
            build_mode(&source(false, true, None)).unwrap(),
            BuildMode::Latest
        );
        assert_eq!(
            build_mode(&source(false, false, Some("v1.2.0"))).unwrap(),
            BuildMode::Release("v1.2.0".to_string())
        );
    }

    /// Test: a source with no flag set is an error, never an empty release
    /// tag.
    #[test]
    fn empty_source_is_rejected() {
        let err = build_mode(&source(false, false, None)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
