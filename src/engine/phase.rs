// ABOUTME: Pipeline phases and their fixed global order.
// ABOUTME: A host never reaches a later phase without passing the earlier ones it runs.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Configure,
    DeployBefore,
    Deploy,
    DeployAfter,
    Verify,
    /// Out-of-band certificate renewal; runs alone in cert-sync invocations.
    CertSync,
}

impl Phase {
    /// The fixed global pipeline order. Invocation modes select an in-order
    /// subset of these; `CertSync` is its own invocation and never mixes
    /// with the pipeline.
    pub const PIPELINE: [Phase; 5] = [
        Phase::Configure,
        Phase::DeployBefore,
        Phase::Deploy,
        Phase::DeployAfter,
        Phase::Verify,
    ];

    /// Whether module hooks for this phase receive the built artifact.
    pub fn requires_artifact(self) -> bool {
        matches!(self, Phase::DeployBefore | Phase::Deploy | Phase::DeployAfter)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Configure => "configure",
            Phase::DeployBefore => "deploy-before",
            Phase::Deploy => "deploy",
            Phase::DeployAfter => "deploy-after",
            Phase::Verify => "verify",
            Phase::CertSync => "cert-sync",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
