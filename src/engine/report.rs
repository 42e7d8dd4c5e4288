// ABOUTME: Per-module, per-phase, per-host, and invocation-level outcome types.
// ABOUTME: Constructed during execution, consumed for reporting, never persisted.

use super::phase::Phase;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one module hook on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum ModuleOutcome {
    /// Hook ran and altered host state.
    Changed,
    /// Hook ran against already-converged state.
    Unchanged,
    Failed { reason: String },
    /// Hook never ran: an earlier failure under fail-fast, or cancellation.
    Skipped,
}

impl ModuleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ModuleOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub module: String,
    #[serde(flatten)]
    pub outcome: ModuleOutcome,
}

/// Outcome of one phase on one host, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub modules: Vec<ModuleReport>,
}

impl PhaseReport {
    pub fn failed(&self) -> bool {
        self.modules.iter().any(|m| m.outcome.is_failure())
    }

    pub fn has_skipped(&self) -> bool {
        self.modules
            .iter()
            .any(|m| m.outcome == ModuleOutcome::Skipped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum HostStatus {
    /// Every selected phase completed.
    Done,
    /// Pipeline stopped at this phase; later phases never ran.
    Aborted { phase: Phase },
}

#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub host: String,
    pub phases: Vec<PhaseReport>,
    #[serde(flatten)]
    pub status: HostStatus,
    /// Host-level error with no module to pin it on (connection failure,
    /// cancellation before start).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HostReport {
    pub fn is_done(&self) -> bool {
        self.status == HostStatus::Done
    }

    /// All failed module outcomes with their phase, for operator summaries.
    pub fn failures(&self) -> impl Iterator<Item = (Phase, &ModuleReport)> {
        self.phases.iter().flat_map(|p| {
            p.modules
                .iter()
                .filter(|m| m.outcome.is_failure())
                .map(move |m| (p.phase, m))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvocationStatus {
    Succeeded,
    PartialFailure,
    Cancelled,
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvocationStatus::Succeeded => "succeeded",
            InvocationStatus::PartialFailure => "partial failure",
            InvocationStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl InvocationStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            InvocationStatus::Succeeded => 0,
            InvocationStatus::PartialFailure => 2,
            InvocationStatus::Cancelled => 4,
        }
    }
}

/// The only thing the engine hands back to the command surface.
///
/// Each host pipeline writes exactly its own entry; the map is assembled
/// after all pipelines finish, so there is no cross-host contention.
#[derive(Debug, Clone, Serialize)]
pub struct InvocationResult {
    pub hosts: BTreeMap<String, HostReport>,
    pub cancelled: bool,
}

impl InvocationResult {
    pub fn status(&self) -> InvocationStatus {
        if self.cancelled {
            InvocationStatus::Cancelled
        } else if self.hosts.values().all(HostReport::is_done) {
            InvocationStatus::Succeeded
        } else {
            InvocationStatus::PartialFailure
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status().exit_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(host: &str) -> HostReport {
        HostReport {
            host: host.to_string(),
            phases: vec![],
            status: HostStatus::Done,
            error: None,
        }
    }

    fn aborted(host: &str, phase: Phase) -> HostReport {
        HostReport {
            host: host.to_string(),
            phases: vec![],
            status: HostStatus::Aborted { phase },
            error: None,
        }
    }

    fn result(reports: Vec<HostReport>, cancelled: bool) -> InvocationResult {
        InvocationResult {
            hosts: reports.into_iter().map(|r| (r.host.clone(), r)).collect(),
            cancelled,
        }
    }

    #[test]
    fn all_done_is_success() {
        let r = result(vec![done("a"), done("b")], false);
        assert_eq!(r.status(), InvocationStatus::Succeeded);
        assert_eq!(r.exit_code(), 0);
    }

    #[test]
    fn any_aborted_host_is_partial_failure() {
        let r = result(vec![done("a"), aborted("b", Phase::Deploy)], false);
        assert_eq!(r.status(), InvocationStatus::PartialFailure);
        assert_eq!(r.exit_code(), 2);
    }

    #[test]
    fn cancellation_wins_over_partial_failure() {
        let r = result(vec![aborted("a", Phase::Configure)], true);
        assert_eq!(r.status(), InvocationStatus::Cancelled);
        assert_eq!(r.exit_code(), 4);
    }
}
