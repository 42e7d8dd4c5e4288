// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use crate::engine::{HostStatus, InvocationResult};
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = serde_json::json!({ "event": "error", "message": message });
                eprintln!("{event}");
            }
        }
    }

    /// Print the per-host invocation summary.
    pub fn summary(&self, result: &InvocationResult) {
        match self.mode {
            OutputMode::Json => {
                let report = serde_json::json!({
                    "status": result.status(),
                    "duration_secs": self.elapsed_secs(),
                    "hosts": result.hosts,
                });
                println!("{report}");
            }
            OutputMode::Normal | OutputMode::Quiet => {
                for host in result.hosts.values() {
                    match &host.status {
                        HostStatus::Done => println!("  ✓ {}: done", host.host),
                        HostStatus::Aborted { phase } => {
                            println!("  ✗ {}: aborted at {}", host.host, phase);
                            if let Some(error) = &host.error {
                                println!("      {error}");
                            }
                            for (phase, module) in host.failures() {
                                if let crate::engine::ModuleOutcome::Failed { reason } =
                                    &module.outcome
                                {
                                    println!("      {}/{}: {}", phase, module.module, reason);
                                }
                            }
                        }
                    }
                }
                if self.mode == OutputMode::Normal {
                    println!("{} ({:.1}s)", result.status(), self.elapsed_secs());
                }
            }
        }
    }
}
