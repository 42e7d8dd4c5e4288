// ABOUTME: Application-wide error types for caravel.
// ABOUTME: Uses thiserror and maps fatal errors to distinct process exit codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::artifact::BuildError;
use crate::engine::EngineError;
use crate::inventory::InventoryError;
use crate::module::RegistryError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code for a fatal (pre-pipeline) error.
    ///
    /// Partial failure (2) and cancellation (4) come from
    /// `InvocationStatus::exit_code`, not from here; everything that aborts
    /// before any host is touched lands on 1 or 3.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Inventory(InventoryError::NoHostsSelected { .. }) => 3,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
