// ABOUTME: Ordered registry of configured module instances.
// ABOUTME: Built once per invocation; registration order is a load-bearing contract.

use super::{CertsModule, CoreModule, DeployFilesModule, Module, SystemdModule};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown module '{0}'")]
    UnknownModule(String),

    #[error("module '{0}' listed twice: ordering would be ambiguous")]
    DuplicateModule(String),
}

/// Ordered collection of module instances, shared read-only across all hosts.
///
/// The order is exactly the configured identifier order. A later module may
/// depend on state an earlier one left behind, so this order is identical on
/// every host of an invocation and never changes mid-run.
pub struct Registry {
    modules: Vec<Arc<dyn Module>>,
}

impl Registry {
    /// Build the registry from an ordered identifier list, failing fast on
    /// unknown or duplicated identifiers.
    pub fn from_identifiers<I, S>(identifiers: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut modules: Vec<Arc<dyn Module>> = Vec::new();
        for id in identifiers {
            let id = id.as_ref();
            modules.push(resolve(id).ok_or_else(|| RegistryError::UnknownModule(id.to_string()))?);
        }
        Self::from_modules(modules)
    }

    /// Build the registry from explicit instances, preserving order.
    pub fn from_modules(modules: Vec<Arc<dyn Module>>) -> Result<Self, RegistryError> {
        let mut seen = BTreeSet::new();
        for module in &modules {
            if !seen.insert(module.name()) {
                return Err(RegistryError::DuplicateModule(module.name().to_string()));
            }
        }
        Ok(Self { modules })
    }

    pub fn modules(&self) -> &[Arc<dyn Module>] {
        &self.modules
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Built-in identifier table. No dynamic lookup: adding a module means
/// adding a row here.
fn resolve(identifier: &str) -> Option<Arc<dyn Module>> {
    match identifier {
        "core" => Some(Arc::new(CoreModule)),
        "deploy-files" => Some(Arc::new(DeployFilesModule)),
        "systemd" => Some(Arc::new(SystemdModule)),
        "certs" => Some(Arc::new(CertsModule)),
        _ => None,
    }
}
