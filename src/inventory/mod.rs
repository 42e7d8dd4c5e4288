// ABOUTME: Host inventory model and per-environment resolution.
// ABOUTME: Loads inventory/<env>.yml and narrows by host name filter.

use crate::config::ProjectConfig;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("unknown environment '{environment}' (no inventory file in {dir})")]
    UnknownEnvironment { environment: String, dir: PathBuf },

    #[error("duplicate host '{0}' in inventory")]
    DuplicateHost(String),

    #[error("no hosts selected in environment '{environment}' (filter: {filter})")]
    NoHostsSelected { environment: String, filter: String },

    #[error("invalid inventory: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, InventoryError>;

/// One deployment target, immutable after resolution.
#[derive(Debug, Clone)]
pub struct HostTarget {
    pub name: String,
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_user: String,
    pub app_user: String,
    /// Environment this host belongs to (set from the inventory file name).
    pub env: String,
    /// Services managed on this host, project-level services included.
    pub services: Vec<String>,
    /// Domains the certs module issues certificates for.
    pub domains: Vec<String>,
}

/// Raw inventory entry as written in inventory/<env>.yml.
///
/// ssh_user and app_user fall back to the project config when omitted.
#[derive(Debug, Deserialize)]
struct HostEntry {
    name: String,
    ssh_host: String,
    #[serde(default = "default_ssh_port")]
    ssh_port: u16,
    #[serde(default)]
    ssh_user: Option<String>,
    #[serde(default)]
    app_user: Option<String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    domains: Vec<String>,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    hosts: Vec<HostEntry>,
}

/// Resolve an environment to its target hosts.
///
/// The filter is a comma-separated list of host names. An empty result after
/// filtering is an error, never an empty success: deploying to "nothing"
/// must not look like a completed deployment.
pub fn resolve(
    config: &ProjectConfig,
    project_dir: &Path,
    environment: &str,
    filter: Option<&str>,
) -> Result<NonEmpty<HostTarget>> {
    let dir = project_dir.join(&config.inventory_dir);
    let candidates = [
        dir.join(format!("{environment}.yml")),
        dir.join(format!("{environment}.yaml")),
    ];

    let path = candidates
        .iter()
        .find(|p| p.exists())
        .ok_or_else(|| InventoryError::UnknownEnvironment {
            environment: environment.to_string(),
            dir: dir.clone(),
        })?;

    let content = std::fs::read_to_string(path)?;
    let file: InventoryFile = serde_yaml::from_str(&content)?;

    let mut seen = BTreeSet::new();
    let mut targets = Vec::with_capacity(file.hosts.len());
    for entry in file.hosts {
        if entry.name.trim().is_empty() {
            return Err(InventoryError::Invalid(
                "host name cannot be empty".to_string(),
            ));
        }
        if entry.ssh_host.trim().is_empty() {
            return Err(InventoryError::Invalid(format!(
                "host '{}' has an empty ssh_host",
                entry.name
            )));
        }
        if !seen.insert(entry.name.clone()) {
            return Err(InventoryError::DuplicateHost(entry.name));
        }

        let mut services = config.services.clone();
        for service in entry.services {
            if !services.contains(&service) {
                services.push(service);
            }
        }

        targets.push(HostTarget {
            name: entry.name,
            ssh_host: entry.ssh_host,
            ssh_port: entry.ssh_port,
            ssh_user: entry.ssh_user.unwrap_or_else(|| config.ssh_user.clone()),
            app_user: entry.app_user.unwrap_or_else(|| config.app_user.clone()),
            env: environment.to_string(),
            services,
            domains: entry.domains,
        });
    }

    if let Some(filter) = filter {
        let wanted: BTreeSet<&str> = filter
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        targets.retain(|t| wanted.contains(t.name.as_str()));
    }

    NonEmpty::from_vec(targets).ok_or_else(|| InventoryError::NoHostsSelected {
        environment: environment.to_string(),
        filter: filter.unwrap_or("<none>").to_string(),
    })
}
