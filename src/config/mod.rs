// ABOUTME: Project configuration types and parsing for caravel.yml.
// ABOUTME: Handles YAML parsing, validated newtypes, and eager validation.

mod project_name;

pub use project_name::{ProjectName, ProjectNameError};

use crate::error::{Error, Result};
use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "caravel.yml";
pub const CONFIG_FILENAME_ALT: &str = "caravel.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".caravel/config.yml";

/// Project-level deployment configuration, loaded once per invocation.
///
/// Everything here is validated eagerly at load time; a bad module list or
/// project name fails before any host is resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(deserialize_with = "deserialize_project_name")]
    pub project: ProjectName,

    #[serde(default = "default_app_user")]
    pub app_user: String,

    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,

    /// Runtime version the core module installs on configure (e.g. "3.11").
    #[serde(default)]
    pub python_version: Option<String>,

    #[serde(default = "default_modules", deserialize_with = "deserialize_modules")]
    pub modules: NonEmpty<String>,

    /// Project-level services, merged into every host's service set.
    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    #[serde(default = "default_deploy_files_dir")]
    pub deploy_files_dir: PathBuf,

    #[serde(default = "default_inventory_dir")]
    pub inventory_dir: PathBuf,

    /// Extra paths excluded from local working-tree artifacts.
    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Private key for SSH auth. Agent and default key locations otherwise.
    #[serde(default)]
    pub ssh_key: Option<PathBuf>,

    #[serde(default)]
    pub trust_first_connection: bool,

    /// Stop a phase at the first failed module instead of collecting all
    /// failures before aborting the host.
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_app_user() -> String {
    "app".to_string()
}

fn default_ssh_user() -> String {
    "deploy".to_string()
}

fn default_modules() -> NonEmpty<String> {
    NonEmpty::from((
        "core".to_string(),
        vec!["deploy-files".to_string(), "systemd".to_string()],
    ))
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".caravel/artifacts")
}

fn default_deploy_files_dir() -> PathBuf {
    PathBuf::from("deploy_files")
}

fn default_inventory_dir() -> PathBuf {
    PathBuf::from("inventory")
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

impl ProjectConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProjectConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    fn validate(&self) -> Result<()> {
        if self.app_user.trim().is_empty() {
            return Err(Error::InvalidConfig("app_user cannot be empty".to_string()));
        }
        if self.ssh_user.trim().is_empty() {
            return Err(Error::InvalidConfig("ssh_user cannot be empty".to_string()));
        }
        for service in &self.services {
            if service.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "service names cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Remote application directory for this project.
    pub fn app_path(&self) -> String {
        format!("/home/{}/apps/{}", self.app_user, self.project)
    }

    /// Remote staging directory for uploaded artifact bundles.
    pub fn tars_path(&self) -> String {
        format!("/home/{}/tars", self.ssh_user)
    }
}

// Custom deserializers

fn deserialize_project_name<'de, D>(deserializer: D) -> std::result::Result<ProjectName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    ProjectName::new(&s).map_err(serde::de::Error::custom)
}

fn deserialize_modules<'de, D>(deserializer: D) -> std::result::Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one module is required"))
}
