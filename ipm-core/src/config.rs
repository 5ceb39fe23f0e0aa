//! Workspace configuration
//!
//! Resolved once per invocation and passed to the services that need it.
//! Precedence: explicit override > environment > `config.yaml` > default.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::catalog::{catalog_url, Technology, DEFAULT_REPO_NAME, DEFAULT_REPO_OWNER};
use crate::error::{IpmError, IpmResult};

/// Registry file name inside the ipm home directory
pub const REGISTRY_FILE_NAME: &str = "Installed_IPs.json";

/// Optional configuration file inside the ipm home directory
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the ipm home directory
pub const ENV_IPM_HOME: &str = "IPM_HOME";

/// Environment variables selecting the repository that publishes the catalog
pub const ENV_REPO_OWNER: &str = "IPM_REPO_OWNER";
pub const ENV_REPO_NAME: &str = "IPM_REPO_NAME";

/// Contents of `config.yaml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub catalog_url: Option<String>,

    #[serde(default)]
    pub ip_root: Option<PathBuf>,

    #[serde(default)]
    pub default_technology: Option<Technology>,
}

impl ConfigFile {
    /// Load the config file, defaults when it does not exist
    pub fn load(path: &Path) -> IpmResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| IpmError::filesystem(path, e))?;
        serde_yaml_ng::from_str::<Option<Self>>(&content)
            .map(Option::unwrap_or_default)
            .map_err(|e| IpmError::Config {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// Values given explicitly on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub ipm_home: Option<PathBuf>,
    pub catalog_url: Option<String>,
    pub ip_root: Option<PathBuf>,
}

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct IpmConfig {
    /// Directory holding the registry and config file
    pub ipm_home: PathBuf,

    /// Installed IP registry file
    pub registry_path: PathBuf,

    /// URL of the remote catalog
    pub catalog_url: String,

    /// Default directory IPs are installed under
    pub ip_root: PathBuf,

    pub default_technology: Technology,
}

impl IpmConfig {
    /// Resolve configuration from overrides, process environment and file
    pub fn load(overrides: ConfigOverrides) -> IpmResult<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup
    pub fn resolve<F>(overrides: ConfigOverrides, env: F) -> IpmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ipm_home = match overrides.ipm_home.or_else(|| env(ENV_IPM_HOME).map(PathBuf::from)) {
            Some(home) => home,
            None => default_home()?,
        };

        let file = ConfigFile::load(&ipm_home.join(CONFIG_FILE_NAME))?;

        let env_owner = env(ENV_REPO_OWNER);
        let env_name = env(ENV_REPO_NAME);
        let env_catalog = if env_owner.is_some() || env_name.is_some() {
            Some(catalog_url(
                env_owner.as_deref().unwrap_or(DEFAULT_REPO_OWNER),
                env_name.as_deref().unwrap_or(DEFAULT_REPO_NAME),
            ))
        } else {
            None
        };

        let catalog_url = overrides
            .catalog_url
            .or(env_catalog)
            .or(file.catalog_url)
            .unwrap_or_else(|| catalog_url(DEFAULT_REPO_OWNER, DEFAULT_REPO_NAME));

        let ip_root = overrides
            .ip_root
            .or(file.ip_root)
            .unwrap_or_else(|| ipm_home.clone());
        // Registry records match on the exact root path
        let ip_root = absolute(&ip_root)?;

        Ok(Self {
            registry_path: ipm_home.join(REGISTRY_FILE_NAME),
            ipm_home,
            catalog_url,
            ip_root,
            default_technology: file.default_technology.unwrap_or_default(),
        })
    }
}

/// Make `path` absolute against the current directory, dropping `.` segments
fn absolute(path: &Path) -> IpmResult<PathBuf> {
    std::path::absolute(path).map_err(|e| IpmError::filesystem(path, e))
}

/// `~/.ipm`
pub fn default_home() -> IpmResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .or_else(dirs::home_dir)
        .map(|home| home.join(".ipm"))
        .ok_or_else(|| IpmError::Config {
            path: PathBuf::from("~"),
            reason: "could not determine the home directory; set IPM_HOME".to_string(),
        })
}
