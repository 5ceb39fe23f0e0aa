//! Error types for catalog, registry and installation operations
//!
//! Every failure surfaced by `ipm-core` is an [`IpmError`]. "Already
//! installed" and "up to date" are success outcomes and are not represented
//! here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the IP package manager core
#[derive(Error, Debug)]
pub enum IpmError {
    /// The remote catalog could not be retrieved
    #[error("Couldn't reach the IP catalog at {url}: {reason}")]
    CatalogUnavailable { url: String, reason: String },

    /// The remote catalog was retrieved but could not be parsed
    #[error("The IP catalog at {url} is malformed: {reason}")]
    CatalogMalformed { url: String, reason: String },

    /// The local registry file exists but could not be parsed
    #[error("Registry file {path} is corrupt: {reason}")]
    RegistryCorrupt { path: PathBuf, reason: String },

    /// No catalog entry matches the requested name and technology
    #[error("IP '{name}' is not available for technology {technology}.\n\nRun 'ipm ls' to see all verified IPs.")]
    UnknownIp { name: String, technology: String },

    /// The requested version is not part of the IP's release history
    #[error("IP '{name}' has no release '{version}'.\n\nRun 'ipm info --ip {name}' to see all releases.")]
    UnknownVersion { name: String, version: String },

    /// No registry record matches the requested IP
    #[error("IP '{name}' ({technology}) is not installed{}", .ip_root.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    NotInstalled {
        name: String,
        technology: String,
        ip_root: Option<PathBuf>,
    },

    /// A version string has a non-numeric component
    #[error("Malformed version '{version}': {reason}")]
    MalformedVersion { version: String, reason: String },

    /// The IP archive could not be downloaded
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The IP archive was downloaded but could not be unpacked
    #[error("Failed to extract archive into {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// A filesystem operation failed
    #[error("Filesystem error at {path}")]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A category outside the supported set was supplied
    #[error("Unknown category '{0}'. Valid categories: digital, comm, analog, dataconv")]
    InvalidCategory(String),

    /// A technology outside the supported set was supplied
    #[error("Unknown technology '{0}'. Valid technologies: sky130, gf180mcu")]
    InvalidTechnology(String),

    /// The configuration file could not be read or parsed
    #[error("Configuration error in {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl IpmError {
    /// Wrap an I/O error with the path it occurred on
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IpmError::FilesystemError {
            path: path.into(),
            source,
        }
    }
}

pub type IpmResult<T> = std::result::Result<T, IpmError>;
