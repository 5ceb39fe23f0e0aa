//! IP Catalog - discovery, installation and update tracking
//!
//! This module provides functionality for browsing the verified IP
//! catalog and installing, uninstalling and updating IPs in a local
//! workspace.
//!
//! # Overview
//!
//! The catalog system allows users to:
//! - Browse available IPs by category and technology
//! - Install a specific or the latest release of an IP under an IP root
//! - Track installed versions via `Installed_IPs.json`
//! - Check installed IPs for newer releases and update them
//!
//! # Architecture
//!
//! ```text
//! Catalog repository (GitHub)
//!     │
//!     ├── Verified_IPs.json          ← Lists all IPs and their releases
//!     └── <ip repo>/releases/*.tar.gz ← Released IP archives
//!            │
//!            ▼
//!     CatalogService ──► InstallPlanner / UpdateChecker
//!                              │
//!                              ▼
//!     <ip_root>/<technology>/<name>/  ← Installed IP files
//!     <ipm_home>/Installed_IPs.json   ← Registry (written last)
//! ```

mod index;
mod installer;
mod lock;
mod manifest;
mod planner;
mod remote;
mod store;
mod types;
mod updates;
mod version;

pub use index::{CatalogStore, IpDescriptor, ReleaseEntry};
pub use installer::{download_url, PayloadInstaller};
pub use lock::{
    check_ip_name, date_to_iso8601, install_path, InstalledIpRecord, LocalRegistry, ISO8601_FMT,
};
pub use manifest::{install_manifest, load_manifest, ManifestEntry};
pub use planner::{
    plan_install, InstallDecision, InstallOutcome, InstallPlan, InstallPlanner, InstallRequest,
};
pub use remote::{
    catalog_url, CatalogService, FileClient, HttpClient, LocalOrRemote, CATALOG_FILE_NAME,
    DEFAULT_REPO_NAME, DEFAULT_REPO_OWNER,
};
pub use store::{FsStorage, RegistryService, RegistryStorage};
pub use types::{Category, Dimension, Technology};
pub use updates::{update_status, CheckEntry, CheckReport, CheckTarget, UpdateChecker, UpdateStatus};
pub use version::{is_newer, newest_index, same_release, Version};

#[cfg(feature = "catalog")]
pub use installer::TarballInstaller;
#[cfg(feature = "catalog")]
pub use remote::ReqwestClient;

#[cfg(test)]
mod tests;
