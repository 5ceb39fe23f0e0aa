//! Install and uninstall reconciliation
//!
//! Planning is pure: it looks at the catalog and the registry and decides
//! what should happen. Execution hands the plan to the [`PayloadInstaller`]
//! and only commits the registry once the files are actually in place.

use chrono::Utc;
use std::path::{Path, PathBuf};

use super::index::CatalogStore;
use super::installer::{download_url, PayloadInstaller};
use super::lock::{install_path, InstalledIpRecord, LocalRegistry};
use super::store::{RegistryService, RegistryStorage};
use super::types::Technology;
use super::version::same_release;
use crate::error::{IpmError, IpmResult};

/// A request to install one IP
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub name: String,
    pub technology: Technology,
    /// Exact release to install, latest when `None`
    pub version: Option<String>,
    /// Reinstall even when the same version is already present
    pub overwrite: bool,
    pub ip_root: PathBuf,
}

impl InstallRequest {
    pub fn new(name: impl Into<String>, technology: Technology, ip_root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            technology,
            version: None,
            overwrite: false,
            ip_root: ip_root.into(),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Everything the downloader needs, plus the record to commit afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct InstallPlan {
    pub download_url: String,
    pub destination: PathBuf,
    pub record: InstalledIpRecord,
    /// Record currently at the same coordinates, if any
    pub replaces: Option<InstalledIpRecord>,
}

/// Result of planning an install request
#[derive(Debug, Clone, PartialEq)]
pub enum InstallDecision {
    Install(InstallPlan),
    /// Same version already present and overwrite not requested
    AlreadyInstalled(InstalledIpRecord),
}

/// Result of running an install request
#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    Installed {
        record: InstalledIpRecord,
        previous: Option<InstalledIpRecord>,
    },
    AlreadyInstalled(InstalledIpRecord),
}

/// Decide what an install request should do
pub fn plan_install(
    request: &InstallRequest,
    catalog: &CatalogStore,
    registry: &LocalRegistry,
) -> IpmResult<InstallDecision> {
    let descriptor = catalog
        .find_descriptor(&request.name, request.technology)
        .ok_or_else(|| IpmError::UnknownIp {
            name: request.name.clone(),
            technology: request.technology.to_string(),
        })?;

    let release = match &request.version {
        Some(version) => descriptor
            .release(version)
            .ok_or_else(|| IpmError::UnknownVersion {
                name: request.name.clone(),
                version: version.clone(),
            })?,
        None => descriptor.latest_release()?,
    };

    let existing = registry.find_record(&request.name, request.technology, &request.ip_root);
    if let Some(existing) = existing {
        if same_release(&existing.version, &release.version) && !request.overwrite {
            return Ok(InstallDecision::AlreadyInstalled(existing.clone()));
        }
    }

    Ok(InstallDecision::Install(InstallPlan {
        download_url: download_url(&descriptor.repo, &release.version),
        destination: install_path(&request.ip_root, request.technology, &request.name),
        record: InstalledIpRecord::from_descriptor(
            descriptor,
            release,
            &request.ip_root,
            Utc::now(),
        ),
        replaces: existing.cloned(),
    }))
}

/// Runs install and uninstall requests against a payload installer and the
/// persisted registry
pub struct InstallPlanner<I: PayloadInstaller, S: RegistryStorage> {
    installer: I,
    registry_service: RegistryService<S>,
}

impl<I: PayloadInstaller, S: RegistryStorage> InstallPlanner<I, S> {
    pub fn new(installer: I, registry_service: RegistryService<S>) -> Self {
        Self {
            installer,
            registry_service,
        }
    }

    pub fn registry_service(&self) -> &RegistryService<S> {
        &self.registry_service
    }

    /// Plan and, when needed, execute an install request
    pub async fn install(
        &self,
        request: &InstallRequest,
        catalog: &CatalogStore,
        registry: &mut LocalRegistry,
    ) -> IpmResult<InstallOutcome> {
        match plan_install(request, catalog, registry)? {
            InstallDecision::AlreadyInstalled(record) => {
                tracing::info!(
                    "{} {} is already installed at {}",
                    record.name,
                    record.version,
                    record.ip_root.display()
                );
                Ok(InstallOutcome::AlreadyInstalled(record))
            }
            InstallDecision::Install(plan) => {
                let previous = plan.replaces.clone();
                let record = self.execute(plan, registry).await?;
                Ok(InstallOutcome::Installed { record, previous })
            }
        }
    }

    /// Place the files, then commit the record
    ///
    /// `registry` and the registry file are untouched unless both the
    /// payload installer and the save succeed.
    pub async fn execute(
        &self,
        plan: InstallPlan,
        registry: &mut LocalRegistry,
    ) -> IpmResult<InstalledIpRecord> {
        if let Some(previous) = &plan.replaces {
            tracing::debug!(
                "Replacing {} {} at {}",
                previous.name,
                previous.version,
                plan.destination.display()
            );
        }

        self.installer
            .download_and_extract(&plan.download_url, &plan.destination)
            .await?;

        let mut updated = registry.clone();
        updated.upsert(plan.record.clone());
        self.registry_service.save(&updated).await?;
        *registry = updated;

        tracing::info!(
            "Installed {} {} into {}",
            plan.record.name,
            plan.record.version,
            plan.destination.display()
        );
        Ok(plan.record)
    }

    /// Remove an installed IP's files, then its record
    pub async fn uninstall(
        &self,
        name: &str,
        technology: Technology,
        ip_root: &Path,
        registry: &mut LocalRegistry,
    ) -> IpmResult<InstalledIpRecord> {
        let record = registry
            .find_record(name, technology, ip_root)
            .cloned()
            .ok_or_else(|| IpmError::NotInstalled {
                name: name.to_string(),
                technology: technology.to_string(),
                ip_root: Some(ip_root.to_path_buf()),
            })?;

        self.installer
            .remove_directory(&record.install_path())
            .await?;

        let mut updated = registry.clone();
        updated.remove(name, technology, ip_root);
        if let Err(e) = self.registry_service.save(&updated).await {
            tracing::error!(
                "Removed {} but could not update the registry: {}",
                record.install_path().display(),
                e
            );
            return Err(e);
        }
        *registry = updated;

        tracing::info!("Uninstalled {} {}", record.name, record.version);
        Ok(record)
    }
}
